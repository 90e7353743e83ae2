//! Read access to the node's block index and claim tables.
//!
//! [`BlockIndexStore`] is the storage seam, implemented over SQLite
//! ([`SqliteBlockIndex`]) and in memory ([`MemoryBlockIndex`]).
//! [`BlockchainDb`] is the async facade: it moves an opened store onto one
//! worker task and forwards queries to it over a bounded channel, so the
//! store is only ever touched by that task, one query at a time.
//!
//! A caller that stops waiting on a query does not interrupt it; the worker
//! runs it to completion and discards the reply.

mod memory;
mod sqlite;
pub mod types;

pub use memory::{MemoryBlockIndex, MemoryBlockIndexBuilder};
pub use sqlite::{SqliteBlockIndex, BLOCK_INDEX_FILE, CLAIMS_FILE, CLAIMS_SCHEMA};
pub use types::{
    BlockFile, BlockInFile, BlockRecord, ClaimRecord, ClaimRow, ClaimtrieEntry, TakeoverRecord,
};

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ChainError;

/// The four queries the indexer needs from the node's databases.
#[async_trait]
pub trait BlockIndexStore: Send {
    /// Per-file totals of stored blocks, ordered by file. The filters apply
    /// only when both are given: then only that file's blocks above
    /// `above_height` are counted.
    async fn get_block_files(
        &mut self,
        file_number: Option<i64>,
        above_height: Option<i64>,
    ) -> Result<Vec<BlockFile>, ChainError>;

    /// Stored blocks of `file` above `above_height`, ordered by data offset.
    async fn get_blocks_in_file(
        &mut self,
        file: i64,
        above_height: i64,
    ) -> Result<Vec<BlockInFile>, ChainError>;

    /// One row per name, from its latest takeover.
    async fn get_claimtrie(&mut self) -> Result<Vec<ClaimtrieEntry>, ChainError>;

    async fn get_claims(&mut self) -> Result<Vec<ClaimRow>, ChainError>;

    /// Release the store's resources.
    async fn close(self) -> Result<(), ChainError>
    where
        Self: Sized,
    {
        Ok(())
    }
}

// ==============================================================================
// Configuration
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockIndexConfig {
    /// Directory holding `block_index.sqlite` and `claims.sqlite`.
    pub directory: PathBuf,
    /// How long a query waits on a locked database.
    pub busy_timeout: Duration,
    /// Queries that may wait for the worker before callers are held back.
    pub query_queue: usize,
}

impl Default for BlockIndexConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            busy_timeout: Duration::from_secs(300),
            query_queue: 32,
        }
    }
}

impl BlockIndexConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }
}

// ==============================================================================
// Worker Facade
// ==============================================================================

type Reply<T> = oneshot::Sender<Result<T, ChainError>>;

enum Query {
    BlockFiles {
        file_number: Option<i64>,
        above_height: Option<i64>,
        reply: Reply<Vec<BlockFile>>,
    },
    BlocksInFile {
        file: i64,
        above_height: i64,
        reply: Reply<Vec<BlockInFile>>,
    },
    Claimtrie {
        reply: Reply<Vec<ClaimtrieEntry>>,
    },
    Claims {
        reply: Reply<Vec<ClaimRow>>,
    },
}

struct Worker {
    queries: mpsc::Sender<Query>,
    handle: JoinHandle<Result<(), ChainError>>,
}

/// Serialized async access to a [`BlockIndexStore`].
pub struct BlockchainDb {
    config: BlockIndexConfig,
    worker: Option<Worker>,
}

impl BlockchainDb {
    pub fn new(config: BlockIndexConfig) -> Self {
        Self {
            config,
            worker: None,
        }
    }

    pub fn config(&self) -> &BlockIndexConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.worker.is_some()
    }

    /// Open the SQLite databases in the configured directory.
    pub async fn open(&mut self) -> Result<(), ChainError> {
        if self.is_open() {
            return Err(ChainError::AlreadyOpen);
        }
        let store = SqliteBlockIndex::open(&self.config).await?;
        self.open_with(store)
    }

    /// Serve queries from an already opened store.
    pub fn open_with<S>(&mut self, store: S) -> Result<(), ChainError>
    where
        S: BlockIndexStore + 'static,
    {
        if self.is_open() {
            return Err(ChainError::AlreadyOpen);
        }
        let (queries, receiver) = mpsc::channel(self.config.query_queue.max(1));
        let handle = tokio::spawn(run_worker(store, receiver));
        self.worker = Some(Worker { queries, handle });
        info!(directory = %self.config.directory.display(), "block index opened");
        Ok(())
    }

    /// Let queued queries finish, then close the store. Closing a facade
    /// that is not open does nothing.
    pub async fn close(&mut self) -> Result<(), ChainError> {
        let Some(Worker { queries, handle }) = self.worker.take() else {
            return Ok(());
        };
        drop(queries);
        let closed = handle
            .await
            .map_err(|e| ChainError::Worker(format!("block index worker panicked: {e}")))?;
        info!("block index closed");
        closed
    }

    pub async fn get_block_files(
        &self,
        file_number: Option<i64>,
        above_height: Option<i64>,
    ) -> Result<Vec<BlockFile>, ChainError> {
        debug!(?file_number, ?above_height, "query block files");
        self.dispatch(|reply| Query::BlockFiles {
            file_number,
            above_height,
            reply,
        })
        .await
    }

    pub async fn get_blocks_in_file(
        &self,
        file: i64,
        above_height: i64,
    ) -> Result<Vec<BlockInFile>, ChainError> {
        debug!(file, above_height, "query blocks in file");
        self.dispatch(|reply| Query::BlocksInFile {
            file,
            above_height,
            reply,
        })
        .await
    }

    pub async fn get_claimtrie(&self) -> Result<Vec<ClaimtrieEntry>, ChainError> {
        debug!("query claimtrie");
        self.dispatch(|reply| Query::Claimtrie { reply }).await
    }

    pub async fn get_claims(&self) -> Result<Vec<ClaimRow>, ChainError> {
        debug!("query claims");
        self.dispatch(|reply| Query::Claims { reply }).await
    }

    async fn dispatch<T>(
        &self,
        query: impl FnOnce(Reply<T>) -> Query,
    ) -> Result<T, ChainError> {
        let worker = self.worker.as_ref().ok_or(ChainError::NotOpen)?;
        let (reply, response) = oneshot::channel();
        worker
            .queries
            .send(query(reply))
            .await
            .map_err(|_| ChainError::Worker("block index worker has stopped".into()))?;
        response
            .await
            .map_err(|_| ChainError::Worker("block index worker dropped the query".into()))?
    }
}

impl Drop for BlockchainDb {
    fn drop(&mut self) {
        if self.worker.is_some() {
            warn!("block index dropped while open; worker closes after draining queries");
        }
    }
}

async fn run_worker<S: BlockIndexStore>(
    mut store: S,
    mut queries: mpsc::Receiver<Query>,
) -> Result<(), ChainError> {
    while let Some(query) = queries.recv().await {
        match query {
            Query::BlockFiles {
                file_number,
                above_height,
                reply,
            } => {
                let rows = store.get_block_files(file_number, above_height).await;
                let _ = reply.send(rows);
            }
            Query::BlocksInFile {
                file,
                above_height,
                reply,
            } => {
                let rows = store.get_blocks_in_file(file, above_height).await;
                let _ = reply.send(rows);
            }
            Query::Claimtrie { reply } => {
                let rows = store.get_claimtrie().await;
                let _ = reply.send(rows);
            }
            Query::Claims { reply } => {
                let rows = store.get_claims().await;
                let _ = reply.send(rows);
            }
        }
    }
    store.close().await
}
