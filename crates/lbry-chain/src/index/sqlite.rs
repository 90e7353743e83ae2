use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, QueryBuilder, Sqlite};
use tracing::debug;

use crate::error::ChainError;

use super::types::{BlockFile, BlockInFile, ClaimRow, ClaimtrieEntry};
use super::{BlockIndexConfig, BlockIndexStore};

pub const BLOCK_INDEX_FILE: &str = "block_index.sqlite";
pub const CLAIMS_FILE: &str = "claims.sqlite";
/// Schema name the claims database is attached under.
pub const CLAIMS_SCHEMA: &str = "claims";

/// The node's block index, with its claims database attached, read over a
/// single SQLite connection.
pub struct SqliteBlockIndex {
    connection: SqliteConnection,
}

impl SqliteBlockIndex {
    /// Connect to `block_index.sqlite` in the configured directory and attach
    /// `claims.sqlite` beside it.
    pub async fn open(config: &BlockIndexConfig) -> Result<Self, ChainError> {
        let block_index = config.directory.join(BLOCK_INDEX_FILE);
        let options = SqliteConnectOptions::new()
            .filename(&block_index)
            .busy_timeout(config.busy_timeout);
        let mut connection = SqliteConnection::connect_with(&options).await?;
        attach(&mut connection, &config.directory.join(CLAIMS_FILE), CLAIMS_SCHEMA).await?;
        debug!(path = %block_index.display(), "connected to block index");
        Ok(Self { connection })
    }
}

async fn attach(
    connection: &mut SqliteConnection,
    path: &Path,
    schema: &str,
) -> Result<(), ChainError> {
    sqlx::query(&format!("ATTACH DATABASE ? AS {schema}"))
        .bind(path.to_string_lossy().into_owned())
        .execute(&mut *connection)
        .await?;
    Ok(())
}

const BLOCK_FILES_SQL: &str = "
    SELECT
        file AS file_number,
        COUNT(hash) AS blocks,
        SUM(txcount) AS txs,
        MAX(height) AS max_height
    FROM block_info
    WHERE status&1 AND status&4";

const BLOCKS_IN_FILE_SQL: &str = "
    SELECT datapos AS data_offset, height, hash AS block_hash, txCount AS txs
    FROM block_info
    WHERE file = ? AND height > ? AND status&1 AND status&4
    ORDER BY datapos ASC";

// MAX() in the select list makes SQLite take the bare takeover columns from
// the latest takeover of each name.
const CLAIMTRIE_SQL: &str = "
    SELECT
        takeover.name AS normalized,
        takeover.claimID AS claim_hash,
        MAX(takeover.height) AS last_take_over_height,
        originalHeight AS original_height,
        updateHeight AS update_height,
        validHeight AS valid_height,
        activationHeight AS activation_height,
        expirationHeight AS expiration_height
    FROM takeover JOIN claim USING (claimID)
    GROUP BY takeover.name HAVING MAX(takeover.height)
    ORDER BY takeover.name ASC";

const CLAIMS_SQL: &str = "
    SELECT
        claimID AS claim_hash,
        txID AS tx_hash,
        txN AS position,
        amount,
        originalHeight AS original_height,
        updateHeight AS update_height,
        validHeight AS valid_height,
        activationHeight AS activation_height,
        expirationHeight AS expiration_height
    FROM claims.claim";

#[async_trait]
impl BlockIndexStore for SqliteBlockIndex {
    async fn get_block_files(
        &mut self,
        file_number: Option<i64>,
        above_height: Option<i64>,
    ) -> Result<Vec<BlockFile>, ChainError> {
        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(BLOCK_FILES_SQL);
        if let Some((file, height)) = file_number.zip(above_height) {
            query
                .push(" AND file = ")
                .push_bind(file)
                .push(" AND height > ")
                .push_bind(height);
        }
        query.push(" GROUP BY file ORDER BY file ASC");
        let rows = query
            .build_query_as::<BlockFile>()
            .fetch_all(&mut self.connection)
            .await?;
        Ok(rows)
    }

    async fn get_blocks_in_file(
        &mut self,
        file: i64,
        above_height: i64,
    ) -> Result<Vec<BlockInFile>, ChainError> {
        let rows = sqlx::query_as::<_, BlockInFile>(BLOCKS_IN_FILE_SQL)
            .bind(file)
            .bind(above_height)
            .fetch_all(&mut self.connection)
            .await?;
        Ok(rows)
    }

    async fn get_claimtrie(&mut self) -> Result<Vec<ClaimtrieEntry>, ChainError> {
        let rows = sqlx::query_as::<_, ClaimtrieEntry>(CLAIMTRIE_SQL)
            .fetch_all(&mut self.connection)
            .await?;
        Ok(rows)
    }

    async fn get_claims(&mut self) -> Result<Vec<ClaimRow>, ChainError> {
        let rows = sqlx::query_as::<_, ClaimRow>(CLAIMS_SQL)
            .fetch_all(&mut self.connection)
            .await?;
        Ok(rows)
    }

    async fn close(self) -> Result<(), ChainError> {
        self.connection.close().await?;
        Ok(())
    }
}
