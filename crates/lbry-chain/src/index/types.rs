//! Rows returned by the block-index queries, and the records a
//! [`MemoryBlockIndex`](super::MemoryBlockIndex) is populated with.
//!
//! Hashes and names are raw bytes exactly as the node stores them.

use serde::{Deserialize, Serialize};

// ==============================================================================
// Query Rows
// ==============================================================================

/// Per-file aggregate of fully stored blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlockFile {
    pub file_number: i64,
    pub blocks: i64,
    pub txs: i64,
    pub max_height: i64,
}

/// A block's location inside its block file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlockInFile {
    pub data_offset: i64,
    pub height: i64,
    pub block_hash: Vec<u8>,
    pub txs: i64,
}

/// The claim that currently controls a name, with its lifecycle heights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClaimtrieEntry {
    pub normalized: Vec<u8>,
    pub claim_hash: Vec<u8>,
    pub last_take_over_height: i64,
    pub original_height: i64,
    pub update_height: i64,
    pub valid_height: i64,
    pub activation_height: i64,
    pub expiration_height: i64,
}

impl ClaimtrieEntry {
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.normalized).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClaimRow {
    pub claim_hash: Vec<u8>,
    pub tx_hash: Vec<u8>,
    pub position: i64,
    pub amount: i64,
    pub original_height: i64,
    pub update_height: i64,
    pub valid_height: i64,
    pub activation_height: i64,
    pub expiration_height: i64,
}

// ==============================================================================
// Source Records
// ==============================================================================

/// Status bit set once a block's data is stored.
pub const BLOCK_HAVE_DATA: i64 = 1;
/// Status bit set once a block's undo data is stored.
pub const BLOCK_HAVE_UNDO: i64 = 4;

/// One `block_info` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub file: i64,
    pub data_offset: i64,
    pub height: i64,
    pub hash: Vec<u8>,
    pub tx_count: i64,
    pub status: i64,
}

impl BlockRecord {
    /// Only blocks with both data and undo on disk are reported.
    pub fn is_stored(&self) -> bool {
        self.status & BLOCK_HAVE_DATA != 0 && self.status & BLOCK_HAVE_UNDO != 0
    }
}

/// One `claim` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRecord {
    pub claim_hash: Vec<u8>,
    pub name: Vec<u8>,
    pub tx_hash: Vec<u8>,
    pub position: i64,
    pub amount: i64,
    pub original_height: i64,
    pub update_height: i64,
    pub valid_height: i64,
    pub activation_height: i64,
    pub expiration_height: i64,
}

/// One `takeover` row: `claim_hash` took control of `name` at `height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeoverRecord {
    pub name: Vec<u8>,
    pub height: i64,
    pub claim_hash: Vec<u8>,
}
