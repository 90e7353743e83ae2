pub mod annotations;
pub mod codec;
pub mod error;
pub mod hash;
pub mod index;
pub mod input;
pub mod ledger;
pub mod output;
pub mod schema;
pub mod script;
pub mod signing;
pub mod transaction;
pub mod types;

#[cfg(test)]
mod test_util;

pub use annotations::{ClaimGraph, TxoAnnotations};
pub use error::ChainError;
pub use index::{BlockIndexConfig, BlockIndexStore, BlockchainDb};
pub use input::Input;
pub use ledger::{Ledger, LedgerConfig};
pub use output::{Output, SigningState};
pub use schema::{Claim, Purchase};
pub use signing::ChannelKey;
pub use transaction::Transaction;
pub use types::{ClaimHash, TxRef, TxoKey, TxoRef};
