//! Reference types shared across the transaction model.
//!
//! Contains the transaction back-reference (`TxRef`), the output reference
//! (`TxoRef`, optionally resolved to the output it points at), the plain
//! `TxoKey` used to index outputs, the 20-byte `ClaimHash`, and the height
//! sentinels used by `Transaction::height`.

use std::fmt;
use std::sync::Arc;

use bitcoin::hashes::Hash;
use bitcoin::{OutPoint, Txid};
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::output::Output;

// ==============================================================================
// Height Sentinels
// ==============================================================================

/// Not broadcast yet.
pub const HEIGHT_NOT_BROADCAST: i32 = -2;
/// In the mempool, spending at least one unconfirmed output.
pub const HEIGHT_MEMPOOL_UNCONFIRMED_INPUTS: i32 = -1;
/// In the mempool with every input confirmed.
pub const HEIGHT_MEMPOOL: i32 = 0;

// ==============================================================================
// Transaction Reference
// ==============================================================================

/// An immutable back-reference to a transaction: its hash plus the height
/// it was seen at.
///
/// A `Transaction` keeps its own reference in a lazily computed cache and
/// stamps a copy onto each input and output; the copies are refreshed every
/// time the transaction is invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxRef {
    hash: Txid,
    height: i32,
}

impl TxRef {
    pub fn new(hash: Txid, height: i32) -> Self {
        Self { hash, height }
    }

    /// Build from the 32 raw hash bytes in wire (internal) order.
    pub fn from_hash(bytes: [u8; 32], height: i32) -> Self {
        Self::new(Txid::from_byte_array(bytes), height)
    }

    pub fn null() -> Self {
        Self::new(Txid::all_zeros(), -1)
    }

    pub fn hash(&self) -> Txid {
        self.hash
    }

    pub fn hash_bytes(&self) -> [u8; 32] {
        self.hash.to_byte_array()
    }

    /// Reversed-byte lowercase hex, the conventional txid display form.
    pub fn id(&self) -> String {
        self.hash.to_string()
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn is_null(&self) -> bool {
        self.hash == Txid::all_zeros()
    }
}

// ==============================================================================
// Output Keys and References
// ==============================================================================

/// `(txid, position)` pair identifying an output without carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxoKey {
    pub txid: Txid,
    pub position: u32,
}

impl TxoKey {
    pub fn new(txid: Txid, position: u32) -> Self {
        Self { txid, position }
    }
}

impl fmt::Display for TxoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.position)
    }
}

impl From<TxoKey> for OutPoint {
    fn from(key: TxoKey) -> Self {
        OutPoint::new(key.txid, key.position)
    }
}

impl From<OutPoint> for TxoKey {
    fn from(outpoint: OutPoint) -> Self {
        Self::new(outpoint.txid, outpoint.vout)
    }
}

/// Reference to an output being spent.
///
/// A *resolved* reference also carries a snapshot of the output itself,
/// which is what makes the spending input's amount knowable.
#[derive(Debug, Clone)]
pub struct TxoRef {
    tx_ref: TxRef,
    position: u32,
    txo: Option<Arc<Output>>,
}

impl TxoRef {
    pub fn new(tx_ref: TxRef, position: u32) -> Self {
        Self {
            tx_ref,
            position,
            txo: None,
        }
    }

    /// A reference that resolves to `output`. The output must already be
    /// attached to a transaction.
    pub fn resolved(output: &Output) -> Result<Self, ChainError> {
        let (tx_ref, position) = output.tx_ref().zip(output.position()).ok_or_else(|| {
            ChainError::UnresolvedReference("output is not attached to a transaction".into())
        })?;
        Ok(Self {
            tx_ref,
            position,
            txo: Some(Arc::new(output.clone())),
        })
    }

    pub fn tx_ref(&self) -> &TxRef {
        &self.tx_ref
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    /// The referenced output, when this reference is resolved.
    pub fn txo(&self) -> Option<&Output> {
        self.txo.as_deref()
    }

    pub fn is_null(&self) -> bool {
        self.tx_ref.is_null()
    }

    pub fn key(&self) -> TxoKey {
        TxoKey::new(self.tx_ref.hash(), self.position)
    }

    /// `"<txid>:<position>"`.
    pub fn id(&self) -> String {
        self.key().to_string()
    }

    /// Raw wire form: the 32 hash bytes followed by the little-endian position.
    pub fn hash(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..32].copy_from_slice(&self.tx_ref.hash_bytes());
        out[32..].copy_from_slice(&self.position.to_le_bytes());
        out
    }
}

// ==============================================================================
// Claim Hash
// ==============================================================================

/// The 20-byte identity of a claim, kept in the little-endian order it has
/// inside scripts. The user-facing claim id is its reversed hex form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClaimHash(pub [u8; 20]);

impl ClaimHash {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ChainError> {
        let array: [u8; 20] = bytes.try_into().map_err(|_| {
            ChainError::Malformed(format!("claim hash must be 20 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    /// Parse a user-facing claim id (reversed hex).
    pub fn from_claim_id(claim_id: &str) -> Result<Self, ChainError> {
        let mut bytes = hex::decode(claim_id)
            .map_err(|e| ChainError::Malformed(format!("invalid claim id {claim_id:?}: {e}")))?;
        bytes.reverse();
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn claim_id(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }
}

impl fmt::Display for ClaimHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.claim_id())
    }
}

impl fmt::Debug for ClaimHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClaimHash({})", self.claim_id())
    }
}

impl TryFrom<String> for ClaimHash {
    type Error = ChainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_claim_id(&value)
    }
}

impl From<ClaimHash> for String {
    fn from(hash: ClaimHash) -> Self {
        hash.claim_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_ref_id_is_reversed_hex() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xAB;
        bytes[31] = 0x01;
        let tx_ref = TxRef::from_hash(bytes, 7);
        assert!(tx_ref.id().starts_with("01"));
        assert!(tx_ref.id().ends_with("ab"));
        assert_eq!(tx_ref.height(), 7);
        assert!(!tx_ref.is_null());
        assert!(TxRef::null().is_null());
    }

    #[test]
    fn txo_ref_hash_appends_le_position() {
        let tx_ref = TxRef::from_hash([0x11; 32], 1);
        let txo_ref = TxoRef::new(tx_ref, 0x0102_0304);
        let hash = txo_ref.hash();
        assert_eq!(&hash[..32], &[0x11; 32]);
        assert_eq!(&hash[32..], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(txo_ref.id(), format!("{}:{}", tx_ref.id(), 0x0102_0304));
        assert!(txo_ref.txo().is_none());
    }

    #[test]
    fn claim_id_round_trips_through_claim_hash() {
        let claim_id = "beef0000000000000000000000000000000000aa";
        let hash = ClaimHash::from_claim_id(claim_id).unwrap();
        assert_eq!(hash.0[0], 0xAA);
        assert_eq!(hash.0[19], 0xBE);
        assert_eq!(hash.claim_id(), claim_id);
    }

    #[test]
    fn claim_hash_rejects_wrong_length() {
        assert!(matches!(
            ClaimHash::from_claim_id("abcd"),
            Err(ChainError::Malformed(_))
        ));
    }

    #[test]
    fn claim_hash_serializes_as_claim_id() {
        let hash = ClaimHash([0x01; 20]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.claim_id()));
        let back: ClaimHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
