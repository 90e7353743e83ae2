//! Channel keys and the claim signature scheme.
//!
//! A claim is bound to a channel by signing `sha256(pre_image)` with the
//! channel's secp256k1 key. Signatures are stored in the claim as raw
//! `r ‖ s` and converted to DER for verification. Channel public keys are
//! published inside channel claims as DER `SubjectPublicKeyInfo`.
//!
//! Pre-images:
//!
//! | scheme  | concatenation                                                   |
//! |---------|-----------------------------------------------------------------|
//! | current | first input outpoint (36) ‖ channel hash ‖ message bytes        |
//! | legacy  | decoded address ‖ unsigned payload ‖ reversed channel hash      |

use std::fmt;

use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{rand, Message, PublicKey, Secp256k1, SecretKey};
use tracing::debug;

use crate::error::ChainError;
use crate::hash::{ct_eq, sha256};
use crate::schema::SIGNATURE_LEN;
use crate::types::ClaimHash;

/// `SubjectPublicKeyInfo` header for an uncompressed secp256k1 point.
const SPKI_UNCOMPRESSED_PREFIX: [u8; 23] = [
    0x30, 0x56, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05,
    0x2b, 0x81, 0x04, 0x00, 0x0a, 0x03, 0x42, 0x00,
];

/// `SubjectPublicKeyInfo` header for a compressed secp256k1 point.
const SPKI_COMPRESSED_PREFIX: [u8; 23] = [
    0x30, 0x36, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05,
    0x2b, 0x81, 0x04, 0x00, 0x0a, 0x03, 0x22, 0x00,
];

// ==============================================================================
// Channel Key
// ==============================================================================

/// Private key of a channel claim.
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelKey {
    secret: SecretKey,
}

impl ChannelKey {
    /// Fresh random key. Prefer [`generate_channel_key`] from async code.
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::new(&mut rand::thread_rng()),
        }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| ChainError::Malformed(format!("invalid channel secret key: {e}")))?;
        Ok(Self { secret })
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(&Secp256k1::signing_only(), &self.secret)
    }

    /// DER `SubjectPublicKeyInfo` with the uncompressed point.
    pub fn public_key_der(&self) -> Vec<u8> {
        encode_public_key_der(&self.public_key())
    }

    /// Deterministic (RFC 6979) signature over a 32-byte digest, as raw `r ‖ s`.
    pub fn sign_digest(&self, digest: [u8; 32]) -> [u8; SIGNATURE_LEN] {
        let secp = Secp256k1::signing_only();
        secp.sign_ecdsa(&Message::from_digest(digest), &self.secret)
            .serialize_compact()
    }

    pub fn matches_public_key_der(&self, public_key_der: &[u8]) -> bool {
        ct_eq(&self.public_key_der(), public_key_der)
    }
}

impl fmt::Debug for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Generate a channel key on the blocking pool so the caller's task is not
/// stalled by key generation.
pub async fn generate_channel_key() -> Result<ChannelKey, ChainError> {
    let key = tokio::task::spawn_blocking(ChannelKey::generate)
        .await
        .map_err(|e| ChainError::Worker(format!("channel key generation failed: {e}")))?;
    debug!(public_key = %key.public_key(), "generated channel key");
    Ok(key)
}

// ==============================================================================
// DER Encoding
// ==============================================================================

pub fn encode_public_key_der(public_key: &PublicKey) -> Vec<u8> {
    let mut der = Vec::with_capacity(SPKI_UNCOMPRESSED_PREFIX.len() + 65);
    der.extend_from_slice(&SPKI_UNCOMPRESSED_PREFIX);
    der.extend_from_slice(&public_key.serialize_uncompressed());
    der
}

/// Parse a DER `SubjectPublicKeyInfo` holding a secp256k1 point, in either
/// compressed or uncompressed form.
pub fn decode_public_key_der(der: &[u8]) -> Result<PublicKey, ChainError> {
    let point = [SPKI_UNCOMPRESSED_PREFIX, SPKI_COMPRESSED_PREFIX]
        .iter()
        .find_map(|prefix| der.strip_prefix(prefix.as_slice()))
        .ok_or_else(|| {
            ChainError::InvalidSignature("public key is not a secp256k1 SubjectPublicKeyInfo".into())
        })?;
    PublicKey::from_slice(point)
        .map_err(|e| ChainError::InvalidSignature(format!("invalid public key point: {e}")))
}

/// Convert a raw `r ‖ s` signature to DER.
pub fn encode_signature_der(raw: &[u8]) -> Result<Vec<u8>, ChainError> {
    if raw.len() != SIGNATURE_LEN {
        return Err(ChainError::InvalidSignature(format!(
            "expected a {SIGNATURE_LEN}-byte signature, got {}",
            raw.len()
        )));
    }
    let signature = Signature::from_compact(raw)
        .map_err(|e| ChainError::InvalidSignature(format!("invalid signature scalars: {e}")))?;
    Ok(signature.serialize_der().to_vec())
}

// ==============================================================================
// Digests and Verification
// ==============================================================================

/// Digest signed by current-scheme claims.
#[must_use]
pub fn claim_signature_digest(
    first_input_hash: &[u8],
    signing_channel_hash: &ClaimHash,
    message: &[u8],
) -> [u8; 32] {
    let mut pre_image =
        Vec::with_capacity(first_input_hash.len() + signing_channel_hash.0.len() + message.len());
    pre_image.extend_from_slice(first_input_hash);
    pre_image.extend_from_slice(signing_channel_hash.as_bytes());
    pre_image.extend_from_slice(message);
    sha256(&pre_image)
}

/// Digest signed by legacy claims carrying an `unsigned_payload`.
#[must_use]
pub fn legacy_signature_digest(
    address_bytes: &[u8],
    unsigned_payload: &[u8],
    signing_channel_hash: &ClaimHash,
) -> [u8; 32] {
    let mut reversed = signing_channel_hash.0;
    reversed.reverse();
    let mut pre_image =
        Vec::with_capacity(address_bytes.len() + unsigned_payload.len() + reversed.len());
    pre_image.extend_from_slice(address_bytes);
    pre_image.extend_from_slice(unsigned_payload);
    pre_image.extend_from_slice(&reversed);
    sha256(&pre_image)
}

/// Verify a DER signature over a pre-hashed digest against a DER public key.
pub fn verify_digest(
    signature_der: &[u8],
    digest: [u8; 32],
    public_key_der: &[u8],
) -> Result<(), ChainError> {
    let public_key = decode_public_key_der(public_key_der)?;
    let mut signature = Signature::from_der(signature_der)
        .map_err(|e| ChainError::InvalidSignature(format!("invalid DER signature: {e}")))?;
    // Signers outside this crate may emit high-S values.
    signature.normalize_s();
    Secp256k1::verification_only()
        .verify_ecdsa(&Message::from_digest(digest), &signature, &public_key)
        .map_err(|e| ChainError::InvalidSignature(e.to_string()))
}

/// [`verify_digest`] collapsed to a boolean.
#[must_use]
pub fn is_signature_valid(signature_der: &[u8], digest: [u8; 32], public_key_der: &[u8]) -> bool {
    verify_digest(signature_der, digest, public_key_der).is_ok()
}
