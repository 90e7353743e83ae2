//! Claim and purchase payload codecs.
//!
//! These stand in for the full metadata schema: the transaction layer only
//! needs the byte form, the signing fields (`signing_channel_hash`,
//! `signature`, `unsigned_payload`), `to_message_bytes()`, a stream title and
//! fee, and a channel public key.
//!
//! Claim envelope:
//!
//! | first byte | layout after it                                                   |
//! |------------|-------------------------------------------------------------------|
//! | `0x00`     | message                                                           |
//! | `0x01`     | channel hash (20) ‖ signature (64) ‖ message                      |
//! | `0x02`     | channel hash (20) ‖ signature (64) ‖ len-prefixed payload ‖ message |

use crate::codec::{ByteReader, ByteWriter};
use crate::error::ChainError;
use crate::types::ClaimHash;

/// Length of a raw `r ‖ s` signature.
pub const SIGNATURE_LEN: usize = 64;

const ENVELOPE_UNSIGNED: u8 = 0x00;
const ENVELOPE_SIGNED: u8 = 0x01;
const ENVELOPE_LEGACY: u8 = 0x02;

const KIND_STREAM: u8 = 1;
const KIND_CHANNEL: u8 = 2;
const KIND_REPOST: u8 = 3;
const KIND_COLLECTION: u8 = 4;

/// Conversion between a payload's byte form and its parsed form.
pub trait PayloadCodec: Sized {
    fn from_bytes(data: &[u8]) -> Result<Self, ChainError>;
    fn to_bytes(&self) -> Vec<u8>;
}

// ==============================================================================
// Claim Messages
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fee {
    pub currency: String,
    pub amount: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stream {
    pub title: String,
    pub description: String,
    pub fee: Option<Fee>,
}

impl Stream {
    pub fn has_fee(&self) -> bool {
        self.fee.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    /// DER `SubjectPublicKeyInfo` of the channel's secp256k1 key.
    pub public_key_bytes: Vec<u8>,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimMessage {
    Stream(Stream),
    Channel(Channel),
    Repost(ClaimHash),
    Collection(Vec<ClaimHash>),
}

impl ClaimMessage {
    fn write_to(&self, w: &mut ByteWriter) {
        match self {
            Self::Stream(stream) => {
                w.write_u8(KIND_STREAM);
                w.write_string(stream.title.as_bytes());
                w.write_string(stream.description.as_bytes());
                match &stream.fee {
                    Some(fee) => {
                        w.write_u8(1);
                        w.write_string(fee.currency.as_bytes());
                        w.write_u64(fee.amount);
                    }
                    None => w.write_u8(0),
                }
            }
            Self::Channel(channel) => {
                w.write_u8(KIND_CHANNEL);
                w.write_string(&channel.public_key_bytes);
                w.write_string(channel.title.as_bytes());
            }
            Self::Repost(claim_hash) => {
                w.write_u8(KIND_REPOST);
                w.write(claim_hash.as_bytes());
            }
            Self::Collection(claims) => {
                w.write_u8(KIND_COLLECTION);
                w.write_compact_size(claims.len() as u64);
                for claim_hash in claims {
                    w.write(claim_hash.as_bytes());
                }
            }
        }
    }

    fn read_from(r: &mut ByteReader<'_>) -> Result<Self, ChainError> {
        match r.read_u8()? {
            KIND_STREAM => {
                let title = read_utf8(r, "stream title")?;
                let description = read_utf8(r, "stream description")?;
                let fee = match r.read_u8()? {
                    0 => None,
                    1 => Some(Fee {
                        currency: read_utf8(r, "fee currency")?,
                        amount: r.read_u64()?,
                    }),
                    other => {
                        return Err(ChainError::Malformed(format!("invalid fee flag {other}")))
                    }
                };
                Ok(Self::Stream(Stream {
                    title,
                    description,
                    fee,
                }))
            }
            KIND_CHANNEL => Ok(Self::Channel(Channel {
                public_key_bytes: r.read_string()?.to_vec(),
                title: read_utf8(r, "channel title")?,
            })),
            KIND_REPOST => Ok(Self::Repost(ClaimHash(r.read_array()?))),
            KIND_COLLECTION => {
                let count = r.read_compact_size()?;
                let mut claims = Vec::new();
                for _ in 0..count {
                    claims.push(ClaimHash(r.read_array()?));
                }
                Ok(Self::Collection(claims))
            }
            other => Err(ChainError::Malformed(format!("unknown claim kind {other}"))),
        }
    }
}

fn read_utf8(r: &mut ByteReader<'_>, field: &str) -> Result<String, ChainError> {
    let bytes = r.read_string()?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ChainError::Malformed(format!("invalid utf-8 in {field}: {e}")))
}

// ==============================================================================
// Claim
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub message: ClaimMessage,
    pub signing_channel_hash: Option<ClaimHash>,
    /// Raw `r ‖ s`.
    pub signature: Option<[u8; SIGNATURE_LEN]>,
    /// Pre-image payload of claims signed under the legacy scheme.
    pub unsigned_payload: Option<Vec<u8>>,
}

impl Claim {
    pub fn new(message: ClaimMessage) -> Self {
        Self {
            message,
            signing_channel_hash: None,
            signature: None,
            unsigned_payload: None,
        }
    }

    pub fn stream(title: impl Into<String>) -> Self {
        Self::new(ClaimMessage::Stream(Stream {
            title: title.into(),
            ..Stream::default()
        }))
    }

    pub fn channel(title: impl Into<String>) -> Self {
        Self::new(ClaimMessage::Channel(Channel {
            public_key_bytes: Vec::new(),
            title: title.into(),
        }))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.message, ClaimMessage::Stream(_))
    }

    pub fn is_channel(&self) -> bool {
        matches!(self.message, ClaimMessage::Channel(_))
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match &self.message {
            ClaimMessage::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn as_stream_mut(&mut self) -> Option<&mut Stream> {
        match &mut self.message {
            ClaimMessage::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&Channel> {
        match &self.message {
            ClaimMessage::Channel(channel) => Some(channel),
            _ => None,
        }
    }

    pub fn as_channel_mut(&mut self) -> Option<&mut Channel> {
        match &mut self.message {
            ClaimMessage::Channel(channel) => Some(channel),
            _ => None,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn clear_signature(&mut self) {
        self.signing_channel_hash = None;
        self.signature = None;
        self.unsigned_payload = None;
    }

    /// The serialized message without the signing envelope.
    pub fn to_message_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        self.message.write_to(&mut w);
        w.into_bytes()
    }
}

impl PayloadCodec for Claim {
    fn from_bytes(data: &[u8]) -> Result<Self, ChainError> {
        let mut r = ByteReader::new(data);
        let envelope = r.read_u8()?;
        let mut claim = match envelope {
            ENVELOPE_UNSIGNED => Self::new(ClaimMessage::read_from(&mut r)?),
            ENVELOPE_SIGNED | ENVELOPE_LEGACY => {
                let channel_hash = ClaimHash(r.read_array()?);
                let signature = r.read_array::<SIGNATURE_LEN>()?;
                let unsigned_payload = if envelope == ENVELOPE_LEGACY {
                    Some(r.read_string()?.to_vec())
                } else {
                    None
                };
                Self {
                    message: ClaimMessage::read_from(&mut r)?,
                    signing_channel_hash: Some(channel_hash),
                    signature: Some(signature),
                    unsigned_payload,
                }
            }
            other => {
                return Err(ChainError::Malformed(format!(
                    "unknown claim envelope {other:#04x}"
                )))
            }
        };
        if r.remaining() != 0 {
            return Err(ChainError::Malformed(format!(
                "{} trailing bytes after claim message",
                r.remaining()
            )));
        }
        // A signature without a channel is not representable on the wire.
        if claim.signing_channel_hash.is_none() {
            claim.signature = None;
        }
        Ok(claim)
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        match (&self.signing_channel_hash, &self.signature) {
            (Some(channel_hash), Some(signature)) => {
                w.write_u8(if self.unsigned_payload.is_some() {
                    ENVELOPE_LEGACY
                } else {
                    ENVELOPE_SIGNED
                });
                w.write(channel_hash.as_bytes());
                w.write(&signature[..]);
                if let Some(payload) = &self.unsigned_payload {
                    w.write_string(payload);
                }
            }
            _ => w.write_u8(ENVELOPE_UNSIGNED),
        }
        self.message.write_to(&mut w);
        w.into_bytes()
    }
}

// ==============================================================================
// Purchase
// ==============================================================================

/// Return-data payload recording the purchase of a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub claim_hash: ClaimHash,
}

impl Purchase {
    pub const START_BYTE: u8 = b'P';

    pub fn new(claim_hash: ClaimHash) -> Self {
        Self { claim_hash }
    }

    pub fn has_start_byte(data: &[u8]) -> bool {
        data.first() == Some(&Self::START_BYTE)
    }

    pub fn claim_id(&self) -> String {
        self.claim_hash.claim_id()
    }
}

impl PayloadCodec for Purchase {
    fn from_bytes(data: &[u8]) -> Result<Self, ChainError> {
        match data.split_first() {
            Some((&Self::START_BYTE, rest)) => Ok(Self::new(ClaimHash::from_slice(rest)?)),
            _ => Err(ChainError::Malformed("purchase data lacks start byte".into())),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(21);
        out.push(Self::START_BYTE);
        out.extend_from_slice(self.claim_hash.as_bytes());
        out
    }
}
