use crate::codec::{ByteReader, ByteWriter};
use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::output::Output;
use crate::script::InputScript;
use crate::types::{TxRef, TxoRef};

/// Placeholder signature sized like a worst-case DER signature plus sighash byte.
pub const NULL_SIGNATURE: [u8; 72] = [0u8; 72];
/// Placeholder compressed public key.
pub const NULL_PUBLIC_KEY: [u8; 33] = [0u8; 33];
pub const NULL_HASH32: [u8; 32] = [0u8; 32];
pub const COINBASE_PLACEHOLDER: &[u8] = b"beef";
pub const DEFAULT_SEQUENCE: u32 = 0xFFFF_FFFF;

/// What an input carries in its script slot: a redeem script when it
/// spends an output, raw bytes when it is a coinbase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Script(InputScript),
    Coinbase(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct Input {
    txo_ref: TxoRef,
    source: InputSource,
    pub sequence: u32,
    tx_ref: Option<TxRef>,
    position: Option<u32>,
}

impl Input {
    /// Coinbase when `txo_ref` is null, otherwise `script` is parsed as a
    /// redeem script.
    pub fn new(txo_ref: TxoRef, script: Vec<u8>, sequence: u32) -> Self {
        let source = if txo_ref.is_null() {
            InputSource::Coinbase(script)
        } else {
            InputSource::Script(InputScript::parse(script))
        };
        Self {
            txo_ref,
            source,
            sequence,
            tx_ref: None,
            position: None,
        }
    }

    /// Spend a pay-to-pubkey-hash output. The redeem script holds zeroed
    /// placeholders of the final signature and key sizes, so size and fee
    /// estimates are accurate before signing.
    pub fn spend(output: &Output) -> Result<Self, ChainError> {
        if !output.script.is_pay_pubkey_hash() {
            return Err(ChainError::UnsupportedOutput(
                "only pay-to-pubkey-hash outputs can be spent".into(),
            ));
        }
        let script = InputScript::redeem_pubkey_hash(&NULL_SIGNATURE, &NULL_PUBLIC_KEY)?;
        Ok(Self {
            txo_ref: TxoRef::resolved(output)?,
            source: InputSource::Script(script),
            sequence: DEFAULT_SEQUENCE,
            tx_ref: None,
            position: None,
        })
    }

    pub fn create_coinbase() -> Self {
        let txo_ref = TxoRef::new(TxRef::from_hash(NULL_HASH32, 0), 0);
        Self::new(txo_ref, COINBASE_PLACEHOLDER.to_vec(), DEFAULT_SEQUENCE)
    }

    pub fn txo_ref(&self) -> &TxoRef {
        &self.txo_ref
    }

    pub fn source(&self) -> &InputSource {
        &self.source
    }

    pub fn script(&self) -> Option<&InputScript> {
        match &self.source {
            InputSource::Script(script) => Some(script),
            InputSource::Coinbase(_) => None,
        }
    }

    pub fn coinbase(&self) -> Option<&[u8]> {
        match &self.source {
            InputSource::Coinbase(bytes) => Some(bytes),
            InputSource::Script(_) => None,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self.source, InputSource::Coinbase(_))
    }

    pub fn tx_ref(&self) -> Option<TxRef> {
        self.tx_ref
    }

    pub fn position(&self) -> Option<u32> {
        self.position
    }

    pub(crate) fn attach(&mut self, tx_ref: TxRef, position: u32) {
        self.tx_ref = Some(tx_ref);
        self.position = Some(position);
    }

    /// Amount of the spent output; requires a resolved reference.
    pub fn amount(&self) -> Result<u64, ChainError> {
        self.txo_ref.txo().map(|txo| txo.amount).ok_or_else(|| {
            ChainError::UnresolvedReference(format!(
                "cannot resolve output {} to get amount",
                self.txo_ref.id()
            ))
        })
    }

    /// Whether the spent output is ours. Unresolved inputs are not.
    pub fn is_my_input(&self) -> Option<bool> {
        match self.txo_ref.txo() {
            None => Some(false),
            Some(txo) => txo.annotations.is_my_output,
        }
    }

    // -- serialization --------------------------------------------------------

    /// Write the input, optionally with `alternate_script` in place of the
    /// script slot (used when building signature pre-images).
    pub fn serialize_to(&self, w: &mut ByteWriter, alternate_script: Option<&[u8]>) {
        w.write(&self.txo_ref.tx_ref().hash_bytes());
        w.write_u32(self.txo_ref.position());
        match (alternate_script, &self.source) {
            (Some(script), _) => w.write_string(script),
            (None, InputSource::Coinbase(bytes)) => w.write_string(bytes),
            (None, InputSource::Script(script)) => w.write_string(script.source()),
        }
        w.write_u32(self.sequence);
    }

    pub fn deserialize_from(r: &mut ByteReader<'_>) -> Result<Self, ChainError> {
        let tx_ref = TxRef::from_hash(r.read_array()?, -1);
        let position = r.read_u32()?;
        let script = r.read_string()?.to_vec();
        let sequence = r.read_u32()?;
        Ok(Self::new(TxoRef::new(tx_ref, position), script, sequence))
    }

    pub fn size(&self) -> usize {
        let mut w = ByteWriter::new();
        self.serialize_to(&mut w, None);
        w.len()
    }

    pub fn get_fee(&self, ledger: &dyn Ledger) -> u64 {
        self.size() as u64 * ledger.fee_per_byte()
    }
}
