//! Transaction outputs: the wire entity (`amount`, `script`) plus the
//! wallet-side annotations and the claim accessors built on top of it.

use bitcoin::base58;
use tracing::debug;

use crate::annotations::TxoAnnotations;
use crate::codec::{ByteReader, ByteWriter};
use crate::error::ChainError;
use crate::hash::hash160;
use crate::ledger::Ledger;
use crate::schema::{Claim, Fee, Purchase};
use crate::script::OutputScript;
use crate::signing::{
    claim_signature_digest, encode_signature_der, generate_channel_key, is_signature_valid,
    legacy_signature_digest, ChannelKey,
};
use crate::types::{ClaimHash, TxRef, TxoKey, TxoRef};

/// Where an output's claim stands with respect to channel signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    Unsigned,
    Signed,
    /// Signed under the legacy scheme, over an `unsigned_payload`.
    LegacySigned,
}

#[derive(Debug, Clone)]
pub struct Output {
    /// Amount in dewies.
    pub amount: u64,
    pub script: OutputScript,
    /// Wallet metadata. Never serialized.
    pub annotations: TxoAnnotations,
    tx_ref: Option<TxRef>,
    position: Option<u32>,
}

impl Output {
    pub fn new(amount: u64, script: OutputScript) -> Self {
        Self {
            amount,
            script,
            annotations: TxoAnnotations::default(),
            tx_ref: None,
            position: None,
        }
    }

    // ==========================================================================
    // Factories
    // ==========================================================================

    pub fn pay_pubkey_hash(amount: u64, pubkey_hash: [u8; 20]) -> Self {
        Self::new(amount, OutputScript::pay_pubkey_hash(pubkey_hash))
    }

    pub fn pay_script_hash(amount: u64, script_hash: [u8; 20]) -> Self {
        Self::new(amount, OutputScript::pay_script_hash(script_hash))
    }

    pub fn pay_claim_name_pubkey_hash(
        amount: u64,
        claim_name: &str,
        claim: Claim,
        pubkey_hash: [u8; 20],
    ) -> Result<Self, ChainError> {
        let script =
            OutputScript::pay_claim_name_pubkey_hash(claim_name.as_bytes(), claim, pubkey_hash)?;
        Ok(Self::new(amount, script))
    }

    pub fn pay_update_claim_pubkey_hash(
        amount: u64,
        claim_name: &str,
        claim_hash: ClaimHash,
        claim: Claim,
        pubkey_hash: [u8; 20],
    ) -> Result<Self, ChainError> {
        let script = OutputScript::pay_update_claim_pubkey_hash(
            claim_name.as_bytes(),
            claim_hash,
            claim,
            pubkey_hash,
        )?;
        Ok(Self::new(amount, script))
    }

    pub fn pay_support_pubkey_hash(
        amount: u64,
        claim_name: &str,
        claim_hash: ClaimHash,
        pubkey_hash: [u8; 20],
    ) -> Result<Self, ChainError> {
        let script =
            OutputScript::pay_support_pubkey_hash(claim_name.as_bytes(), claim_hash, pubkey_hash)?;
        Ok(Self::new(amount, script))
    }

    /// Zero-amount `OP_RETURN` output recording a purchase.
    pub fn add_purchase_data(purchase: Purchase) -> Result<Self, ChainError> {
        Ok(Self::new(0, OutputScript::return_purchase(purchase)?))
    }

    // ==========================================================================
    // References
    // ==========================================================================

    /// Reference to the owning transaction, set once the output is added.
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

    pub fn key(&self) -> Option<TxoKey> {
        let tx_ref = self.tx_ref?;
        Some(TxoKey::new(tx_ref.hash(), self.position?))
    }

    /// A reference that resolves back to this output.
    pub fn txo_ref(&self) -> Result<TxoRef, ChainError> {
        TxoRef::resolved(self)
    }

    pub fn id(&self) -> Option<String> {
        self.key().map(|key| key.to_string())
    }

    pub fn hash(&self) -> Option<[u8; 36]> {
        let tx_ref = self.tx_ref?;
        Some(TxoRef::new(tx_ref, self.position?).hash())
    }

    // ==========================================================================
    // Serialization and Fees
    // ==========================================================================

    pub fn serialize_to(&self, w: &mut ByteWriter) {
        w.write_u64(self.amount);
        w.write_string(self.script.source());
    }

    /// Read one output. `transaction_start` is the reader position where the
    /// enclosing transaction begins, so the script offset is recorded
    /// relative to it.
    pub fn deserialize_from(
        r: &mut ByteReader<'_>,
        transaction_start: usize,
    ) -> Result<Self, ChainError> {
        let amount = r.read_u64()?;
        if amount > i64::MAX as u64 {
            return Err(ChainError::Malformed(format!(
                "output amount {amount} exceeds the signed 64-bit range"
            )));
        }
        let length = r.read_compact_size()?;
        let length = usize::try_from(length)
            .map_err(|_| ChainError::Malformed(format!("script length {length} overflows")))?;
        let offset = r.tell() - transaction_start;
        let source = r.read(length)?.to_vec();
        Ok(Self::new(amount, OutputScript::parse(source, offset)))
    }

    pub fn size(&self) -> usize {
        let mut w = ByteWriter::new();
        self.serialize_to(&mut w);
        w.len()
    }

    /// The larger of the byte fee and, for new claims, the per-character
    /// name fee.
    pub fn get_fee(&self, ledger: &dyn Ledger) -> u64 {
        let name_fee = match self.script.claim_name() {
            Some(name) if self.script.is_claim_name() => {
                name.len() as u64 * ledger.fee_per_name_char()
            }
            _ => 0,
        };
        name_fee.max(self.size() as u64 * ledger.fee_per_byte())
    }

    // ==========================================================================
    // Addresses
    // ==========================================================================

    pub fn pubkey_hash(&self) -> Option<[u8; 20]> {
        self.script.pubkey_hash()
    }

    pub fn has_address(&self) -> bool {
        self.pubkey_hash().is_some()
    }

    pub fn get_address(&self, ledger: &dyn Ledger) -> Option<String> {
        self.pubkey_hash()
            .map(|pubkey_hash| ledger.hash160_to_address(&pubkey_hash))
    }

    // ==========================================================================
    // Claims
    // ==========================================================================

    /// Claim name or update, the outputs that carry a claim payload.
    pub fn is_claim(&self) -> bool {
        self.script.is_claim_name() || self.script.is_update_claim()
    }

    pub fn is_support(&self) -> bool {
        self.script.is_support_claim()
    }

    /// New claims derive their hash from the creating outpoint; updates and
    /// supports carry it in the script.
    pub fn claim_hash(&self) -> Result<ClaimHash, ChainError> {
        if self.script.is_claim_name() {
            let (tx_ref, position) = self.tx_ref.zip(self.position).ok_or_else(|| {
                ChainError::UnresolvedReference(
                    "claim hash of an output not attached to a transaction".into(),
                )
            })?;
            let mut outpoint = Vec::with_capacity(36);
            outpoint.extend_from_slice(&tx_ref.hash_bytes());
            outpoint.extend_from_slice(&position.to_be_bytes());
            return Ok(ClaimHash(hash160(&outpoint)));
        }
        self.script
            .claim_id()
            .ok_or_else(|| ChainError::NoClaim("no claim id associated with output".into()))
    }

    pub fn claim_id(&self) -> Result<String, ChainError> {
        self.claim_hash().map(|hash| hash.claim_id())
    }

    pub fn claim_name(&self) -> Result<String, ChainError> {
        let name = self
            .script
            .claim_name()
            .ok_or_else(|| ChainError::NoClaim("output has no claim name".into()))?;
        String::from_utf8(name.to_vec())
            .map_err(|e| ChainError::Malformed(format!("claim name is not utf-8: {e}")))
    }

    /// `lbry://<name>#<claim_id>`.
    pub fn permanent_url(&self) -> Result<String, ChainError> {
        Ok(format!("lbry://{}#{}", self.claim_name()?, self.claim_id()?))
    }

    /// Parsed claim payload, decoded on first access.
    pub fn claim(&self) -> Result<&Claim, ChainError> {
        if !self.is_claim() {
            return Err(ChainError::NoClaim(
                "only claim name and update outputs carry a claim".into(),
            ));
        }
        self.script
            .claim()
            .ok_or_else(|| ChainError::NoClaim("script holds no claim payload".into()))?
            .get()
    }

    /// Mutable claim payload. Call [`Output::regenerate`] (or go through a
    /// `Transaction` method) afterwards so the script bytes follow.
    pub fn claim_mut(&mut self) -> Result<&mut Claim, ChainError> {
        if !self.is_claim() {
            return Err(ChainError::NoClaim(
                "only claim name and update outputs carry a claim".into(),
            ));
        }
        self.script
            .claim_mut()
            .ok_or_else(|| ChainError::NoClaim("script holds no claim payload".into()))?
            .get_mut()
    }

    /// Whether the claim payload decodes. Decoding failures become `false`.
    pub fn can_decode_claim(&self) -> bool {
        self.claim().is_ok()
    }

    /// Re-encode the script bytes from the parsed payloads.
    pub fn regenerate(&mut self) -> Result<(), ChainError> {
        self.script.generate()
    }

    pub fn has_price(&self) -> bool {
        matches!(self.price(), Ok(Some(fee)) if fee.amount > 0)
    }

    /// Fee asked for a priced stream claim.
    pub fn price(&self) -> Result<Option<&Fee>, ChainError> {
        Ok(self.claim()?.as_stream().and_then(|stream| stream.fee.as_ref()))
    }

    // ==========================================================================
    // Purchases
    // ==========================================================================

    pub fn is_purchase_data(&self) -> bool {
        self.script
            .data()
            .is_some_and(|data| data.is_parsed() || Purchase::has_start_byte(data.raw()))
    }

    pub fn purchase_data(&self) -> Result<&Purchase, ChainError> {
        self.script
            .data()
            .ok_or_else(|| ChainError::UnsupportedOutput("output does not carry return data".into()))?
            .get()
    }

    pub fn can_decode_purchase_data(&self) -> bool {
        self.purchase_data().is_ok()
    }

    // ==========================================================================
    // Annotations
    // ==========================================================================

    pub fn has_private_key(&self) -> bool {
        self.annotations.private_key.is_some()
    }

    /// Whether `key` is the key published by this channel claim.
    pub fn is_channel_private_key(&self, key: &ChannelKey) -> bool {
        self.claim()
            .ok()
            .and_then(Claim::as_channel)
            .is_some_and(|channel| key.matches_public_key_der(&channel.public_key_bytes))
    }

    pub fn update_annotations(&mut self, annotated: Option<&Output>) {
        self.annotations
            .update_from(annotated.map(|output| &output.annotations));
    }

    // ==========================================================================
    // Signing
    // ==========================================================================

    pub fn signing_state(&self) -> SigningState {
        match self.claim() {
            Ok(claim) if claim.is_signed() && claim.unsigned_payload.is_some() => {
                SigningState::LegacySigned
            }
            Ok(claim) if claim.is_signed() => SigningState::Signed,
            _ => SigningState::Unsigned,
        }
    }

    /// Digest the claim's signature commits to. Legacy claims sign over the
    /// payee address and `unsigned_payload`; current claims sign over the
    /// first input's outpoint, which the caller supplies.
    pub fn signature_digest(
        &self,
        first_input_hash: Option<&[u8]>,
        ledger: &dyn Ledger,
    ) -> Result<[u8; 32], ChainError> {
        let claim = self.claim()?;
        let channel_hash = claim
            .signing_channel_hash
            .ok_or_else(|| ChainError::InvalidSignature("claim names no signing channel".into()))?;
        match &claim.unsigned_payload {
            Some(payload) => {
                let address = self.get_address(ledger).ok_or_else(|| {
                    ChainError::UnsupportedOutput("legacy signature needs a payee address".into())
                })?;
                let address_bytes = base58::decode(&address)
                    .map_err(|e| ChainError::Malformed(format!("invalid address: {e}")))?;
                Ok(legacy_signature_digest(&address_bytes, payload, &channel_hash))
            }
            None => {
                let first_input_hash = first_input_hash.ok_or_else(|| {
                    ChainError::UnresolvedReference(
                        "signature digest needs the first input of the transaction".into(),
                    )
                })?;
                Ok(claim_signature_digest(
                    first_input_hash,
                    &channel_hash,
                    &claim.to_message_bytes(),
                ))
            }
        }
    }

    /// The claim signature re-encoded as DER.
    pub fn encoded_signature(&self) -> Result<Vec<u8>, ChainError> {
        let signature = self
            .claim()?
            .signature
            .as_ref()
            .ok_or_else(|| ChainError::InvalidSignature("claim is not signed".into()))?;
        encode_signature_der(signature)
    }

    /// Whether this claim carries a valid signature by `channel`. Unsigned
    /// claims and signatures that fail to decode are reported as `false`.
    pub fn is_signed_by(
        &self,
        channel: &Output,
        first_input_hash: Option<&[u8]>,
        ledger: &dyn Ledger,
    ) -> Result<bool, ChainError> {
        let public_key = &channel
            .claim()?
            .as_channel()
            .ok_or_else(|| ChainError::NoClaim("signing output is not a channel".into()))?
            .public_key_bytes;
        if !self.claim()?.is_signed() {
            return Ok(false);
        }
        let digest = self.signature_digest(first_input_hash, ledger)?;
        Ok(self
            .encoded_signature()
            .is_ok_and(|der| is_signature_valid(&der, digest, public_key)))
    }

    /// Sign the claim with `channel`'s private key over `first_input_hash`
    /// and regenerate the script. Always uses the current scheme.
    pub fn sign(&mut self, channel: &Output, first_input_hash: &[u8]) -> Result<(), ChainError> {
        let key = channel
            .annotations
            .private_key
            .as_ref()
            .ok_or(ChainError::MissingPrivateKey)?;
        let channel_hash = channel.claim_hash()?;
        let claim = self.claim_mut()?;
        claim.signing_channel_hash = Some(channel_hash);
        claim.unsigned_payload = None;
        let digest = claim_signature_digest(first_input_hash, &channel_hash, &claim.to_message_bytes());
        claim.signature = Some(key.sign_digest(digest));
        self.annotations.channel = Some(channel_hash);
        self.script.generate()?;
        debug!(channel = %channel_hash, output = ?self.id(), "signed claim");
        Ok(())
    }

    /// Drop the signature and signing channel and regenerate the script.
    pub fn clear_signature(&mut self) -> Result<(), ChainError> {
        self.claim_mut()?.clear_signature();
        self.annotations.channel = None;
        self.script.generate()
    }

    /// Publish `key` in this channel claim and keep it for signing.
    pub fn set_channel_private_key(&mut self, key: ChannelKey) -> Result<(), ChainError> {
        let channel = self
            .claim_mut()?
            .as_channel_mut()
            .ok_or_else(|| ChainError::NoClaim("output is not a channel claim".into()))?;
        channel.public_key_bytes = key.public_key_der();
        self.script.generate()?;
        self.annotations.private_key = Some(key);
        Ok(())
    }

    /// Generate a fresh channel key off the calling task and install it.
    pub async fn generate_channel_private_key(&mut self) -> Result<ChannelKey, ChainError> {
        if !self.claim()?.is_channel() {
            return Err(ChainError::NoClaim("output is not a channel claim".into()));
        }
        let key = generate_channel_key().await?;
        self.set_channel_private_key(key.clone())?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerConfig;
    use crate::schema::{ClaimMessage, PayloadCodec};
    use crate::test_util::{attach_outputs, signed_channel, FIRST_INPUT, PKH};

    #[test]
    fn claim_name_fee_dominates_small_scripts() {
        let output =
            Output::pay_claim_name_pubkey_hash(1, "twelve-chars", Claim::stream("t"), PKH).unwrap();
        let ledger = LedgerConfig {
            fee_per_name_char: 2_000_000,
            ..LedgerConfig::default()
        };
        assert_eq!(output.get_fee(&ledger), 24_000_000);

        let support = Output::pay_support_pubkey_hash(1, "twelve-chars", ClaimHash([1; 20]), PKH)
            .unwrap();
        assert_eq!(support.get_fee(&ledger), support.size() as u64 * 50);
    }

    #[test]
    fn claim_hash_of_new_claim_hashes_outpoint() {
        let tx = attach_outputs(vec![
            Output::pay_pubkey_hash(1, PKH),
            Output::pay_claim_name_pubkey_hash(1, "foo", Claim::stream("t"), PKH).unwrap(),
        ]);
        let output = &tx.outputs()[1];
        let mut outpoint = tx.tx_ref().hash_bytes().to_vec();
        outpoint.extend_from_slice(&[0, 0, 0, 1]);
        let expected = ClaimHash(hash160(&outpoint));
        assert_eq!(output.claim_hash().unwrap(), expected);
        assert_eq!(output.claim_id().unwrap(), expected.claim_id());
        assert_eq!(
            output.permanent_url().unwrap(),
            format!("lbry://foo#{}", expected.claim_id())
        );
    }

    #[test]
    fn update_and_support_take_claim_id_from_script() {
        let claim_hash = ClaimHash([0x5a; 20]);
        let update =
            Output::pay_update_claim_pubkey_hash(1, "foo", claim_hash, Claim::stream("t"), PKH)
                .unwrap();
        assert_eq!(update.claim_hash().unwrap(), claim_hash);
        assert!(update.is_claim());
        let support = Output::pay_support_pubkey_hash(1, "foo", claim_hash, PKH).unwrap();
        assert_eq!(support.claim_hash().unwrap(), claim_hash);
        assert!(support.is_support());
        assert!(matches!(support.claim(), Err(ChainError::NoClaim(_))));
    }

    #[test]
    fn plain_output_has_no_claim() {
        let output = Output::pay_pubkey_hash(1, PKH);
        assert!(matches!(output.claim_hash(), Err(ChainError::NoClaim(_))));
        assert!(matches!(output.claim(), Err(ChainError::NoClaim(_))));
        assert!(!output.can_decode_claim());
        assert!(output.has_address());
        assert_eq!(
            output.get_address(&LedgerConfig::default()),
            Some(LedgerConfig::default().hash160_to_address(&PKH))
        );
    }

    #[test]
    fn undecodable_claim_is_reported_not_raised() {
        let script = OutputScript::pay_claim_name_pubkey_hash(b"foo", Claim::stream("t"), PKH)
            .unwrap();
        let mut bytes = script.source().to_vec();
        // Claim payload starts after opcode, name push and payload length.
        bytes[1 + 1 + 3 + 1] = 0x09;
        let output = Output::new(1, OutputScript::parse(bytes, 0));
        assert!(output.is_claim());
        assert!(!output.can_decode_claim());
        assert!(matches!(output.claim(), Err(ChainError::Malformed(_))));
    }

    #[test]
    fn price_reads_stream_fee() {
        let mut claim = Claim::stream("paid");
        if let Some(stream) = claim.as_stream_mut() {
            stream.fee = Some(Fee {
                currency: "LBC".into(),
                amount: 10,
            });
        }
        let output = Output::pay_claim_name_pubkey_hash(1, "paid", claim, PKH).unwrap();
        assert!(output.has_price());
        assert_eq!(output.price().unwrap().unwrap().amount, 10);

        let free = Output::pay_claim_name_pubkey_hash(1, "free", Claim::stream("f"), PKH).unwrap();
        assert!(!free.has_price());
    }

    #[test]
    fn purchase_data_is_detected_by_start_byte() {
        let purchase = Purchase::new(ClaimHash([3; 20]));
        let output = Output::add_purchase_data(purchase.clone()).unwrap();
        assert_eq!(output.amount, 0);
        let reparsed = Output::new(0, OutputScript::parse(output.script.source().to_vec(), 0));
        assert!(reparsed.is_purchase_data());
        assert_eq!(reparsed.purchase_data().unwrap(), &purchase);

        let other = Output::new(0, OutputScript::return_data(b"hello".to_vec()).unwrap());
        assert!(!other.is_purchase_data());
        assert!(!other.can_decode_purchase_data());
    }

    #[test]
    fn deserialize_records_script_offset() {
        let output = Output::pay_pubkey_hash(7, PKH);
        let mut w = ByteWriter::new();
        w.write(&[0xAA; 10]);
        output.serialize_to(&mut w);
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        r.read(10).unwrap();
        let parsed = Output::deserialize_from(&mut r, 0).unwrap();
        assert_eq!(parsed.amount, 7);
        assert_eq!(parsed.script.offset(), 10 + 8 + 1);
        assert_eq!(parsed.pubkey_hash(), Some(PKH));
    }

    #[test]
    fn sign_then_verify_and_tamper() {
        let (channel, _) = signed_channel();
        let mut stream =
            Output::pay_claim_name_pubkey_hash(1, "video", Claim::stream("Hello"), PKH).unwrap();
        let ledger = LedgerConfig::default();
        assert_eq!(stream.signing_state(), SigningState::Unsigned);

        stream.sign(&channel, FIRST_INPUT).unwrap();
        assert_eq!(stream.signing_state(), SigningState::Signed);
        assert_eq!(stream.annotations.channel, Some(channel.claim_hash().unwrap()));
        assert!(stream
            .is_signed_by(&channel, Some(FIRST_INPUT), &ledger)
            .unwrap());
        assert!(!stream
            .is_signed_by(&channel, Some(&[0u8; 36][..]), &ledger)
            .unwrap());

        // The regenerated script carries the signature.
        let reparsed = Output::new(1, OutputScript::parse(stream.script.source().to_vec(), 0));
        assert!(reparsed
            .is_signed_by(&channel, Some(FIRST_INPUT), &ledger)
            .unwrap());

        stream.claim_mut().unwrap().as_stream_mut().unwrap().title = "Hellp".into();
        assert!(!stream
            .is_signed_by(&channel, Some(FIRST_INPUT), &ledger)
            .unwrap());

        stream.clear_signature().unwrap();
        assert_eq!(stream.signing_state(), SigningState::Unsigned);
        assert_eq!(
            Claim::from_bytes(stream.script.claim().unwrap().raw()).unwrap().signature,
            None
        );
    }

    #[test]
    fn signing_without_key_fails() {
        let tx = attach_outputs(vec![Output::pay_claim_name_pubkey_hash(
            1,
            "@chan",
            Claim::channel("c"),
            PKH,
        )
        .unwrap()]);
        let channel = tx.outputs()[0].clone();
        let mut stream =
            Output::pay_claim_name_pubkey_hash(1, "video", Claim::stream("t"), PKH).unwrap();
        assert!(matches!(
            stream.sign(&channel, FIRST_INPUT),
            Err(ChainError::MissingPrivateKey)
        ));
    }

    #[test]
    fn legacy_signature_uses_address_and_payload() {
        let (channel, key) = signed_channel();
        let channel_hash = channel.claim_hash().unwrap();
        let ledger = LedgerConfig::default();
        let address = base58::decode(&ledger.hash160_to_address(&PKH)).unwrap();

        let mut claim = Claim::stream("old");
        claim.signing_channel_hash = Some(channel_hash);
        claim.unsigned_payload = Some(b"legacy payload".to_vec());
        let digest = legacy_signature_digest(&address, b"legacy payload", &channel_hash);
        claim.signature = Some(key.sign_digest(digest));

        let output = Output::pay_claim_name_pubkey_hash(1, "old", claim, PKH).unwrap();
        assert_eq!(output.signing_state(), SigningState::LegacySigned);
        assert!(output.is_signed_by(&channel, None, &ledger).unwrap());
    }

    #[test]
    fn channel_key_is_published_in_claim() {
        let key = ChannelKey::from_secret_bytes(&[0x07; 32]).unwrap();
        let mut channel =
            Output::pay_claim_name_pubkey_hash(1, "@chan", Claim::channel("c"), PKH).unwrap();
        channel.set_channel_private_key(key.clone()).unwrap();
        assert!(channel.has_private_key());
        assert!(channel.is_channel_private_key(&key));

        let reparsed = Claim::from_bytes(channel.script.claim().unwrap().raw()).unwrap();
        match reparsed.message {
            ClaimMessage::Channel(c) => assert_eq!(c.public_key_bytes, key.public_key_der()),
            other => panic!("expected channel, got {other:?}"),
        }

        let mut stream =
            Output::pay_claim_name_pubkey_hash(1, "video", Claim::stream("t"), PKH).unwrap();
        assert!(matches!(
            stream.set_channel_private_key(key),
            Err(ChainError::NoClaim(_))
        ));
    }

    #[tokio::test]
    async fn generated_channel_key_is_installed() {
        let mut channel =
            Output::pay_claim_name_pubkey_hash(1, "@chan", Claim::channel("c"), PKH).unwrap();
        let key = channel.generate_channel_private_key().await.unwrap();
        assert!(channel.is_channel_private_key(&key));
    }

    #[test]
    fn update_annotations_copies_from_other_output() {
        let mut source = Output::pay_pubkey_hash(1, PKH);
        source.annotations.is_my_output = Some(true);
        let mut target = Output::pay_pubkey_hash(1, PKH);
        target.update_annotations(Some(&source));
        assert_eq!(target.annotations.is_my_output, Some(true));
        target.update_annotations(None);
        assert_eq!(target.annotations.is_my_output, None);
    }
}
