//! The transaction container: wire codec, identity, signature pre-images,
//! amounts and the wallet-facing output filters.
//!
//! A `Transaction` exclusively owns its inputs and outputs. Each child
//! carries a copy of the transaction's [`TxRef`] and its own position; every
//! structural change goes through [`Transaction::invalidate`], which drops the
//! cached serialization and id and re-stamps the children.

use std::fmt;
use std::sync::OnceLock;

use bitcoin::Txid;
use tracing::{debug, trace};

use crate::annotations::TxoAnnotations;
use crate::codec::{ByteReader, ByteWriter};
use crate::error::ChainError;
use crate::hash::double_sha256;
use crate::input::Input;
use crate::ledger::{ordinal_day, Ledger};
use crate::output::Output;
use crate::signing::ChannelKey;
use crate::types::{TxRef, HEIGHT_MEMPOOL, HEIGHT_MEMPOOL_UNCONFIRMED_INPUTS, HEIGHT_NOT_BROADCAST};

pub const SIGHASH_ALL: u32 = 1;

#[derive(Debug, Clone)]
pub struct Transaction {
    version: u32,
    locktime: u32,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    is_segwit_flag: u8,
    witnesses: Vec<Vec<u8>>,
    raw: OnceLock<Vec<u8>>,
    tx_ref: OnceLock<TxRef>,
    julian_day: OnceLock<i32>,
    height: i32,
    /// Index within the confirming block, `-1` when unknown.
    pub position: i32,
    pub is_verified: bool,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

impl Transaction {
    pub fn new(version: u32, locktime: u32) -> Self {
        Self {
            version,
            locktime,
            inputs: Vec::new(),
            outputs: Vec::new(),
            is_segwit_flag: 0,
            witnesses: Vec::new(),
            raw: OnceLock::new(),
            tx_ref: OnceLock::new(),
            julian_day: OnceLock::new(),
            height: HEIGHT_NOT_BROADCAST,
            position: -1,
            is_verified: false,
        }
    }

    // ==========================================================================
    // Structure
    // ==========================================================================

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn set_version(&mut self, version: u32) {
        self.version = version;
        self.invalidate();
    }

    pub fn locktime(&self) -> u32 {
        self.locktime
    }

    pub fn set_locktime(&mut self, locktime: u32) {
        self.locktime = locktime;
        self.invalidate();
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn is_segwit_flag(&self) -> u8 {
        self.is_segwit_flag
    }

    /// Witness items drained while parsing, in input order.
    pub fn witnesses(&self) -> &[Vec<u8>] {
        &self.witnesses
    }

    pub fn add_inputs(&mut self, inputs: impl IntoIterator<Item = Input>) -> &mut Self {
        self.inputs.extend(inputs);
        self.invalidate();
        self
    }

    pub fn add_outputs(&mut self, outputs: impl IntoIterator<Item = Output>) -> &mut Self {
        self.outputs.extend(outputs);
        self.invalidate();
        self
    }

    /// Wallet annotations of an output. They are not part of the wire form,
    /// so editing them leaves the cached id intact.
    pub fn annotations_mut(&mut self, index: usize) -> Option<&mut TxoAnnotations> {
        self.outputs.get_mut(index).map(|output| &mut output.annotations)
    }

    /// Edit an output in place. Its script is regenerated from the parsed
    /// payloads afterwards and the transaction invalidated.
    pub fn modify_output<R>(
        &mut self,
        index: usize,
        edit: impl FnOnce(&mut Output) -> Result<R, ChainError>,
    ) -> Result<R, ChainError> {
        let output = self.output_mut(index)?;
        let result = edit(&mut *output);
        let regenerated = output.regenerate();
        self.invalidate();
        let result = result?;
        regenerated?;
        Ok(result)
    }

    fn output_mut(&mut self, index: usize) -> Result<&mut Output, ChainError> {
        let count = self.outputs.len();
        self.outputs.get_mut(index).ok_or_else(|| {
            ChainError::Malformed(format!("output {index} out of range ({count} outputs)"))
        })
    }

    fn output(&self, index: usize) -> Result<&Output, ChainError> {
        self.outputs.get(index).ok_or_else(|| {
            ChainError::Malformed(format!(
                "output {index} out of range ({} outputs)",
                self.outputs.len()
            ))
        })
    }

    /// Drop the cached serialization and id, then stamp the new reference
    /// and positions onto every input and output.
    pub fn invalidate(&mut self) {
        self.raw.take();
        self.tx_ref.take();
        self.stamp_children();
    }

    fn stamp_children(&mut self) {
        let tx_ref = self.tx_ref();
        for (position, input) in self.inputs.iter_mut().enumerate() {
            input.attach(tx_ref, position as u32);
        }
        for (position, output) in self.outputs.iter_mut().enumerate() {
            output.attach(tx_ref, position as u32);
        }
    }

    // ==========================================================================
    // Identity and Status
    // ==========================================================================

    pub fn tx_ref(&self) -> TxRef {
        *self
            .tx_ref
            .get_or_init(|| TxRef::from_hash(double_sha256(self.raw_sans_segwit()), self.height))
    }

    pub fn hash(&self) -> Txid {
        self.tx_ref().hash()
    }

    pub fn id(&self) -> String {
        self.tx_ref().id()
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn set_height(&mut self, height: i32) {
        self.height = height;
        self.tx_ref.take();
        self.julian_day.take();
        self.stamp_children();
    }

    pub fn is_broadcast(&self) -> bool {
        self.height > HEIGHT_NOT_BROADCAST
    }

    pub fn is_mempool(&self) -> bool {
        self.height == HEIGHT_MEMPOOL_UNCONFIRMED_INPUTS || self.height == HEIGHT_MEMPOOL
    }

    pub fn is_confirmed(&self) -> bool {
        self.height > HEIGHT_MEMPOOL
    }

    /// Ordinal day (0001-01-01 is day 1) of the estimated confirmation date.
    /// `None` until the transaction is confirmed.
    pub fn get_ordinal_day(&self, ledger: &dyn Ledger) -> Option<i32> {
        if let Some(day) = self.julian_day.get() {
            return Some(*day);
        }
        if !self.is_confirmed() {
            return None;
        }
        let day = ordinal_day(ledger.estimated_date(self.height)?);
        Some(*self.julian_day.get_or_init(|| day))
    }

    // ==========================================================================
    // Wire Codec
    // ==========================================================================

    /// Serialized transaction. Witness data is never emitted, so this always
    /// equals [`Transaction::raw_sans_segwit`].
    pub fn raw(&self) -> &[u8] {
        self.raw.get_or_init(|| self.serialize())
    }

    pub fn raw_sans_segwit(&self) -> &[u8] {
        self.raw()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.raw())
    }

    fn serialize(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_u32(self.version);
        w.write_compact_size(self.inputs.len() as u64);
        for input in &self.inputs {
            input.serialize_to(&mut w, None);
        }
        self.write_outputs_and_locktime(&mut w);
        w.into_bytes()
    }

    fn write_outputs_and_locktime(&self, w: &mut ByteWriter) {
        w.write_compact_size(self.outputs.len() as u64);
        for output in &self.outputs {
            output.serialize_to(w);
        }
        w.write_u32(self.locktime);
    }

    pub fn from_raw(raw: &[u8]) -> Result<Self, ChainError> {
        let mut r = ByteReader::new(raw);
        let tx = Self::deserialize_from(&mut r)?;
        if r.remaining() != 0 {
            return Err(ChainError::Malformed(format!(
                "{} trailing bytes after transaction",
                r.remaining()
            )));
        }
        Ok(tx)
    }

    pub fn from_hex(raw_hex: &str) -> Result<Self, ChainError> {
        let raw = hex::decode(raw_hex.trim())
            .map_err(|e| ChainError::Malformed(format!("invalid transaction hex: {e}")))?;
        Self::from_raw(&raw)
    }

    /// Parse one transaction from `r`, leaving the cursor after it.
    ///
    /// A zero input count marks a segwit transaction: a flag byte and the
    /// real input count follow, and the witness stacks are drained after the
    /// outputs. Legacy transactions keep the exact bytes consumed as their
    /// cached serialization.
    pub fn deserialize_from(r: &mut ByteReader<'_>) -> Result<Self, ChainError> {
        let start = r.tell();
        let version = r.read_u32()?;
        let mut input_count = r.read_compact_size()?;
        let mut is_segwit_flag = 0;
        if input_count == 0 {
            is_segwit_flag = r.read_u8()?;
            input_count = r.read_compact_size()?;
            trace!(flag = is_segwit_flag, input_count, "segwit marker in transaction");
        }
        let inputs = (0..input_count)
            .map(|_| Input::deserialize_from(r))
            .collect::<Result<Vec<_>, _>>()?;
        let output_count = r.read_compact_size()?;
        let outputs = (0..output_count)
            .map(|_| Output::deserialize_from(r, start))
            .collect::<Result<Vec<_>, _>>()?;
        let mut witnesses = Vec::new();
        if is_segwit_flag != 0 {
            for _ in 0..input_count {
                for _ in 0..r.read_compact_size()? {
                    witnesses.push(r.read_string()?.to_vec());
                }
            }
        }
        let locktime = r.read_u32()?;

        let mut tx = Self::new(version, locktime);
        tx.inputs = inputs;
        tx.outputs = outputs;
        tx.is_segwit_flag = is_segwit_flag;
        tx.witnesses = witnesses;
        if is_segwit_flag == 0 {
            let _ = tx.raw.set(r.consumed_since(start).to_vec());
        }
        tx.stamp_children();
        Ok(tx)
    }

    // ==========================================================================
    // Sizes and Amounts
    // ==========================================================================

    pub fn size(&self) -> usize {
        self.raw().len()
    }

    /// Size without the inputs and outputs.
    pub fn base_size(&self) -> usize {
        let children: usize = self.inputs.iter().map(Input::size).sum::<usize>()
            + self.outputs.iter().map(Output::size).sum::<usize>();
        self.size().saturating_sub(children)
    }

    pub fn get_base_fee(&self, ledger: &dyn Ledger) -> u64 {
        self.base_size() as u64 * ledger.fee_per_byte()
    }

    /// Sum of the amounts of inputs whose spent output is resolved.
    pub fn input_sum(&self) -> Result<u64, ChainError> {
        checked_sum(
            self.inputs
                .iter()
                .filter_map(|input| input.txo_ref().txo())
                .map(|txo| txo.amount),
        )
    }

    pub fn output_sum(&self) -> Result<u64, ChainError> {
        checked_sum(self.outputs.iter().map(|output| output.amount))
    }

    /// `input_sum - output_sum`. Every input must be resolved.
    pub fn fee(&self) -> Result<i64, ChainError> {
        let mut inputs: u64 = 0;
        for input in &self.inputs {
            inputs = inputs.checked_add(input.amount()?).ok_or_else(amount_overflow)?;
        }
        checked_sub(signed(inputs)?, signed(self.output_sum()?)?)
    }

    /// Input amounts minus the fee to spend them.
    pub fn get_effective_input_sum(&self, ledger: &dyn Ledger) -> Result<i64, ChainError> {
        let mut sum: i64 = 0;
        for input in &self.inputs {
            let effective = checked_sub(signed(input.amount()?)?, signed(input.get_fee(ledger))?)?;
            sum = checked_add(sum, effective)?;
        }
        Ok(sum)
    }

    /// Output amounts plus the fee to create them.
    pub fn get_total_output_sum(&self, ledger: &dyn Ledger) -> Result<u64, ChainError> {
        checked_sum(
            self.outputs
                .iter()
                .flat_map(|output| [output.amount, output.get_fee(ledger)]),
        )
    }

    /// What this transaction adds to (or takes from) our balance. Needs
    /// `is_my_input` on every resolved input and `is_my_output` on every
    /// output.
    pub fn net_account_balance(&self) -> Result<i64, ChainError> {
        let mut balance: i64 = 0;
        for input in &self.inputs {
            let Some(txo) = input.txo_ref().txo() else {
                continue;
            };
            match txo.annotations.is_my_output {
                Some(true) => balance = checked_sub(balance, signed(txo.amount)?)?,
                Some(false) => {}
                None => return Err(ChainError::MissingAnnotation("is_my_input")),
            }
        }
        for output in &self.outputs {
            match output.annotations.is_my_output {
                Some(true) => balance = checked_add(balance, signed(output.amount)?)?,
                Some(false) => {}
                None => return Err(ChainError::MissingAnnotation("is_my_output")),
            }
        }
        Ok(balance)
    }

    // ==========================================================================
    // Input Signature Pre-images
    // ==========================================================================

    /// SIGHASH_ALL pre-image for input `index`: the spent output's script in
    /// that input's slot, empty scripts elsewhere, then the hash type.
    pub fn signature_preimage(&self, index: usize) -> Result<Vec<u8>, ChainError> {
        let signing = self.inputs.get(index).ok_or_else(|| {
            ChainError::Malformed(format!(
                "input {index} out of range ({} inputs)",
                self.inputs.len()
            ))
        })?;
        let spent = signing.txo_ref().txo().ok_or_else(|| {
            ChainError::UnresolvedReference(format!(
                "input {index} spends unresolved output {}",
                signing.txo_ref().id()
            ))
        })?;

        let mut w = ByteWriter::new();
        w.write_u32(self.version);
        w.write_compact_size(self.inputs.len() as u64);
        for (i, input) in self.inputs.iter().enumerate() {
            let script = if i == index { spent.script.source() } else { &[] };
            input.serialize_to(&mut w, Some(script));
        }
        self.write_outputs_and_locktime(&mut w);
        w.write_u32(SIGHASH_ALL);
        Ok(w.into_bytes())
    }

    pub fn signature_hash(&self, index: usize) -> Result<[u8; 32], ChainError> {
        Ok(double_sha256(&self.signature_preimage(index)?))
    }

    // ==========================================================================
    // Claim Signing
    // ==========================================================================

    /// Wire form of the first input's outpoint, the anchor of claim
    /// signatures.
    pub fn first_input_hash(&self) -> Option<[u8; 36]> {
        self.inputs.first().map(|input| input.txo_ref().hash())
    }

    fn signing_anchor(&self, first_input_override: Option<&[u8]>) -> Result<Vec<u8>, ChainError> {
        match first_input_override {
            Some(hash) => Ok(hash.to_vec()),
            None => self.first_input_hash().map(|hash| hash.to_vec()).ok_or_else(|| {
                ChainError::UnresolvedReference("claim signing needs at least one input".into())
            }),
        }
    }

    /// Sign the claim in output `index` with `channel`. The first input's
    /// outpoint is used unless `first_input_override` supplies another one,
    /// as when claims are signed before their funding inputs are chosen.
    pub fn sign_output(
        &mut self,
        index: usize,
        channel: &Output,
        first_input_override: Option<&[u8]>,
    ) -> Result<(), ChainError> {
        let anchor = self.signing_anchor(first_input_override)?;
        let signed = self.output_mut(index)?.sign(channel, &anchor);
        self.invalidate();
        signed?;
        debug!(tx = %self.id(), output = index, "claim signature attached");
        Ok(())
    }

    pub fn clear_output_signature(&mut self, index: usize) -> Result<(), ChainError> {
        let cleared = self.output_mut(index)?.clear_signature();
        self.invalidate();
        cleared
    }

    pub fn output_signature_digest(
        &self,
        index: usize,
        ledger: &dyn Ledger,
    ) -> Result<[u8; 32], ChainError> {
        let first_input = self.first_input_hash();
        self.output(index)?
            .signature_digest(first_input.as_ref().map(|hash| hash.as_slice()), ledger)
    }

    pub fn is_output_signed_by(
        &self,
        index: usize,
        channel: &Output,
        ledger: &dyn Ledger,
    ) -> Result<bool, ChainError> {
        let first_input = self.first_input_hash();
        self.output(index)?.is_signed_by(
            channel,
            first_input.as_ref().map(|hash| hash.as_slice()),
            ledger,
        )
    }

    /// Generate and install a key for the channel claim in output `index`.
    pub async fn generate_channel_key(&mut self, index: usize) -> Result<ChannelKey, ChainError> {
        let generated = self.output_mut(index)?.generate_channel_private_key().await;
        self.invalidate();
        generated
    }

    // ==========================================================================
    // Wallet Filters
    // ==========================================================================

    /// Inputs spending one of our outputs.
    pub fn my_inputs(&self) -> impl Iterator<Item = &Input> + '_ {
        self.inputs.iter().filter(|input| {
            input
                .txo_ref()
                .txo()
                .is_some_and(|txo| txo.annotations.is_my_output == Some(true))
        })
    }

    fn my_outputs_where<'a>(
        &'a self,
        predicate: impl Fn(&Output) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Output> + 'a {
        self.outputs
            .iter()
            .filter(move |output| output.annotations.is_my_output == Some(true) && predicate(output))
    }

    pub fn my_claim_outputs(&self) -> impl Iterator<Item = &Output> + '_ {
        self.my_outputs_where(|output| output.script.is_claim_name())
    }

    pub fn my_update_outputs(&self) -> impl Iterator<Item = &Output> + '_ {
        self.my_outputs_where(|output| output.script.is_update_claim())
    }

    pub fn my_support_outputs(&self) -> impl Iterator<Item = &Output> + '_ {
        self.my_outputs_where(|output| output.script.is_support_claim())
    }

    /// Outputs linked to a purchase.
    pub fn any_purchase_outputs(&self) -> impl Iterator<Item = &Output> + '_ {
        self.outputs
            .iter()
            .filter(|output| output.annotations.purchase.is_some())
    }

    /// Supports paid to claims that are not ours.
    pub fn other_support_outputs(&self) -> impl Iterator<Item = &Output> + '_ {
        self.outputs.iter().filter(|output| {
            output.annotations.is_my_output != Some(true) && output.script.is_support_claim()
        })
    }

    /// Our claim-involved outputs spent here without being carried forward
    /// by an update of the same claim.
    pub fn my_abandon_outputs(&self) -> Vec<&Output> {
        let updated: Vec<_> = self
            .my_update_outputs()
            .filter_map(|update| update.claim_hash().ok())
            .collect();
        self.inputs
            .iter()
            .filter_map(|input| input.txo_ref().txo())
            .filter(|spent| {
                spent.annotations.is_my_output == Some(true) && spent.script.is_claim_involved()
            })
            .filter(|spent| {
                if !spent.is_claim() {
                    return true;
                }
                spent
                    .claim_hash()
                    .map_or(true, |claim_hash| !updated.contains(&claim_hash))
            })
            .collect()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id();
        write!(f, "TX({}...{})", &id[..10], &id[id.len() - 10..])
    }
}

fn amount_overflow() -> ChainError {
    ChainError::Malformed("amount sum overflows".into())
}

fn checked_sum(amounts: impl IntoIterator<Item = u64>) -> Result<u64, ChainError> {
    amounts
        .into_iter()
        .try_fold(0u64, |sum, amount| sum.checked_add(amount))
        .ok_or_else(amount_overflow)
}

fn signed(amount: u64) -> Result<i64, ChainError> {
    i64::try_from(amount).map_err(|_| amount_overflow())
}

fn checked_add(a: i64, b: i64) -> Result<i64, ChainError> {
    a.checked_add(b).ok_or_else(amount_overflow)
}

fn checked_sub(a: i64, b: i64) -> Result<i64, ChainError> {
    a.checked_sub(b).ok_or_else(amount_overflow)
}
