//! Input and output scripts as tagged templates.
//!
//! Output scripts are classified into one [`OutputTemplate`] variant that
//! carries only the fields of that template. Standard patterns are detected
//! with the `bitcoin` crate's `Script` helpers; the LBRY claim prefixes are
//! walked with its instruction iterator.
//!
//! Claim templates (the payee is a pay-to-pubkey-hash or pay-to-script-hash
//! script appended after the prefix):
//!
//! ```text
//! OP_CLAIM_NAME    <name> <claim>            OP_2DROP OP_DROP  <payee>
//! OP_SUPPORT_CLAIM <name> <claim_id>         OP_2DROP OP_DROP  <payee>
//! OP_UPDATE_CLAIM  <name> <claim_id> <claim> OP_2DROP OP_2DROP <payee>
//! ```

use std::sync::OnceLock;

use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::{OP_2DROP, OP_DROP, OP_RETURN};
use bitcoin::opcodes::Opcode;
use bitcoin::script::{Builder, Instruction, PushBytesBuf, Script, ScriptBuf};
use bitcoin::{PubkeyHash, ScriptHash};

use crate::error::ChainError;
use crate::schema::{Claim, PayloadCodec, Purchase};
use crate::types::ClaimHash;

pub const OP_CLAIM_NAME: u8 = 0xb5;
pub const OP_SUPPORT_CLAIM: u8 = 0xb6;
pub const OP_UPDATE_CLAIM: u8 = 0xb7;

// ==============================================================================
// Lazily Parsed Payloads
// ==============================================================================

/// Payload bytes embedded in a script, parsed on first access and cached.
///
/// Mutations go through [`LazyPayload::get_mut`]; the byte form is brought
/// back in sync when the owning script is regenerated.
#[derive(Debug, Clone)]
pub struct LazyPayload<T> {
    raw: Vec<u8>,
    parsed: OnceLock<T>,
}

impl<T: PayloadCodec> LazyPayload<T> {
    pub fn from_raw(raw: Vec<u8>) -> Self {
        Self {
            raw,
            parsed: OnceLock::new(),
        }
    }

    pub fn from_parsed(value: T) -> Self {
        let raw = value.to_bytes();
        Self {
            raw,
            parsed: OnceLock::from(value),
        }
    }

    /// Byte form as of the last regeneration.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed.get().is_some()
    }

    pub fn get(&self) -> Result<&T, ChainError> {
        if let Some(value) = self.parsed.get() {
            return Ok(value);
        }
        let value = T::from_bytes(&self.raw)?;
        Ok(self.parsed.get_or_init(|| value))
    }

    pub fn get_mut(&mut self) -> Result<&mut T, ChainError> {
        if self.parsed.get().is_none() {
            let value = T::from_bytes(&self.raw)?;
            let _ = self.parsed.set(value);
        }
        self.parsed
            .get_mut()
            .ok_or_else(|| ChainError::Malformed("payload cache is empty".into()))
    }

    fn sync_raw(&mut self) {
        if let Some(value) = self.parsed.get() {
            self.raw = value.to_bytes();
        }
    }
}

// ==============================================================================
// Output Templates
// ==============================================================================

/// Where the coins of a claim-involved output are paid to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payee {
    PubKeyHash([u8; 20]),
    ScriptHash([u8; 20]),
}

impl Payee {
    fn parse(bytes: &[u8]) -> Option<Self> {
        let script = Script::from_bytes(bytes);
        if script.is_p2pkh() {
            bytes[3..23].try_into().ok().map(Self::PubKeyHash)
        } else if script.is_p2sh() {
            bytes[2..22].try_into().ok().map(Self::ScriptHash)
        } else {
            None
        }
    }

    fn to_script(self) -> ScriptBuf {
        match self {
            Self::PubKeyHash(hash) => ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(hash)),
            Self::ScriptHash(hash) => ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(hash)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum OutputTemplate {
    PayPubKeyHash {
        pubkey_hash: [u8; 20],
    },
    PayScriptHash {
        script_hash: [u8; 20],
    },
    ClaimName {
        claim_name: Vec<u8>,
        claim: LazyPayload<Claim>,
        payee: Payee,
    },
    UpdateClaim {
        claim_name: Vec<u8>,
        claim_id: ClaimHash,
        claim: LazyPayload<Claim>,
        payee: Payee,
    },
    SupportClaim {
        claim_name: Vec<u8>,
        claim_id: ClaimHash,
        payee: Payee,
    },
    ReturnData {
        data: LazyPayload<Purchase>,
    },
    Other,
}

impl OutputTemplate {
    fn parse(source: &[u8]) -> Self {
        let script = Script::from_bytes(source);
        if let Some(payee) = Payee::parse(source) {
            return match payee {
                Payee::PubKeyHash(pubkey_hash) => Self::PayPubKeyHash { pubkey_hash },
                Payee::ScriptHash(script_hash) => Self::PayScriptHash { script_hash },
            };
        }
        if script.is_op_return() {
            return parse_return_data(script).unwrap_or(Self::Other);
        }
        match source.first() {
            Some(&(OP_CLAIM_NAME | OP_SUPPORT_CLAIM | OP_UPDATE_CLAIM)) => {
                parse_claim(script).unwrap_or(Self::Other)
            }
            _ => Self::Other,
        }
    }

    fn payee(&self) -> Option<Payee> {
        match self {
            Self::PayPubKeyHash { pubkey_hash } => Some(Payee::PubKeyHash(*pubkey_hash)),
            Self::PayScriptHash { script_hash } => Some(Payee::ScriptHash(*script_hash)),
            Self::ClaimName { payee, .. }
            | Self::UpdateClaim { payee, .. }
            | Self::SupportClaim { payee, .. } => Some(*payee),
            Self::ReturnData { .. } | Self::Other => None,
        }
    }
}

fn parse_return_data(script: &Script) -> Option<OutputTemplate> {
    let mut instructions = script.instructions();
    instructions.next()?.ok()?;
    let data = match instructions.next() {
        None => Vec::new(),
        Some(Ok(Instruction::PushBytes(bytes))) => bytes.as_bytes().to_vec(),
        Some(_) => return None,
    };
    if instructions.next().is_some() {
        return None;
    }
    Some(OutputTemplate::ReturnData {
        data: LazyPayload::from_raw(data),
    })
}

fn parse_claim(script: &Script) -> Option<OutputTemplate> {
    let source = script.as_bytes();
    let opcode = *source.first()?;
    let (push_count, drops) = match opcode {
        OP_UPDATE_CLAIM => (3, [OP_2DROP, OP_2DROP]),
        _ => (2, [OP_2DROP, OP_DROP]),
    };

    let mut instructions = script.instruction_indices();
    instructions.next()?.ok()?;

    let mut pushes = Vec::with_capacity(push_count);
    for _ in 0..push_count {
        match instructions.next()?.ok()? {
            (_, Instruction::PushBytes(bytes)) => pushes.push(bytes.as_bytes().to_vec()),
            _ => return None,
        }
    }
    for drop in drops {
        match instructions.next()?.ok()? {
            (_, Instruction::Op(op)) if op == drop => {}
            _ => return None,
        }
    }
    let (tail_start, _) = instructions.next()?.ok()?;
    let payee = Payee::parse(&source[tail_start..])?;

    let mut pushes = pushes.into_iter();
    let claim_name = pushes.next()?;
    let template = match opcode {
        OP_CLAIM_NAME => OutputTemplate::ClaimName {
            claim_name,
            claim: LazyPayload::from_raw(pushes.next()?),
            payee,
        },
        OP_SUPPORT_CLAIM => OutputTemplate::SupportClaim {
            claim_name,
            claim_id: ClaimHash::from_slice(&pushes.next()?).ok()?,
            payee,
        },
        _ => OutputTemplate::UpdateClaim {
            claim_name,
            claim_id: ClaimHash::from_slice(&pushes.next()?).ok()?,
            claim: LazyPayload::from_raw(pushes.next()?),
            payee,
        },
    };
    Some(template)
}

fn push_bytes(builder: Builder, data: &[u8]) -> Result<Builder, ChainError> {
    let push = PushBytesBuf::try_from(data.to_vec())
        .map_err(|e| ChainError::Malformed(format!("script push too large: {e}")))?;
    Ok(builder.push_slice(push))
}

fn claim_script(
    opcode: u8,
    pushes: &[&[u8]],
    drops: [Opcode; 2],
    payee: Payee,
) -> Result<Vec<u8>, ChainError> {
    let mut builder = Builder::new().push_opcode(Opcode::from(opcode));
    for push in pushes {
        builder = push_bytes(builder, push)?;
    }
    for drop in drops {
        builder = builder.push_opcode(drop);
    }
    let mut bytes = builder.into_script().into_bytes();
    bytes.extend_from_slice(payee.to_script().as_bytes());
    Ok(bytes)
}

// ==============================================================================
// Output Script
// ==============================================================================

#[derive(Debug, Clone)]
pub struct OutputScript {
    source: Vec<u8>,
    offset: usize,
    template: OutputTemplate,
}

impl OutputScript {
    /// Classify `source`. `offset` is where the script starts inside the
    /// enclosing transaction, or zero for a free-standing script.
    pub fn parse(source: Vec<u8>, offset: usize) -> Self {
        let template = OutputTemplate::parse(&source);
        Self {
            source,
            offset,
            template,
        }
    }

    fn from_template(template: OutputTemplate) -> Result<Self, ChainError> {
        let mut script = Self {
            source: Vec::new(),
            offset: 0,
            template,
        };
        script.generate()?;
        Ok(script)
    }

    pub fn pay_pubkey_hash(pubkey_hash: [u8; 20]) -> Self {
        let source = Payee::PubKeyHash(pubkey_hash).to_script().into_bytes();
        Self::parse(source, 0)
    }

    pub fn pay_script_hash(script_hash: [u8; 20]) -> Self {
        let source = Payee::ScriptHash(script_hash).to_script().into_bytes();
        Self::parse(source, 0)
    }

    pub fn pay_claim_name_pubkey_hash(
        claim_name: &[u8],
        claim: Claim,
        pubkey_hash: [u8; 20],
    ) -> Result<Self, ChainError> {
        Self::from_template(OutputTemplate::ClaimName {
            claim_name: claim_name.to_vec(),
            claim: LazyPayload::from_parsed(claim),
            payee: Payee::PubKeyHash(pubkey_hash),
        })
    }

    pub fn pay_update_claim_pubkey_hash(
        claim_name: &[u8],
        claim_id: ClaimHash,
        claim: Claim,
        pubkey_hash: [u8; 20],
    ) -> Result<Self, ChainError> {
        Self::from_template(OutputTemplate::UpdateClaim {
            claim_name: claim_name.to_vec(),
            claim_id,
            claim: LazyPayload::from_parsed(claim),
            payee: Payee::PubKeyHash(pubkey_hash),
        })
    }

    pub fn pay_support_pubkey_hash(
        claim_name: &[u8],
        claim_id: ClaimHash,
        pubkey_hash: [u8; 20],
    ) -> Result<Self, ChainError> {
        Self::from_template(OutputTemplate::SupportClaim {
            claim_name: claim_name.to_vec(),
            claim_id,
            payee: Payee::PubKeyHash(pubkey_hash),
        })
    }

    pub fn return_data(data: Vec<u8>) -> Result<Self, ChainError> {
        Self::from_template(OutputTemplate::ReturnData {
            data: LazyPayload::from_raw(data),
        })
    }

    pub fn return_purchase(purchase: Purchase) -> Result<Self, ChainError> {
        Self::from_template(OutputTemplate::ReturnData {
            data: LazyPayload::from_parsed(purchase),
        })
    }

    /// Rebuild the script bytes from the template, re-encoding any payload
    /// that was parsed and possibly modified.
    pub fn generate(&mut self) -> Result<(), ChainError> {
        let source = match &mut self.template {
            OutputTemplate::PayPubKeyHash { pubkey_hash } => {
                Payee::PubKeyHash(*pubkey_hash).to_script().into_bytes()
            }
            OutputTemplate::PayScriptHash { script_hash } => {
                Payee::ScriptHash(*script_hash).to_script().into_bytes()
            }
            OutputTemplate::ClaimName {
                claim_name,
                claim,
                payee,
            } => {
                claim.sync_raw();
                claim_script(
                    OP_CLAIM_NAME,
                    &[claim_name.as_slice(), claim.raw()],
                    [OP_2DROP, OP_DROP],
                    *payee,
                )?
            }
            OutputTemplate::UpdateClaim {
                claim_name,
                claim_id,
                claim,
                payee,
            } => {
                claim.sync_raw();
                claim_script(
                    OP_UPDATE_CLAIM,
                    &[claim_name.as_slice(), &claim_id.as_bytes()[..], claim.raw()],
                    [OP_2DROP, OP_2DROP],
                    *payee,
                )?
            }
            OutputTemplate::SupportClaim {
                claim_name,
                claim_id,
                payee,
            } => claim_script(
                OP_SUPPORT_CLAIM,
                &[claim_name.as_slice(), &claim_id.as_bytes()[..]],
                [OP_2DROP, OP_DROP],
                *payee,
            )?,
            OutputTemplate::ReturnData { data } => {
                data.sync_raw();
                push_bytes(Builder::new().push_opcode(OP_RETURN), data.raw())?
                    .into_script()
                    .into_bytes()
            }
            OutputTemplate::Other => return Ok(()),
        };
        self.source = source;
        Ok(())
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn template(&self) -> &OutputTemplate {
        &self.template
    }

    // -- predicates -----------------------------------------------------------

    pub fn is_pay_pubkey_hash(&self) -> bool {
        matches!(self.template.payee(), Some(Payee::PubKeyHash(_)))
    }

    pub fn is_pay_script_hash(&self) -> bool {
        matches!(self.template.payee(), Some(Payee::ScriptHash(_)))
    }

    pub fn is_claim_name(&self) -> bool {
        matches!(self.template, OutputTemplate::ClaimName { .. })
    }

    pub fn is_update_claim(&self) -> bool {
        matches!(self.template, OutputTemplate::UpdateClaim { .. })
    }

    pub fn is_support_claim(&self) -> bool {
        matches!(self.template, OutputTemplate::SupportClaim { .. })
    }

    pub fn is_claim_involved(&self) -> bool {
        self.is_claim_name() || self.is_update_claim() || self.is_support_claim()
    }

    pub fn is_return_data(&self) -> bool {
        matches!(self.template, OutputTemplate::ReturnData { .. })
    }

    // -- values ---------------------------------------------------------------

    pub fn pubkey_hash(&self) -> Option<[u8; 20]> {
        match self.template.payee()? {
            Payee::PubKeyHash(hash) => Some(hash),
            Payee::ScriptHash(_) => None,
        }
    }

    pub fn script_hash(&self) -> Option<[u8; 20]> {
        match self.template.payee()? {
            Payee::ScriptHash(hash) => Some(hash),
            Payee::PubKeyHash(_) => None,
        }
    }

    pub fn claim_name(&self) -> Option<&[u8]> {
        match &self.template {
            OutputTemplate::ClaimName { claim_name, .. }
            | OutputTemplate::UpdateClaim { claim_name, .. }
            | OutputTemplate::SupportClaim { claim_name, .. } => Some(claim_name),
            _ => None,
        }
    }

    /// Claim id carried by update and support scripts.
    pub fn claim_id(&self) -> Option<ClaimHash> {
        match &self.template {
            OutputTemplate::UpdateClaim { claim_id, .. }
            | OutputTemplate::SupportClaim { claim_id, .. } => Some(*claim_id),
            _ => None,
        }
    }

    pub fn claim(&self) -> Option<&LazyPayload<Claim>> {
        match &self.template {
            OutputTemplate::ClaimName { claim, .. } | OutputTemplate::UpdateClaim { claim, .. } => {
                Some(claim)
            }
            _ => None,
        }
    }

    pub fn claim_mut(&mut self) -> Option<&mut LazyPayload<Claim>> {
        match &mut self.template {
            OutputTemplate::ClaimName { claim, .. } | OutputTemplate::UpdateClaim { claim, .. } => {
                Some(claim)
            }
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&LazyPayload<Purchase>> {
        match &self.template {
            OutputTemplate::ReturnData { data } => Some(data),
            _ => None,
        }
    }
}

// ==============================================================================
// Input Script
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputTemplate {
    RedeemPubKeyHash { signature: Vec<u8>, pubkey: Vec<u8> },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputScript {
    source: Vec<u8>,
    template: InputTemplate,
}

impl InputScript {
    pub fn parse(source: Vec<u8>) -> Self {
        let template = parse_redeem(Script::from_bytes(&source)).unwrap_or(InputTemplate::Other);
        Self { source, template }
    }

    /// `<signature> <pubkey>`, the script that spends a pay-to-pubkey-hash output.
    pub fn redeem_pubkey_hash(signature: &[u8], pubkey: &[u8]) -> Result<Self, ChainError> {
        let builder = push_bytes(Builder::new(), signature)?;
        let source = push_bytes(builder, pubkey)?.into_script().into_bytes();
        Ok(Self {
            source,
            template: InputTemplate::RedeemPubKeyHash {
                signature: signature.to_vec(),
                pubkey: pubkey.to_vec(),
            },
        })
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    pub fn template(&self) -> &InputTemplate {
        &self.template
    }

    pub fn is_redeem_pubkey_hash(&self) -> bool {
        matches!(self.template, InputTemplate::RedeemPubKeyHash { .. })
    }
}

fn parse_redeem(script: &Script) -> Option<InputTemplate> {
    let mut pushes = Vec::with_capacity(2);
    for instruction in script.instructions() {
        match instruction.ok()? {
            Instruction::PushBytes(bytes) => pushes.push(bytes.as_bytes().to_vec()),
            Instruction::Op(_) => return None,
        }
    }
    if pushes.len() != 2 {
        return None;
    }
    let pubkey = pushes.pop()?;
    let signature = pushes.pop()?;
    Some(InputTemplate::RedeemPubKeyHash { signature, pubkey })
}
