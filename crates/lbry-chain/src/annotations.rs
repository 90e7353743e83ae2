//! Wallet-side metadata attached to outputs, and the arena that resolves
//! links between outputs.
//!
//! None of this is serialized. Links to other outputs are stored as keys
//! (claim hash for claims, `TxoKey` for plain outputs) and resolved through a
//! [`ClaimGraph`], so channel / purchase / repost relations may form cycles
//! across transactions without any output owning another.

use std::collections::HashMap;

use crate::output::Output;
use crate::signing::ChannelKey;
use crate::types::{ClaimHash, TxoKey};

#[derive(Debug, Clone, Default)]
pub struct TxoAnnotations {
    pub is_internal_transfer: Option<bool>,
    pub is_spent: Option<bool>,
    pub is_my_output: Option<bool>,
    pub is_my_input: Option<bool>,
    pub sent_supports: Option<u64>,
    pub sent_tips: Option<u64>,
    pub received_tips: Option<u64>,
    /// Channel the claim is signed by.
    pub channel: Option<ClaimHash>,
    /// Output holding the purchase metadata for this claim.
    pub purchase: Option<TxoKey>,
    /// Claim a purchase output points at.
    pub purchased_claim: Option<ClaimHash>,
    /// Receipt proving this claim was bought.
    pub purchase_receipt: Option<TxoKey>,
    pub reposted_claim: Option<ClaimHash>,
    /// Resolved members of a collection claim.
    pub claims: Option<Vec<ClaimHash>>,
    /// Signing key when this output is one of our channels.
    pub private_key: Option<ChannelKey>,
    pub meta: HashMap<String, serde_json::Value>,
}

impl TxoAnnotations {
    /// Copy the status annotations, channel link and key from `annotated`,
    /// or clear them when `None`. Purchase, repost and collection links and
    /// `meta` are left alone.
    pub fn update_from(&mut self, annotated: Option<&TxoAnnotations>) {
        match annotated {
            Some(other) => {
                self.is_internal_transfer = other.is_internal_transfer;
                self.is_spent = other.is_spent;
                self.is_my_output = other.is_my_output;
                self.is_my_input = other.is_my_input;
                self.sent_supports = other.sent_supports;
                self.sent_tips = other.sent_tips;
                self.received_tips = other.received_tips;
                self.channel = other.channel;
                self.private_key = other.private_key.clone();
            }
            None => {
                self.is_internal_transfer = None;
                self.is_spent = None;
                self.is_my_output = None;
                self.is_my_input = None;
                self.sent_supports = None;
                self.sent_tips = None;
                self.received_tips = None;
                self.channel = None;
                self.private_key = None;
            }
        }
    }
}

// ==============================================================================
// Claim Graph
// ==============================================================================

/// Arena of resolved outputs indexed by `TxoKey` and, for claims, by claim
/// hash. Later inserts for the same key replace earlier ones.
#[derive(Debug, Default)]
pub struct ClaimGraph {
    nodes: Vec<Output>,
    by_txo: HashMap<TxoKey, usize>,
    by_claim: HashMap<ClaimHash, usize>,
}

impl ClaimGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output that is attached to a transaction. Detached outputs
    /// cannot be addressed and are ignored.
    pub fn insert(&mut self, output: Output) -> Option<TxoKey> {
        let key = output.key()?;
        let claim_hash = if output.script.is_claim_involved() {
            output.claim_hash().ok()
        } else {
            None
        };
        let index = match self.by_txo.get(&key) {
            Some(&index) => {
                self.nodes[index] = output;
                index
            }
            None => {
                self.nodes.push(output);
                self.nodes.len() - 1
            }
        };
        self.by_txo.insert(key, index);
        if let Some(claim_hash) = claim_hash {
            self.by_claim.insert(claim_hash, index);
        }
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, key: &TxoKey) -> Option<&Output> {
        self.by_txo.get(key).map(|&index| &self.nodes[index])
    }

    pub fn get_claim(&self, claim_hash: &ClaimHash) -> Option<&Output> {
        self.by_claim.get(claim_hash).map(|&index| &self.nodes[index])
    }

    pub fn channel(&self, output: &Output) -> Option<&Output> {
        self.get_claim(output.annotations.channel.as_ref()?)
    }

    pub fn purchase(&self, output: &Output) -> Option<&Output> {
        self.get(output.annotations.purchase.as_ref()?)
    }

    pub fn purchased_claim(&self, output: &Output) -> Option<&Output> {
        self.get_claim(output.annotations.purchased_claim.as_ref()?)
    }

    pub fn purchase_receipt(&self, output: &Output) -> Option<&Output> {
        self.get(output.annotations.purchase_receipt.as_ref()?)
    }

    pub fn reposted_claim(&self, output: &Output) -> Option<&Output> {
        self.get_claim(output.annotations.reposted_claim.as_ref()?)
    }

    /// Members of a collection that are present in the graph.
    pub fn claims<'a>(&'a self, output: &Output) -> Vec<&'a Output> {
        output
            .annotations
            .claims
            .iter()
            .flatten()
            .filter_map(|claim_hash| self.get_claim(claim_hash))
            .collect()
    }

    /// Hash of the purchased claim: read from the purchase payload when the
    /// purchase output is linked, otherwise from the linked claim.
    pub fn purchased_claim_hash(&self, output: &Output) -> Option<ClaimHash> {
        if let Some(purchase) = self.purchase(output) {
            return purchase.purchase_data().ok().map(|p| p.claim_hash);
        }
        output.annotations.purchased_claim
    }

    pub fn purchased_claim_id(&self, output: &Output) -> Option<String> {
        self.purchased_claim_hash(output).map(|hash| hash.claim_id())
    }
}
