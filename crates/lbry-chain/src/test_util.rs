//! Shared test helpers for `lbry-chain` unit tests.

use crate::input::Input;
use crate::output::Output;
use crate::schema::Claim;
use crate::signing::ChannelKey;
use crate::transaction::Transaction;

/// Pubkey hash paid to by test outputs.
pub const PKH: [u8; 20] = [0x42; 20];

/// Stand-in outpoint bytes for claim signatures.
pub const FIRST_INPUT: &[u8] = &[0x21; 36];

/// Put `outputs` into a coinbase-funded transaction so they get a `TxRef`
/// and position.
pub fn attach_outputs(outputs: Vec<Output>) -> Transaction {
    let mut tx = Transaction::default();
    tx.add_inputs([Input::create_coinbase()]).add_outputs(outputs);
    tx
}

/// An attached channel claim holding a fixed private key.
pub fn signed_channel() -> (Output, ChannelKey) {
    let key = ChannelKey::from_secret_bytes(&[0x0c; 32]).expect("valid secret");
    let mut channel = Output::pay_claim_name_pubkey_hash(1, "@channel", Claim::channel("Chan"), PKH)
        .expect("channel output");
    channel
        .set_channel_private_key(key.clone())
        .expect("channel key");
    let tx = attach_outputs(vec![channel]);
    (tx.outputs()[0].clone(), key)
}
