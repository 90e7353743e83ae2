use std::sync::Once;

use lbry_chain::hash::hash160;
use lbry_chain::input::DEFAULT_SEQUENCE;
use lbry_chain::signing::{claim_signature_digest, is_signature_valid};
use lbry_chain::types::TxoRef;
use lbry_chain::{
    ChainError, ChannelKey, Claim, ClaimHash, Input, LedgerConfig, Output, SigningState,
    Transaction,
};

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lbry_chain=debug")),
            )
            .with_target(true)
            .try_init();
    });
}

const COIN: u64 = 100_000_000;
const PKH: [u8; 20] = [0x5a; 20];

fn coinbase_paying(outputs: Vec<Output>) -> Transaction {
    let mut tx = Transaction::default();
    tx.add_inputs([Input::create_coinbase()]).add_outputs(outputs);
    tx
}

/// A pay-pubkey-hash output of `amount`, attached to its own coinbase.
fn utxo(amount: u64, mine: bool) -> Output {
    let mut output = Output::pay_pubkey_hash(amount, PKH);
    output.annotations.is_my_output = Some(mine);
    coinbase_paying(vec![output]).outputs()[0].clone()
}

// ==============================================================================
// Scenarios
// ==============================================================================

#[test]
fn coinbase_transaction_round_trips() {
    init_tracing();
    let tx = coinbase_paying(vec![Output::pay_pubkey_hash(50 * COIN, PKH)]);
    let raw = tx.raw().to_vec();

    let parsed = Transaction::from_raw(&raw).unwrap();
    assert_eq!(parsed.raw(), raw.as_slice());
    assert_eq!(parsed.id(), tx.id());
    let rebuilt = coinbase_paying(vec![Output::pay_pubkey_hash(50 * COIN, PKH)]);
    assert_eq!(parsed.id(), rebuilt.id());
    assert!(parsed.inputs()[0].is_coinbase());
    assert_eq!(parsed.outputs()[0].amount, 50 * COIN);
    assert_eq!(parsed.outputs()[0].pubkey_hash(), Some(PKH));

    let from_hex = Transaction::from_hex(&tx.to_hex()).unwrap();
    assert_eq!(from_hex.hash(), tx.hash());
}

#[test]
fn spend_estimate_matches_standard_input_size() {
    let ledger = LedgerConfig {
        fee_per_byte: 50,
        ..LedgerConfig::default()
    };
    let input = Input::spend(&utxo(COIN, true)).unwrap();
    assert_eq!(input.size(), 148);
    assert_eq!(input.get_fee(&ledger), 7_400);
    assert_eq!(input.amount().unwrap(), COIN);
}

#[test]
fn claim_name_fee_covers_name_length() {
    let ledger = LedgerConfig {
        fee_per_name_char: 2_000_000,
        ..LedgerConfig::default()
    };
    let claim = Output::pay_claim_name_pubkey_hash(COIN, "twelve-chars", Claim::stream("x"), PKH)
        .unwrap();
    assert!(claim.get_fee(&ledger) >= 24_000_000);

    let support = Output::pay_support_pubkey_hash(
        COIN,
        "twelve-chars",
        claim_hash_of(&coinbase_paying(vec![claim]), 0),
        PKH,
    )
    .unwrap();
    assert_eq!(support.get_fee(&ledger), support.size() as u64 * ledger.fee_per_byte);
}

fn claim_hash_of(tx: &Transaction, index: usize) -> ClaimHash {
    tx.outputs()[index].claim_hash().unwrap()
}

#[tokio::test]
async fn stream_signed_by_generated_channel_key() {
    init_tracing();
    let ledger = LedgerConfig::default();

    let mut channel_tx = coinbase_paying(vec![Output::pay_claim_name_pubkey_hash(
        COIN,
        "@chan",
        Claim::channel("Chan"),
        PKH,
    )
    .unwrap()]);
    let key = channel_tx.generate_channel_key(0).await.unwrap();
    let channel = channel_tx.outputs()[0].clone();
    assert!(channel.is_channel_private_key(&key));

    let mut stream_tx = coinbase_paying(vec![Output::pay_claim_name_pubkey_hash(
        COIN,
        "video",
        Claim::stream("My Video"),
        PKH,
    )
    .unwrap()]);
    stream_tx.sign_output(0, &channel, None).unwrap();
    assert_eq!(stream_tx.outputs()[0].signing_state(), SigningState::Signed);
    assert!(stream_tx.is_output_signed_by(0, &channel, &ledger).unwrap());

    stream_tx
        .modify_output(0, |output| {
            let stream = output
                .claim_mut()?
                .as_stream_mut()
                .ok_or_else(|| ChainError::NoClaim("not a stream".into()))?;
            // 'M' ^ 0x01
            stream.title = "Ly Video".into();
            Ok(())
        })
        .unwrap();
    assert!(!stream_tx.is_output_signed_by(0, &channel, &ledger).unwrap());
}

/// Spend our claim-name output, optionally carrying it forward with an
/// update of the same claim.
fn spend_claim(with_update: bool) -> Transaction {
    let mut claim = Output::pay_claim_name_pubkey_hash(COIN, "foo", Claim::stream("foo"), PKH)
        .unwrap();
    claim.annotations.is_my_output = Some(true);
    let claim = coinbase_paying(vec![claim]).outputs()[0].clone();
    let claim_hash = claim.claim_hash().unwrap();

    let mut tx = Transaction::default();
    tx.add_inputs([Input::new(
        TxoRef::resolved(&claim).unwrap(),
        Vec::new(),
        DEFAULT_SEQUENCE,
    )]);
    if with_update {
        let mut update = Output::pay_update_claim_pubkey_hash(
            COIN,
            "foo",
            claim_hash,
            Claim::stream("foo v2"),
            PKH,
        )
        .unwrap();
        update.annotations.is_my_output = Some(true);
        tx.add_outputs([update]);
    }
    tx
}

#[test]
fn abandoned_claims_exclude_updated_ones() {
    assert!(spend_claim(true).my_abandon_outputs().is_empty());

    let abandon = spend_claim(false);
    let abandoned = abandon.my_abandon_outputs();
    assert_eq!(abandoned.len(), 1);
    assert_eq!(abandoned[0].claim_name().unwrap(), "foo");
}

// ==============================================================================
// Properties
// ==============================================================================

#[test]
fn children_point_back_at_transaction() {
    let mut tx = Transaction::default();
    tx.add_inputs([
        Input::spend(&utxo(COIN, true)).unwrap(),
        Input::spend(&utxo(2 * COIN, false)).unwrap(),
    ])
    .add_outputs([Output::pay_pubkey_hash(COIN, PKH)]);
    tx.add_outputs([Output::pay_script_hash(COIN, [0x07; 20])]);

    let tx_ref = tx.tx_ref();
    for (i, input) in tx.inputs().iter().enumerate() {
        assert_eq!(input.position(), Some(i as u32));
        assert_eq!(input.tx_ref(), Some(tx_ref));
    }
    for (i, output) in tx.outputs().iter().enumerate() {
        assert_eq!(output.position(), Some(i as u32));
        assert_eq!(output.tx_ref(), Some(tx_ref));
    }

    tx.set_locktime(500);
    assert_ne!(tx.tx_ref(), tx_ref);
    assert_eq!(tx.outputs()[1].tx_ref(), Some(tx.tx_ref()));
}

#[test]
fn fee_is_inputs_minus_outputs() {
    let mut tx = Transaction::default();
    tx.add_inputs([
        Input::spend(&utxo(3 * COIN, true)).unwrap(),
        Input::spend(&utxo(COIN, true)).unwrap(),
    ])
    .add_outputs([
        Output::pay_pubkey_hash(2 * COIN, PKH),
        Output::pay_pubkey_hash(COIN + COIN / 2, PKH),
    ]);
    assert_eq!(tx.input_sum().unwrap(), 4 * COIN);
    assert_eq!(tx.output_sum().unwrap(), 3 * COIN + COIN / 2);
    assert_eq!(tx.fee().unwrap(), (COIN / 2) as i64);

    let parsed = Transaction::from_raw(tx.raw()).unwrap();
    assert!(matches!(parsed.fee(), Err(ChainError::UnresolvedReference(_))));
}

#[test]
fn claim_hash_follows_output_kind() {
    let tx = coinbase_paying(vec![
        Output::pay_pubkey_hash(COIN, PKH),
        Output::pay_claim_name_pubkey_hash(COIN, "foo", Claim::stream("foo"), PKH).unwrap(),
    ]);
    let claim = &tx.outputs()[1];

    let mut preimage = tx.tx_ref().hash_bytes().to_vec();
    preimage.extend_from_slice(&1u32.to_be_bytes());
    assert_eq!(claim.claim_hash().unwrap().as_bytes(), &hash160(&preimage));

    let hash = claim.claim_hash().unwrap();
    let support = Output::pay_support_pubkey_hash(COIN, "foo", hash, PKH).unwrap();
    assert_eq!(support.claim_hash().unwrap(), hash);

    let mut reversed = *hash.as_bytes();
    reversed.reverse();
    assert_eq!(claim.claim_id().unwrap(), hex::encode(reversed));
    assert_eq!(
        claim.permanent_url().unwrap(),
        format!("lbry://foo#{}", hex::encode(reversed))
    );

    assert!(matches!(
        tx.outputs()[0].claim_hash(),
        Err(ChainError::NoClaim(_))
    ));
}

#[test]
fn any_byte_of_signed_message_breaks_signature() {
    let ledger = LedgerConfig::default();
    let key_tx = {
        let mut channel =
            Output::pay_claim_name_pubkey_hash(COIN, "@c", Claim::channel("C"), PKH).unwrap();
        channel
            .set_channel_private_key(ChannelKey::from_secret_bytes(&[0x33; 32]).unwrap())
            .unwrap();
        coinbase_paying(vec![channel])
    };
    let channel = &key_tx.outputs()[0];

    let mut tx = coinbase_paying(vec![Output::pay_claim_name_pubkey_hash(
        COIN,
        "doc",
        Claim::stream("abc"),
        PKH,
    )
    .unwrap()]);
    tx.sign_output(0, channel, None).unwrap();
    assert!(tx.is_output_signed_by(0, channel, &ledger).unwrap());

    let signed = &tx.outputs()[0];
    let claim = signed.claim().unwrap();
    let channel_hash = claim.signing_channel_hash.unwrap();
    let signature = signed.encoded_signature().unwrap();
    let public_key = channel.claim().unwrap().as_channel().unwrap().public_key_bytes.clone();
    let first_input = tx.first_input_hash().unwrap();
    let message = claim.to_message_bytes();
    assert!(is_signature_valid(
        &signature,
        claim_signature_digest(&first_input, &channel_hash, &message),
        &public_key,
    ));

    for i in 0..message.len() {
        let mut tampered = message.clone();
        tampered[i] ^= 0x01;
        let digest = claim_signature_digest(&first_input, &channel_hash, &tampered);
        assert!(
            !is_signature_valid(&signature, digest, &public_key),
            "flipping byte {i} kept the signature valid"
        );
    }
}

#[test]
fn segwit_transactions_hash_without_witnesses() {
    let legacy = coinbase_paying(vec![Output::pay_pubkey_hash(COIN, PKH)]);
    let legacy_raw = legacy.raw();
    assert_eq!(legacy.raw(), legacy.raw_sans_segwit());

    let mut segwit = legacy_raw[..4].to_vec();
    segwit.extend_from_slice(&[0x00, 0x01]);
    segwit.extend_from_slice(&legacy_raw[4..legacy_raw.len() - 4]);
    segwit.extend_from_slice(&[0x01, 0x02, 0xEE, 0xFF]);
    segwit.extend_from_slice(&legacy_raw[legacy_raw.len() - 4..]);

    let parsed = Transaction::from_raw(&segwit).unwrap();
    assert_eq!(parsed.is_segwit_flag(), 1);
    assert_eq!(parsed.raw_sans_segwit(), legacy_raw);
    assert_eq!(parsed.id(), legacy.id());

    let stripped = Transaction::from_raw(parsed.raw_sans_segwit()).unwrap();
    assert_eq!(stripped.is_segwit_flag(), 0);
    assert_eq!(stripped.version(), parsed.version());
    assert_eq!(stripped.locktime(), parsed.locktime());
    assert_eq!(stripped.outputs()[0].amount, COIN);
}
