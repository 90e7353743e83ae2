//! Network parameters consumed by fee, address and date computations.

use bitcoin::base58;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Ledger-side configuration the transaction model depends on.
pub trait Ledger: Send + Sync {
    /// Fee in dewies per serialized byte.
    fn fee_per_byte(&self) -> u64;

    /// Surcharge in dewies per character of a new claim's name.
    fn fee_per_name_char(&self) -> u64;

    fn hash160_to_address(&self, hash160: &[u8; 20]) -> String;

    /// Estimated wall-clock date of the block at `height`.
    fn estimated_date(&self, height: i32) -> Option<time::Date>;
}

/// Default LBRY mainnet parameters; every field can be overridden from any
/// serde source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub fee_per_byte: u64,
    pub fee_per_name_char: u64,
    pub pubkey_address_prefix: u8,
    pub script_address_prefix: u8,
    /// Unix timestamp of the genesis block.
    pub genesis_timestamp: i64,
    /// Target seconds between blocks.
    pub target_block_time: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fee_per_byte: 50,
            fee_per_name_char: 200_000,
            pubkey_address_prefix: 0x55,
            script_address_prefix: 0x7a,
            genesis_timestamp: 1_446_058_291,
            target_block_time: 150,
        }
    }
}

impl LedgerConfig {
    pub fn script_hash_to_address(&self, script_hash: &[u8; 20]) -> String {
        encode_address(self.script_address_prefix, script_hash)
    }
}

fn encode_address(prefix: u8, hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(prefix);
    payload.extend_from_slice(hash);
    base58::encode_check(&payload)
}

impl Ledger for LedgerConfig {
    fn fee_per_byte(&self) -> u64 {
        self.fee_per_byte
    }

    fn fee_per_name_char(&self) -> u64 {
        self.fee_per_name_char
    }

    fn hash160_to_address(&self, hash160: &[u8; 20]) -> String {
        encode_address(self.pubkey_address_prefix, hash160)
    }

    fn estimated_date(&self, height: i32) -> Option<time::Date> {
        let timestamp = self
            .genesis_timestamp
            .checked_add(i64::from(height).checked_mul(self.target_block_time)?)?;
        OffsetDateTime::from_unix_timestamp(timestamp)
            .ok()
            .map(OffsetDateTime::date)
    }
}

/// Proleptic Gregorian ordinal of `date`, with 0001-01-01 as day 1.
#[must_use]
pub fn ordinal_day(date: time::Date) -> i32 {
    // Julian day number of 0001-01-01 is 1_721_426.
    date.to_julian_day() - 1_721_425
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Month};

    #[test]
    fn ordinal_day_matches_gregorian_ordinal() {
        let first = Date::from_calendar_date(1, Month::January, 1).unwrap();
        assert_eq!(ordinal_day(first), 1);
        let epoch = Date::from_calendar_date(1970, Month::January, 1).unwrap();
        assert_eq!(ordinal_day(epoch), 719_163);
    }

    #[test]
    fn estimated_date_advances_with_height() {
        let ledger = LedgerConfig::default();
        let genesis = ledger.estimated_date(0).unwrap();
        assert_eq!(genesis, Date::from_calendar_date(2015, Month::October, 28).unwrap());
        // 576 blocks of 150 s is exactly one day.
        let next_day = ledger.estimated_date(576).unwrap();
        assert_eq!(next_day.to_julian_day() - genesis.to_julian_day(), 1);
    }

    #[test]
    fn addresses_use_network_prefix() {
        let ledger = LedgerConfig::default();
        let address = ledger.hash160_to_address(&[0u8; 20]);
        let decoded = base58::decode_check(&address).unwrap();
        assert_eq!(decoded[0], 0x55);
        assert_eq!(&decoded[1..], &[0u8; 20]);
        assert!(address.starts_with('b'));
    }

    #[test]
    fn config_deserializes_with_partial_overrides() {
        let config: LedgerConfig = serde_json::from_str(r#"{"fee_per_byte": 10}"#).unwrap();
        assert_eq!(config.fee_per_byte, 10);
        assert_eq!(config.fee_per_name_char, 200_000);
    }
}
