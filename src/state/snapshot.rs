use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Bitcoin amount in satoshis.
///
/// Stored as an integer so running totals are exact; rendered as BTC with
/// eight decimal places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(pub u64);

pub const SATS_PER_BTC: u64 = 100_000_000;

impl Amount {
    pub fn from_btc(btc: f64) -> Self {
        Amount((btc * SATS_PER_BTC as f64).round() as u64)
    }

    pub fn sats(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:08}", self.0 / SATS_PER_BTC, self.0 % SATS_PER_BTC)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        Amount(iter.map(|a| a.0).sum())
    }
}

/// One unspent output watched by the wallet, keyed by its address in the
/// poller snapshot. Replaced wholesale each poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub address: String,
    pub amount: Amount,
    pub confirmations: u64,
    pub txid: String,
}

/// Latest unspent set, keyed by address.
pub type UtxoSet = BTreeMap<String, Utxo>;

/// Summary of a chain tip as first observed by the block poller.
/// Appended to an ever-growing history; the display takes the last N.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSnapshot {
    pub hash: String,
    pub height: u64,
    pub seen_at: DateTime<Local>,
    pub median_fee_rate: f64,
    pub subsidy: Amount,
    pub tx_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_renders_eight_decimals() {
        assert_eq!(Amount(0).to_string(), "0.00000000");
        assert_eq!(Amount(1_500).to_string(), "0.00001500");
        assert_eq!(Amount(250_000_000).to_string(), "2.50000000");
    }

    #[test]
    fn amount_from_btc_rounds_to_sats() {
        assert_eq!(Amount::from_btc(0.00001), Amount(1_000));
        assert_eq!(Amount::from_btc(1.23456789), Amount(123_456_789));
    }

    #[test]
    fn amount_sum_is_exact() {
        let total: Amount = [Amount(1), Amount(2), Amount(3)].into_iter().sum();
        assert_eq!(total, Amount(6));
    }
}
