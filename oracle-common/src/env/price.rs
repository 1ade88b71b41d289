use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::time::Millis;

/// Exchanges a node can be configured to sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Coinbase,
    Kraken,
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Coinbase => "coinbase",
            ExchangeId::Kraken => "kraken",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ExchangeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binance" => Ok(ExchangeId::Binance),
            "coinbase" => Ok(ExchangeId::Coinbase),
            "kraken" => Ok(ExchangeId::Kraken),
            other => Err(format!("unknown exchange '{other}'")),
        }
    }
}

/// A single raw BTC/USD observation. Lives only until it is signed into a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub exchange_id: ExchangeId,
    pub price: Decimal,
    pub observed_at: Millis,
    pub source_sequence: u64,
}

impl PriceTick {
    pub fn new(exchange_id: ExchangeId, price: Decimal, observed_at: Millis, source_sequence: u64) -> Self {
        Self { exchange_id, price, observed_at, source_sequence }
    }
}

/// Upper bound (USD) on any price accepted off the wire or from an exchange.
pub const MAX_PRICE: i64 = 1_000_000_000_000;

/// Parses a decimal price string and rejects non-positive or absurdly large values.
pub fn parse_price(raw: &str) -> Result<Decimal, String> {
    let price = Decimal::from_str(raw.trim()).map_err(|e| format!("'{raw}' is not a decimal: {e}"))?;
    if price <= Decimal::ZERO {
        return Err(format!("price must be positive, got {price}"));
    }
    if price > Decimal::from(MAX_PRICE) {
        return Err(format!("price {price} exceeds the {MAX_PRICE} bound"));
    }
    Ok(price)
}
