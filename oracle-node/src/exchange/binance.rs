use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use serde_json::Value;
use tracing::debug;

use oracle_common::{error::FetchError, ExchangeId, PriceTick};

use super::{checked_price, get_json, tick, ExchangeAdapter, Sequence};

const KLINES_URL: &str = "https://api.binance.com/api/v3/klines";

/// Close of the last completed one-minute BTCUSDT candle.
pub struct BinanceAdapter {
    http: reqwest::Client,
    base_url: String,
    sequence: Sequence,
}

impl BinanceAdapter {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, KLINES_URL)
    }

    pub fn with_base_url(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            sequence: Sequence::default(),
        }
    }
}

/// `[start, end)` of the minute before the one containing `now`, in millis.
pub(crate) fn previous_minute(now: DateTime<Utc>) -> (i64, i64) {
    let current = now
        .duration_trunc(ChronoDuration::minutes(1))
        .unwrap_or(now);
    let start = current - ChronoDuration::minutes(1);
    (start.timestamp_millis(), current.timestamp_millis())
}

/// Kline rows are positional arrays; index 4 is the close as a string.
pub(crate) fn parse_klines(klines: &[Vec<Value>]) -> Result<&str, FetchError> {
    let kline = klines.first().ok_or(FetchError::Empty)?;
    kline
        .get(4)
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::Parse("kline close is missing or not a string".into()))
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    async fn fetch_price(&self) -> Result<PriceTick, FetchError> {
        let (start, end) = previous_minute(Utc::now());
        let request = self.http.get(&self.base_url).query(&[
            ("symbol", "BTCUSDT".to_string()),
            ("interval", "1m".to_string()),
            ("startTime", start.to_string()),
            ("endTime", end.to_string()),
            ("limit", "1".to_string()),
        ]);

        let klines: Vec<Vec<Value>> = get_json(ExchangeId::Binance, request).await?;
        let price = checked_price(ExchangeId::Binance, parse_klines(&klines)?)?;
        debug!("📊 Binance 1m close {} (candle from {})", price, start);
        Ok(tick(ExchangeId::Binance, price, &self.sequence))
    }
}
