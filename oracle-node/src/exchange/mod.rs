//! Exchange adapters.
//!
//! One `ExchangeAdapter` per supported venue, selected by the node config. Adapters
//! do a single HTTP round trip per call; the caller owns timeouts and retries.

mod binance;
mod coinbase;
mod kraken;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;

use oracle_common::{
    env::price::parse_price, error::FetchError, utils::time::now_millis, ExchangeId, PriceTick,
};

pub use binance::BinanceAdapter;
pub use coinbase::CoinbaseAdapter;
pub use kraken::KrakenAdapter;

const USER_AGENT: &str = concat!("oracle-node/", env!("CARGO_PKG_VERSION"));

/// Prices outside this band (USD) are logged but still reported.
const SANE_LOW: i64 = 1_000;
const SANE_HIGH: i64 = 1_000_000;

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn exchange_id(&self) -> ExchangeId;

    /// One BTC/USD observation.
    async fn fetch_price(&self) -> Result<PriceTick, FetchError>;
}

pub fn build_adapter(exchange: ExchangeId, request_timeout: Duration) -> Result<Arc<dyn ExchangeAdapter>, FetchError> {
    let http = http_client(request_timeout)?;
    let adapter: Arc<dyn ExchangeAdapter> = match exchange {
        ExchangeId::Binance => Arc::new(BinanceAdapter::new(http)),
        ExchangeId::Coinbase => Arc::new(CoinbaseAdapter::new(http)),
        ExchangeId::Kraken => Arc::new(KrakenAdapter::new(http)),
    };
    Ok(adapter)
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FetchError::Request(e.to_string()))
}

/// Maps a non-success HTTP status to a fetch error with a readable hint.
pub(crate) fn status_error(exchange: ExchangeId, status: u16) -> FetchError {
    let message = match status {
        400 => "bad request, check query parameters".to_string(),
        401 => "unauthorized".to_string(),
        403 => "forbidden".to_string(),
        404 => "endpoint or symbol not found".to_string(),
        429 => "rate limit exceeded".to_string(),
        500..=599 => format!("{} server error", exchange),
        _ => "unexpected status".to_string(),
    };
    FetchError::Status { status, message }
}

/// Sends `request` and decodes a JSON body, mapping transport and status failures.
pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    exchange: ExchangeId,
    request: reqwest::RequestBuilder,
) -> Result<T, FetchError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Request(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(status_error(exchange, status.as_u16()));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| FetchError::Parse(e.to_string()))
}

/// Parses a raw price field and warns on implausible values.
pub(crate) fn checked_price(exchange: ExchangeId, raw: &str) -> Result<Decimal, FetchError> {
    let price = parse_price(raw).map_err(FetchError::InvalidPrice)?;
    if price < Decimal::from(SANE_LOW) {
        warn!("⚠️ Unusually low BTC price from {}: {}", exchange, price);
    } else if price > Decimal::from(SANE_HIGH) {
        warn!("⚠️ Unusually high BTC price from {}: {}", exchange, price);
    }
    Ok(price)
}

/// Per-adapter tick counter.
#[derive(Debug, Default)]
pub(crate) struct Sequence(AtomicU64);

impl Sequence {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub(crate) fn tick(exchange: ExchangeId, price: Decimal, sequence: &Sequence) -> PriceTick {
    PriceTick::new(exchange, price, now_millis(), sequence.next())
}
