use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use oracle_common::{error::FetchError, ExchangeId, PriceTick};

use super::{checked_price, get_json, tick, ExchangeAdapter, Sequence};

const TICKER_URL: &str = "https://api.kraken.com/0/public/Ticker";

#[derive(Debug, Deserialize)]
pub(crate) struct TickerResponse {
    #[serde(default)]
    pub error: Vec<String>,
    #[serde(default)]
    pub result: HashMap<String, PairTicker>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PairTicker {
    /// Last trade: `[price, lot volume]`.
    pub c: Vec<String>,
}

/// Kraken keys the result by its own pair name (`XXBTZUSD`), so the single entry is taken.
pub(crate) fn last_trade(response: &TickerResponse) -> Result<&str, FetchError> {
    if !response.error.is_empty() {
        return Err(FetchError::Request(response.error.join("; ")));
    }
    let pair = response.result.values().next().ok_or(FetchError::Empty)?;
    pair.c
        .first()
        .map(String::as_str)
        .ok_or_else(|| FetchError::Parse("ticker has no last trade".into()))
}

pub struct KrakenAdapter {
    http: reqwest::Client,
    url: String,
    sequence: Sequence,
}

impl KrakenAdapter {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_url(http, TICKER_URL)
    }

    pub fn with_url(http: reqwest::Client, url: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
            sequence: Sequence::default(),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for KrakenAdapter {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::Kraken
    }

    async fn fetch_price(&self) -> Result<PriceTick, FetchError> {
        let request = self.http.get(&self.url).query(&[("pair", "XBTUSD")]);
        let response: TickerResponse = get_json(ExchangeId::Kraken, request).await?;
        let price = checked_price(ExchangeId::Kraken, last_trade(&response)?)?;
        Ok(tick(ExchangeId::Kraken, price, &self.sequence))
    }
}
