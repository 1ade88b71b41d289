use async_trait::async_trait;
use serde::Deserialize;

use oracle_common::{error::FetchError, ExchangeId, PriceTick};

use super::{checked_price, get_json, tick, ExchangeAdapter, Sequence};

const SPOT_URL: &str = "https://api.coinbase.com/v2/prices/BTC-USD/spot";

#[derive(Debug, Deserialize)]
pub(crate) struct SpotResponse {
    pub data: SpotData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpotData {
    pub amount: String,
    #[serde(default)]
    pub currency: Option<String>,
}

pub struct CoinbaseAdapter {
    http: reqwest::Client,
    url: String,
    sequence: Sequence,
}

impl CoinbaseAdapter {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_url(http, SPOT_URL)
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
impl ExchangeAdapter for CoinbaseAdapter {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::Coinbase
    }

    async fn fetch_price(&self) -> Result<PriceTick, FetchError> {
        let spot: SpotResponse = get_json(ExchangeId::Coinbase, self.http.get(&self.url)).await?;
        if let Some(currency) = spot.data.currency.as_deref() {
            if currency != "USD" {
                return Err(FetchError::Parse(format!("expected USD quote, got {}", currency)));
            }
        }
        let price = checked_price(ExchangeId::Coinbase, &spot.data.amount)?;
        Ok(tick(ExchangeId::Coinbase, price, &self.sequence))
    }
}
