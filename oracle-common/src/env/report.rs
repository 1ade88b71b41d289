use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::SigningError,
    utils::{time::Millis, NodeId, RoundId},
};

/// Domain separator mixed into every signed report.
pub const REPORT_DOMAIN: &str = "oracle/price-report/v1";

/// A signed, attributable price observation for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceReport {
    pub node_id: NodeId,
    pub round_id: RoundId,
    pub price: Decimal,
    pub observed_at: Millis,
    #[serde(with = "hex::serde")]
    pub signature: [u8; 64],
}

impl PriceReport {
    pub fn signing_bytes(&self) -> Result<Vec<u8>, SigningError> {
        report_signing_bytes(&self.node_id, self.round_id, self.price, self.observed_at)
    }
}

#[derive(Serialize)]
struct ReportSignView<'a> {
    domain: &'a str,
    node_id: &'a str,
    round_id: u64,
    price: String,
    observed_at: i64,
}

/// Canonical bytes covered by a report signature.
///
/// The price is normalized first so `50000.0` and `50000` produce the same bytes.
pub fn report_signing_bytes(
    node_id: &NodeId,
    round_id: RoundId,
    price: Decimal,
    observed_at: Millis,
) -> Result<Vec<u8>, SigningError> {
    bincode::serialize(&ReportSignView {
        domain: REPORT_DOMAIN,
        node_id: &node_id.0,
        round_id: round_id.0,
        price: price.normalize().to_string(),
        observed_at,
    })
    .map_err(|e| SigningError::Encoding(e.to_string()))
}
