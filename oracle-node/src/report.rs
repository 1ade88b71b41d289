use std::sync::Arc;

use oracle_common::{
    auth::Authenticator,
    env::report::report_signing_bytes,
    error::SigningError,
    NodeId, PriceReport, PriceTick, RoundId,
};

/// Turns raw ticks into signed, round-tagged reports with the node's key.
#[derive(Clone)]
pub struct SignedReportBuilder {
    node_id: NodeId,
    auth: Arc<dyn Authenticator>,
}

impl SignedReportBuilder {
    pub fn new(node_id: NodeId, auth: Arc<dyn Authenticator>) -> Self {
        Self { node_id, auth }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.auth.public_key()
    }

    /// Signs the canonical bytes of `(node_id, round_id, price, observed_at)`.
    pub fn build(&self, tick: &PriceTick, round_id: RoundId) -> Result<PriceReport, SigningError> {
        let price = tick.price.normalize();
        let message = report_signing_bytes(&self.node_id, round_id, price, tick.observed_at)?;
        let signature = self.auth.sign(&message)?;

        Ok(PriceReport {
            node_id: self.node_id.clone(),
            round_id,
            price,
            observed_at: tick.observed_at,
            signature,
        })
    }
}
