use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use oracle_common::{
    auth::{key_manager::load_signing_key, Authenticator},
    OracleError,
};

use crate::{
    config::NodeConfig,
    exchange::{build_adapter, ExchangeAdapter},
    report::SignedReportBuilder,
    rpc::client::{AggregatorClient, GrpcAggregatorClient},
};

use super::{sampler::Sampler, submitter::Submitter};

const JOB_QUEUE: usize = 16;

/// A fully wired node, ready to run.
pub struct NodeRuntime {
    sampler: Sampler,
    submitter: Submitter,
    public_key: [u8; 32],
}

impl NodeRuntime {
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key)
    }

    /// Runs sampler and submitter until `shutdown` flips. A fatal signing error
    /// stops both and is returned.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), OracleError> {
        let (tx, rx) = mpsc::channel(JOB_QUEUE);
        let submitter = tokio::spawn(self.submitter.run(rx, shutdown.clone()));

        // The sender drops with the sampler, which lets the submitter drain and exit.
        let result = self.sampler.run(tx, shutdown).await;

        if let Err(e) = submitter.await {
            warn!("Submitter task ended abnormally: {}", e);
        }
        result
    }
}

/// Wires a node from its config. The signing key is loaded first: without it
/// nothing else is built and nothing is ever submitted.
pub fn build_runtime(config: &NodeConfig) -> Result<NodeRuntime, OracleError> {
    config.validate()?;
    let auth = Arc::new(load_signing_key(&config.signing_key_path)?);

    let adapter = build_adapter(config.exchange, config.fetch_timeout())?;
    let client = Arc::new(GrpcAggregatorClient::connect_lazy(&config.aggregator_endpoint)?);

    Ok(assemble(config, auth, adapter, client))
}

/// Same as [`build_runtime`] with caller-supplied exchange and aggregator ends.
pub fn build_runtime_with(
    config: &NodeConfig,
    adapter: Arc<dyn ExchangeAdapter>,
    client: Arc<dyn AggregatorClient>,
) -> Result<NodeRuntime, OracleError> {
    config.validate()?;
    let auth = Arc::new(load_signing_key(&config.signing_key_path)?);
    Ok(assemble(config, auth, adapter, client))
}

fn assemble(
    config: &NodeConfig,
    auth: Arc<dyn Authenticator>,
    adapter: Arc<dyn ExchangeAdapter>,
    client: Arc<dyn AggregatorClient>,
) -> NodeRuntime {
    let public_key = auth.public_key();
    let builder = SignedReportBuilder::new(config.node_id.clone(), auth);

    info!(
        "🔑 Node [{}] loaded key {} ({} via {})",
        config.node_id,
        hex::encode(public_key),
        config.exchange,
        config.aggregator_endpoint
    );

    let sampler = Sampler::new(
        adapter,
        builder,
        client.clone(),
        config.sampling_interval(),
        config.fetch_timeout(),
        config.safety_margin(),
    );
    let submitter = Submitter::new(client, config.retry);

    NodeRuntime {
        sampler,
        submitter,
        public_key,
    }
}
