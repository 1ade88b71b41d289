use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{info, warn};

use oracle_common::{rpc::oracle_proto::oracle_service_server::OracleServiceServer, OracleError};
use oracle_consensus::ConsensusEngine;

use crate::{config::AggregatorConfig, rpc::server::OracleServiceImpl};

use super::round_driver::RoundDriver;

/// The aggregator process: consensus engine, round driver and gRPC server.
pub struct AggregatorRuntime {
    config: AggregatorConfig,
    engine: Arc<ConsensusEngine>,
}

/// Validates the config and builds the engine over an immutable roster snapshot.
pub fn build_runtime(config: AggregatorConfig) -> Result<AggregatorRuntime, OracleError> {
    config.validate()?;
    let roster = Arc::new(config.build_roster()?);

    info!(
        "📋 Roster loaded: {} nodes, quorum {}",
        roster.len(),
        config.consensus.quorum.threshold(roster.len())
    );

    let engine = Arc::new(ConsensusEngine::new(roster, config.consensus.clone()));
    Ok(AggregatorRuntime { config, engine })
}

impl AggregatorRuntime {
    pub fn engine(&self) -> Arc<ConsensusEngine> {
        self.engine.clone()
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Binds `listen_addr` and serves until `shutdown` flips.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), OracleError> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        self.run_with_listener(listener, shutdown).await
    }

    /// Serves on an already bound listener, which lets callers pick an ephemeral port.
    pub async fn run_with_listener(
        self,
        listener: TcpListener,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), OracleError> {
        let addr = listener.local_addr()?;
        let service = OracleServiceImpl::new(self.engine.clone(), self.config.node_activity_window());

        let driver = tokio::spawn(RoundDriver::new(self.engine.clone()).run(shutdown.clone()));

        info!("🌐 gRPC server listening on {}", addr);
        let mut signal = shutdown;
        let result = Server::builder()
            .add_service(OracleServiceServer::new(service))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                loop {
                    let stop = *signal.borrow();
                    if stop || signal.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await;

        if let Err(e) = driver.await {
            warn!("Round driver ended abnormally: {}", e);
        }
        result.map_err(OracleError::from)
    }
}
