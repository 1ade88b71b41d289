use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{debug, info};

use oracle_common::{
    rpc::oracle_proto::{
        oracle_service_server::OracleService, ActiveRoundReply, ActiveRoundRequest, ConsensusPriceMsg,
        GetConsensusPriceReply, GetConsensusPriceRequest, HealthReply, HealthRequest,
        SubmitReportReply, SubmitReportRequest,
    },
    utils::time::{now_millis, Millis},
    PriceReport, RejectReason, RoundId, RoundState,
};
use oracle_consensus::ConsensusEngine;

use super::activity::NodeActivity;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// gRPC front of the consensus engine.
pub struct OracleServiceImpl {
    engine: Arc<ConsensusEngine>,
    activity: Arc<NodeActivity>,
    activity_window: Millis,
}

impl OracleServiceImpl {
    pub fn new(engine: Arc<ConsensusEngine>, activity_window: Millis) -> Self {
        Self {
            engine,
            activity: Arc::new(NodeActivity::new()),
            activity_window,
        }
    }

    fn rejected(reason: &RejectReason) -> SubmitReportReply {
        SubmitReportReply {
            accepted: false,
            reject_reason: reason.code().to_string(),
            message: reason.to_string(),
        }
    }

    async fn price_status(&self, round_id: RoundId) -> String {
        match self.engine.round_state(round_id).await {
            Some(RoundState::Open) => "open".into(),
            Some(RoundState::TimedOut) => "timed_out".into(),
            Some(RoundState::Finalized) => "finalized".into(),
            None => "unknown_round".into(),
        }
    }
}

#[tonic::async_trait]
impl OracleService for OracleServiceImpl {
    async fn submit_report(
        &self,
        request: Request<SubmitReportRequest>,
    ) -> Result<Response<SubmitReportReply>, Status> {
        let now = now_millis();
        let msg = match request.into_inner().report {
            Some(msg) => msg,
            None => {
                let reason = RejectReason::Malformed("request carries no report".into());
                return Ok(Response::new(Self::rejected(&reason)));
            }
        };

        let report = match PriceReport::try_from(msg) {
            Ok(report) => report,
            Err(reason) => return Ok(Response::new(Self::rejected(&reason))),
        };

        let node_id = report.node_id.clone();
        let reply = match self.engine.submit(report, now).await {
            Ok(ack) => {
                self.activity.touch(&node_id, now).await;
                let message = match &ack.finalized {
                    Some(price) => format!("accepted; round {} finalized at {}", ack.round_id, price.price.normalize()),
                    None if ack.replaced => format!("accepted; replaced earlier report in round {}", ack.round_id),
                    None => format!("accepted into round {}", ack.round_id),
                };
                SubmitReportReply {
                    accepted: true,
                    reject_reason: String::new(),
                    message,
                }
            }
            Err(reason) => Self::rejected(&reason),
        };

        Ok(Response::new(reply))
    }

    async fn get_consensus_price(
        &self,
        request: Request<GetConsensusPriceRequest>,
    ) -> Result<Response<GetConsensusPriceReply>, Status> {
        let requested = request.into_inner().round_id;

        let (price, status) = if requested == 0 {
            let latest = self.engine.latest_consensus().await;
            let status = if latest.is_some() { "finalized" } else { "no_finalized_round" };
            (latest, status.to_string())
        } else {
            let round_id = RoundId(requested);
            (
                self.engine.consensus_price(round_id).await,
                self.price_status(round_id).await,
            )
        };

        debug!("🔎 Consensus price query for round {}: {}", requested, status);

        let reply = GetConsensusPriceReply {
            available: price.is_some(),
            price: price.as_ref().map(ConsensusPriceMsg::from),
            status,
        };
        Ok(Response::new(reply))
    }

    async fn get_active_round(
        &self,
        _request: Request<ActiveRoundRequest>,
    ) -> Result<Response<ActiveRoundReply>, Status> {
        let active = self.engine.active_round(now_millis()).await;
        Ok(Response::new(ActiveRoundReply::from(active)))
    }

    async fn health_check(
        &self,
        request: Request<HealthRequest>,
    ) -> Result<Response<HealthReply>, Status> {
        let req = request.into_inner();
        let now = now_millis();
        info!("🏥 Health check from: {}", req.node_id);

        let active = self.activity.active_count(now, self.activity_window).await;
        let reply = HealthReply {
            healthy: true,
            timestamp: now,
            active_nodes: u32::try_from(active).unwrap_or(u32::MAX),
            registered_nodes: u32::try_from(self.engine.registered_nodes()).unwrap_or(u32::MAX),
            version: VERSION.to_string(),
        };
        Ok(Response::new(reply))
    }
}
