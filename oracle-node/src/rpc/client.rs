use std::time::Duration;

use async_trait::async_trait;
use tonic::{transport::Channel, Code, Request, Status};

use oracle_common::{
    error::SubmissionError,
    rpc::oracle_proto::{
        oracle_service_client::OracleServiceClient, ActiveRoundRequest, GetConsensusPriceRequest,
        HealthReply, HealthRequest, PriceReportMsg, SubmitReportRequest,
    },
    ConsensusPrice, NodeId, OracleError, PriceReport, RejectReason, RoundInfo,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How the aggregator answered a delivered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Rejected(RejectReason),
}

/// What the node pipeline needs from the aggregator.
#[async_trait]
pub trait AggregatorClient: Send + Sync {
    /// The round currently accepting reports, if any.
    async fn active_round(&self, node_id: &NodeId) -> Result<Option<RoundInfo>, SubmissionError>;

    async fn submit(&self, report: &PriceReport) -> Result<SubmitOutcome, SubmissionError>;
}

pub(crate) fn submission_error(status: Status) -> SubmissionError {
    match status.code() {
        Code::Unavailable | Code::Cancelled | Code::Unknown => SubmissionError::Transport(status.message().to_string()),
        Code::DeadlineExceeded => SubmissionError::DeadlineExceeded,
        code => SubmissionError::Rpc {
            code: format!("{:?}", code),
            message: status.message().to_string(),
        },
    }
}

/// tonic client over a lazily connected channel; cloning shares the connection.
#[derive(Debug, Clone)]
pub struct GrpcAggregatorClient {
    inner: OracleServiceClient<Channel>,
}

impl GrpcAggregatorClient {
    /// Does not dial until the first request, so a node can start before its aggregator.
    pub fn connect_lazy(endpoint: &str) -> Result<Self, OracleError> {
        let channel = Channel::from_shared(endpoint.to_string())
            .map_err(|e| OracleError::Config(format!("aggregator endpoint '{}': {}", endpoint, e)))?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .connect_lazy();
        Ok(Self {
            inner: OracleServiceClient::new(channel),
        })
    }

    /// `round_id = 0` asks for the latest finalized price.
    pub async fn consensus_price(&self, round_id: u64) -> Result<Option<ConsensusPrice>, OracleError> {
        let reply = self
            .inner
            .clone()
            .get_consensus_price(Request::new(GetConsensusPriceRequest { round_id }))
            .await?
            .into_inner();

        match reply.price {
            Some(price) if reply.available => ConsensusPrice::try_from(price)
                .map(Some)
                .map_err(OracleError::Other),
            _ => Ok(None),
        }
    }

    pub async fn health(&self, node_id: &NodeId) -> Result<HealthReply, OracleError> {
        let reply = self
            .inner
            .clone()
            .health_check(Request::new(HealthRequest {
                node_id: node_id.0.clone(),
            }))
            .await?;
        Ok(reply.into_inner())
    }
}

#[async_trait]
impl AggregatorClient for GrpcAggregatorClient {
    async fn active_round(&self, node_id: &NodeId) -> Result<Option<RoundInfo>, SubmissionError> {
        let reply = self
            .inner
            .clone()
            .get_active_round(Request::new(ActiveRoundRequest {
                node_id: node_id.0.clone(),
            }))
            .await
            .map_err(submission_error)?;
        Ok(reply.into_inner().into())
    }

    async fn submit(&self, report: &PriceReport) -> Result<SubmitOutcome, SubmissionError> {
        let request = Request::new(SubmitReportRequest {
            report: Some(PriceReportMsg::from(report)),
        });
        let reply = self
            .inner
            .clone()
            .submit_report(request)
            .await
            .map_err(submission_error)?
            .into_inner();

        if reply.accepted {
            return Ok(SubmitOutcome::Accepted);
        }
        let reason = RejectReason::from_code(&reply.reject_reason, &reply.message)
            .unwrap_or_else(|| RejectReason::Malformed(reply.message.clone()));
        Ok(SubmitOutcome::Rejected(reason))
    }
}
