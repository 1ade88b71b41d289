//! Generated gRPC types plus conversions between wire messages and the domain model.

use std::collections::BTreeSet;

pub mod oracle_proto {
    tonic::include_proto!("oracle");
}

use oracle_proto::{ActiveRoundReply, ConsensusPriceMsg, PriceReportMsg};

use crate::{
    env::{
        consensus::types::{ConsensusPrice, RoundInfo, RoundState},
        price::parse_price,
        report::PriceReport,
    },
    error::RejectReason,
    utils::{NodeId, RoundId},
};

impl From<&PriceReport> for PriceReportMsg {
    fn from(report: &PriceReport) -> Self {
        PriceReportMsg {
            node_id: report.node_id.0.clone(),
            round_id: report.round_id.0,
            price: report.price.normalize().to_string(),
            observed_at: report.observed_at,
            signature: report.signature.to_vec(),
        }
    }
}

impl TryFrom<PriceReportMsg> for PriceReport {
    type Error = RejectReason;

    fn try_from(msg: PriceReportMsg) -> Result<Self, Self::Error> {
        if msg.node_id.is_empty() {
            return Err(RejectReason::Malformed("empty node id".into()));
        }
        let price = parse_price(&msg.price).map_err(RejectReason::Malformed)?;
        let signature: [u8; 64] = msg.signature.as_slice().try_into().map_err(|_| {
            RejectReason::Malformed(format!("signature must be 64 bytes, got {}", msg.signature.len()))
        })?;

        Ok(PriceReport {
            node_id: NodeId(msg.node_id),
            round_id: RoundId(msg.round_id),
            price,
            observed_at: msg.observed_at,
            signature,
        })
    }
}

impl From<&ConsensusPrice> for ConsensusPriceMsg {
    fn from(price: &ConsensusPrice) -> Self {
        ConsensusPriceMsg {
            round_id: price.round_id.0,
            price: price.price.normalize().to_string(),
            contributing_nodes: price.contributing_nodes.iter().map(|n| n.0.clone()).collect(),
            agreement_ratio: price.agreement_ratio,
        }
    }
}

impl TryFrom<ConsensusPriceMsg> for ConsensusPrice {
    type Error = String;

    fn try_from(msg: ConsensusPriceMsg) -> Result<Self, Self::Error> {
        Ok(ConsensusPrice {
            round_id: RoundId(msg.round_id),
            price: parse_price(&msg.price)?,
            contributing_nodes: msg.contributing_nodes.into_iter().map(NodeId).collect::<BTreeSet<_>>(),
            agreement_ratio: msg.agreement_ratio,
        })
    }
}

impl From<Option<RoundInfo>> for ActiveRoundReply {
    fn from(info: Option<RoundInfo>) -> Self {
        match info {
            Some(info) if info.is_open() => ActiveRoundReply {
                open: true,
                round_id: info.round_id.0,
                opened_at: info.opened_at,
                deadline: info.deadline,
            },
            _ => ActiveRoundReply { open: false, round_id: 0, opened_at: 0, deadline: 0 },
        }
    }
}

impl From<ActiveRoundReply> for Option<RoundInfo> {
    fn from(reply: ActiveRoundReply) -> Self {
        reply.open.then(|| RoundInfo {
            round_id: RoundId(reply.round_id),
            opened_at: reply.opened_at,
            deadline: reply.deadline,
            state: RoundState::Open,
            closed_at: None,
        })
    }
}
