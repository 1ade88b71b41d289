//! Shared data model, signing primitives and wire types for the BTC/USD oracle.

pub mod auth;
pub mod env;
pub mod error;
pub mod logging;
pub mod rpc;
pub mod utils;

pub use env::{
    consensus::types::{ConsensusPrice, QuorumPolicy, RoundInfo, RoundOutcome, RoundState},
    price::{ExchangeId, PriceTick},
    report::PriceReport,
    roster::{NodeRoster, RosterEntry},
};
pub use error::{OracleError, RejectReason, Result};
pub use utils::{NodeId, RoundId};
