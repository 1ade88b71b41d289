//! consensus
//!
//! Round-based agreement over signed price reports.
//!
//! Every round collects at most one report per registered node (last write wins),
//! then closes either when the whole roster has reported and a quorum agrees, or
//! when its deadline passes. The closing decision picks the largest cluster of
//! mutually agreeing prices and publishes its median when the cluster meets quorum.

pub mod config;
mod engine;
pub mod evaluator;
mod registry;
mod round;

pub use engine::{ConsensusEngine, SubmitAck};
pub use round::ConsensusRound;
