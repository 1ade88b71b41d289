//! utils
//!
//! Identifier newtypes and time helpers shared by the node and the aggregator.

pub mod node_id;
pub use node_id::{NodeId, RoundId};

pub mod time;
