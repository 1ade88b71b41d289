//! Aggregator: owns the round lifecycle, serves the node-facing gRPC surface and
//! publishes consensus prices.

pub mod cli;
pub mod config;
pub mod rpc;
pub mod runtime;

pub use config::AggregatorConfig;
pub use rpc::server::OracleServiceImpl;
pub use runtime::builder::{build_runtime, AggregatorRuntime};
