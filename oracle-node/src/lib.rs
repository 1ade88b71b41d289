//! BTC/USD oracle node: samples one exchange, signs each observation and
//! submits it to the aggregator for the currently open round.

pub mod cli;
pub mod config;
pub mod exchange;
pub mod report;
pub mod rpc;
pub mod runtime;

pub use config::{NodeConfig, RetryPolicy};
pub use exchange::{build_adapter, ExchangeAdapter};
pub use report::SignedReportBuilder;
pub use rpc::client::{AggregatorClient, GrpcAggregatorClient, SubmitOutcome};
pub use runtime::builder::{build_runtime, build_runtime_with, NodeRuntime};
