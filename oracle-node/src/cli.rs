use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "oracle-node")]
#[command(about = "BTC/USD oracle node: samples an exchange and submits signed reports")]
pub struct Cli {
    /// Node config file (JSON)
    #[arg(short, long, default_value = "node.json")]
    pub config: PathBuf,

    /// Overrides `aggregator_endpoint` from the config
    #[arg(long)]
    pub aggregator: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the sampling and submission pipeline (default)
    Run,
    /// Generate a signing key and print its public key for the aggregator roster
    Keygen {
        #[arg(short, long, value_name = "OUT")]
        out: PathBuf,
    },
    /// Query the aggregator for a consensus price
    Price {
        /// Round to query; 0 means the latest finalized round
        #[arg(short, long, default_value_t = 0)]
        round: u64,
    },
    /// Ask the aggregator for its health and node counts
    Health,
}
