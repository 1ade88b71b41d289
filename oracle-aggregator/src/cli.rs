use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "oracle-aggregator")]
#[command(about = "BTC/USD oracle aggregator: runs consensus rounds over signed node reports")]
pub struct Cli {
    /// Aggregator config file (JSON)
    #[arg(short, long, default_value = "aggregator.json")]
    pub config: PathBuf,

    /// Overrides `listen_addr` from the config
    #[arg(long)]
    pub listen: Option<SocketAddr>,
}
