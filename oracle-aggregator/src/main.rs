use clap::Parser;
use oracle_aggregator::{build_runtime, cli::Cli, AggregatorConfig};
use oracle_common::logging::init_logging;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = AggregatorConfig::load_from_file(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }

    let _guard = init_logging("aggregator", &config.log_dir, "info,oracle_aggregator=debug,oracle_consensus=debug")?;

    info!("--- STARTING ORACLE AGGREGATOR ---");
    info!("Config: {}", cli.config.display());

    let runtime = match build_runtime(config) {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start aggregator: {}", e);
            return Err(e.into());
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(runtime.run(shutdown_rx));

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Ctrl+C received, shutting down");
            let _ = shutdown_tx.send(true);
        }
        _ = shutdown_tx.closed() => {}
    }

    handle.await??;
    info!("Aggregator stopped");
    Ok(())
}
