use oracle_common::{
    auth::key_manager::write_signing_key,
    logging::init_logging,
};
use oracle_node::{
    build_runtime,
    cli::{Cli, Commands},
    GrpcAggregatorClient, NodeConfig,
};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Commands::Keygen { out }) = &cli.command {
        let key = write_signing_key(out)?;
        println!("{}", hex::encode(key.verifying_key().to_bytes()));
        return Ok(());
    }

    let mut config = NodeConfig::load_from_file(&cli.config)?;
    if let Some(endpoint) = cli.aggregator {
        config.aggregator_endpoint = endpoint;
    }

    if let Some(Commands::Price { round }) = cli.command {
        let client = GrpcAggregatorClient::connect_lazy(&config.aggregator_endpoint)?;
        match client.consensus_price(round).await? {
            Some(price) => println!("{}", serde_json::to_string_pretty(&price)?),
            None => println!("not available"),
        }
        return Ok(());
    }

    if let Some(Commands::Health) = cli.command {
        let client = GrpcAggregatorClient::connect_lazy(&config.aggregator_endpoint)?;
        let health = client.health(&config.node_id).await?;
        println!(
            "healthy={} version={} active_nodes={}/{}",
            health.healthy, health.version, health.active_nodes, health.registered_nodes
        );
        return Ok(());
    }

    let _guard = init_logging(&config.node_id.0, &config.log_dir, "info,oracle_node=debug")?;

    info!("--- STARTING ORACLE NODE [{}] ---", config.node_id);
    info!("Config: {}", cli.config.display());

    let runtime = match build_runtime(&config) {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start node: {}", e);
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

    match handle.await? {
        Ok(()) => {
            info!("Node stopped");
            Ok(())
        }
        Err(e) => {
            error!("Node stopped with error: {}", e);
            Err(e.into())
        }
    }
}
