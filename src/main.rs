use clap::Parser;
use partitioned_log::config::{CliArgs, NodeConfig};
use partitioned_log::server::{build_coordinator, serve, spawn_stats_reporter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();
    let config = NodeConfig::try_from(args)?;

    tracing::info!(
        "Starting node {} ({} node cluster)",
        config.membership.local_id(),
        config.membership.len()
    );
    tracing::info!(
        "  - {} at {} (local)",
        config.membership.local_id(),
        config.membership.local_node().addr
    );
    for peer in config.membership.peers() {
        tracing::info!("  - {} at {}", peer.id, peer.addr);
    }

    let broker = build_coordinator(&config);

    if let Some(every) = config.stats_interval {
        spawn_stats_reporter(broker.clone(), every);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Press Ctrl+C to shutdown");

    serve(listener, broker).await
}
