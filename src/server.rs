//! Node Wiring
//!
//! Assembles the stores, partitioner, transport and coordinator of one node and
//! serves them over HTTP.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::broker::coordinator::FanoutCoordinator;
use crate::broker::handlers::router;
use crate::broker::transport::HttpTransport;
use crate::config::NodeConfig;
use crate::storage::commit_store::LocalCommitStore;
use crate::storage::log_store::LocalLogStore;
use crate::storage::partitioner::PartitionResolver;

/// Builds the coordinator of a node talking to its peers over HTTP.
pub fn build_coordinator(config: &NodeConfig) -> Arc<FanoutCoordinator> {
    let membership = Arc::new(config.membership.clone());
    let transport = Arc::new(HttpTransport::new(membership.clone()));

    Arc::new(FanoutCoordinator::new(
        PartitionResolver::new(membership),
        Arc::new(LocalLogStore::new()),
        Arc::new(LocalCommitStore::new()),
        transport,
        config.coordinator.clone(),
    ))
}

/// Serves the broker API on `listener` until the server fails.
pub async fn serve(listener: TcpListener, broker: Arc<FanoutCoordinator>) -> Result<()> {
    tracing::info!(
        "Node {} listening on {}",
        broker.local_id(),
        listener.local_addr()?
    );
    axum::serve(listener, router(broker)).await?;
    Ok(())
}

/// Periodically logs what this node stores.
pub fn spawn_stats_reporter(broker: Arc<FanoutCoordinator>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);

        loop {
            interval.tick().await;
            let stats = broker.stats();
            tracing::info!(
                "Node stats: {} log key(s), {} entries, {} committed key(s), cluster of {}",
                stats.log_keys,
                stats.log_entries,
                stats.committed_keys,
                stats.cluster_size
            );
        }
    })
}
