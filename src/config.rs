//! Node Configuration
//!
//! Command line (and environment) settings for a single node, and their validation
//! into the values the rest of the crate consumes.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::broker::coordinator::{CoordinatorConfig, RetryPolicy};
use crate::membership::service::ClusterMembership;
use crate::membership::types::{Node, NodeId};

#[derive(Debug, Clone, Parser)]
#[command(name = "partitioned_log", about = "Partitioned append-only log node")]
pub struct CliArgs {
    /// Id of this node; must appear in the peer list.
    #[arg(long, env = "PLOG_NODE_ID")]
    pub node_id: String,

    /// Full ordered cluster membership as `<id>=<host:port>`, this node included.
    /// Repeat the flag or separate entries with commas.
    #[arg(long = "peer", env = "PLOG_PEERS", value_delimiter = ',', required = true)]
    pub peers: Vec<Node>,

    /// Address to listen on. Defaults to this node's address in the peer list.
    #[arg(long, env = "PLOG_BIND")]
    pub bind: Option<SocketAddr>,

    /// Attempts per remote sub-call, the first one included.
    #[arg(long, env = "PLOG_RPC_ATTEMPTS", default_value_t = 3)]
    pub rpc_attempts: usize,

    /// Timeout of a single remote attempt, in milliseconds.
    #[arg(long, env = "PLOG_RPC_TIMEOUT_MS", default_value_t = 500)]
    pub rpc_timeout_ms: u64,

    /// Deadline of a whole client request, in milliseconds.
    #[arg(long, env = "PLOG_REQUEST_TIMEOUT_MS", default_value_t = 5000)]
    pub request_timeout_ms: u64,

    /// Interval of the stats log line in seconds; 0 disables it.
    #[arg(long, env = "PLOG_STATS_INTERVAL_SECS", default_value_t = 5)]
    pub stats_interval_secs: u64,
}

/// Validated settings of one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub membership: ClusterMembership,
    pub bind_addr: SocketAddr,
    pub coordinator: CoordinatorConfig,
    pub stats_interval: Option<Duration>,
}

impl TryFrom<CliArgs> for NodeConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self> {
        if args.rpc_attempts == 0 {
            anyhow::bail!("--rpc-attempts must be at least 1");
        }
        if args.rpc_timeout_ms == 0 || args.request_timeout_ms == 0 {
            anyhow::bail!("timeouts must be greater than zero");
        }

        let membership = ClusterMembership::new(args.peers, NodeId::new(args.node_id))?;
        let bind_addr = args.bind.unwrap_or(membership.local_node().addr);

        let coordinator = CoordinatorConfig {
            retry: RetryPolicy {
                attempts: args.rpc_attempts,
                attempt_timeout: Duration::from_millis(args.rpc_timeout_ms),
                ..RetryPolicy::default()
            },
            request_timeout: Duration::from_millis(args.request_timeout_ms),
        };

        let stats_interval =
            (args.stats_interval_secs > 0).then(|| Duration::from_secs(args.stats_interval_secs));

        Ok(Self {
            membership,
            bind_addr,
            coordinator,
            stats_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<NodeConfig> {
        let cli = CliArgs::try_parse_from(args)?;
        NodeConfig::try_from(cli)
    }

    #[test]
    fn test_parse_comma_separated_peers() {
        let config = parse(&[
            "partitioned_log",
            "--node-id",
            "n2",
            "--peer",
            "n1=127.0.0.1:7001,n2=127.0.0.1:7002,n3=127.0.0.1:7003",
        ])
        .unwrap();

        assert_eq!(config.membership.len(), 3);
        assert_eq!(config.membership.local_id().as_str(), "n2");
        assert_eq!(config.bind_addr, "127.0.0.1:7002".parse().unwrap());
        assert_eq!(config.coordinator, CoordinatorConfig::default());
        assert_eq!(config.stats_interval, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_parse_repeated_peers_and_overrides() {
        let config = parse(&[
            "partitioned_log",
            "--node-id",
            "n1",
            "--peer",
            "n1=127.0.0.1:7001",
            "--peer",
            "n2=127.0.0.1:7002",
            "--bind",
            "0.0.0.0:9000",
            "--rpc-attempts",
            "5",
            "--rpc-timeout-ms",
            "250",
            "--request-timeout-ms",
            "2000",
            "--stats-interval-secs",
            "0",
        ])
        .unwrap();

        assert_eq!(config.membership.len(), 2);
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.coordinator.retry.attempts, 5);
        assert_eq!(
            config.coordinator.retry.attempt_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(config.coordinator.request_timeout, Duration::from_secs(2));
        assert_eq!(config.stats_interval, None);
    }

    #[test]
    fn test_parse_rejects_local_node_outside_membership() {
        let result = parse(&[
            "partitioned_log",
            "--node-id",
            "n9",
            "--peer",
            "n1=127.0.0.1:7001",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_zero_attempts() {
        let result = parse(&[
            "partitioned_log",
            "--node-id",
            "n1",
            "--peer",
            "n1=127.0.0.1:7001",
            "--rpc-attempts",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_bad_peer_spec() {
        let result = CliArgs::try_parse_from([
            "partitioned_log",
            "--node-id",
            "n1",
            "--peer",
            "n1@127.0.0.1:7001",
        ]);
        assert!(result.is_err());
    }
}
