use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents a single member in the cluster.
///
/// Parsed from `<id>=<host:port>`, e.g. `n1=127.0.0.1:7001`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub addr: SocketAddr,
}

impl Node {
    pub fn new(id: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            id: NodeId::new(id),
            addr,
        }
    }
}

impl FromStr for Node {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, addr) = s
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected <id>=<host:port>, got '{}'", s))?;

        let id = id.trim();
        if id.is_empty() {
            anyhow::bail!("node id must not be empty in '{}'", s);
        }

        let addr: SocketAddr = addr
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid address for node '{}': {}", id, e))?;

        Ok(Node::new(id, addr))
    }
}
