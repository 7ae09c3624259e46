use anyhow::Result;
use std::collections::HashSet;

use super::types::{Node, NodeId};

/// The immutable view of the cluster shared by every component of a node.
///
/// The order of `nodes` is significant: the partitioner maps keys onto indices of
/// this list, so every node must be started with the same ordering.
#[derive(Debug, Clone)]
pub struct ClusterMembership {
    nodes: Vec<Node>,
    local_index: usize,
}

impl ClusterMembership {
    pub fn new(nodes: Vec<Node>, local: NodeId) -> Result<Self> {
        if nodes.is_empty() {
            anyhow::bail!("cluster membership must contain at least one node");
        }

        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(&node.id) {
                anyhow::bail!("duplicate node id in membership: {}", node.id);
            }
        }

        let local_index = nodes
            .iter()
            .position(|node| node.id == local)
            .ok_or_else(|| {
                anyhow::anyhow!("local node {} is not part of the cluster membership", local)
            })?;

        tracing::info!(
            "Cluster membership fixed: {} node(s), local node {}",
            nodes.len(),
            local
        );

        Ok(Self { nodes, local_index })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_node().id
    }

    pub fn local_node(&self) -> &Node {
        &self.nodes[self.local_index]
    }

    pub fn node_at(&self, index: usize) -> &Node {
        &self.nodes[index % self.nodes.len()]
    }

    pub fn get_member(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    pub fn is_local(&self, id: &NodeId) -> bool {
        self.local_id() == id
    }

    pub fn peers(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |node| &node.id != self.local_id())
    }
}
