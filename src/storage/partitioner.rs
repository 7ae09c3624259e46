use crate::membership::{service::ClusterMembership, types::NodeId};
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Maps every log key to the single node that owns it.
///
/// Ownership is a pure function of the key and the fixed membership list, so every
/// node computes the same answer without talking to anyone.
#[derive(Debug, Clone)]
pub struct PartitionResolver {
    membership: Arc<ClusterMembership>,
}

impl PartitionResolver {
    pub fn new(membership: Arc<ClusterMembership>) -> Self {
        Self { membership }
    }

    /// Position of the owning node in the membership list.
    ///
    /// Numeric keys map by value so that key `"0"` lands on the first node; anything
    /// else is hashed with the std `DefaultHasher`. Its output is only stable within
    /// one build of the standard library, so every node of a cluster must run the
    /// same binary.
    pub fn owner_index(&self, key: &str) -> usize {
        let nodes = self.membership.len() as u64;
        let slot = match key.parse::<u64>() {
            Ok(value) => value,
            Err(_) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                hasher.finish()
            }
        };
        (slot % nodes) as usize
    }

    pub fn resolve(&self, key: &str) -> &NodeId {
        &self.membership.node_at(self.owner_index(key)).id
    }

    pub fn is_local(&self, key: &str) -> bool {
        self.membership.is_local(self.resolve(key))
    }

    /// Buckets keyed items by owner, one bucket per distinct owner.
    pub fn group_by_owner<V>(
        &self,
        items: impl IntoIterator<Item = (String, V)>,
    ) -> BTreeMap<NodeId, Vec<(String, V)>> {
        let mut groups: BTreeMap<NodeId, Vec<(String, V)>> = BTreeMap::new();
        for (key, value) in items {
            let owner = self.resolve(&key).clone();
            groups.entry(owner).or_default().push((key, value));
        }
        groups
    }

    pub fn membership(&self) -> &Arc<ClusterMembership> {
        &self.membership
    }
}
