use dashmap::DashMap;
use std::collections::BTreeMap;

use super::log_store::Offset;

/// Consumer watermarks for the keys this node owns.
///
/// Writes overwrite unconditionally: a watermark may move backwards if a consumer
/// commits an older offset.
#[derive(Debug, Default)]
pub struct LocalCommitStore {
    commits: DashMap<String, Offset>,
}

impl LocalCommitStore {
    pub fn new() -> Self {
        Self {
            commits: DashMap::new(),
        }
    }

    pub fn set_commit(&self, key: &str, offset: Offset) {
        if let Some(previous) = self.commits.insert(key.to_string(), offset)
            && previous > offset
        {
            tracing::debug!(
                "Committed offset for key {} moved backwards: {} -> {}",
                key,
                previous,
                offset
            );
        }
    }

    pub fn get_commit(&self, key: &str) -> Offset {
        self.commits.get(key).map(|offset| *offset).unwrap_or(0)
    }

    /// Looks up the watermark of every requested key; keys never committed report 0.
    pub fn get_commits<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> BTreeMap<String, Offset> {
        keys.into_iter()
            .map(|key| (key.to_string(), self.get_commit(key)))
            .collect()
    }

    pub fn key_count(&self) -> usize {
        self.commits.len()
    }
}
