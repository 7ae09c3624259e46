use dashmap::DashMap;
use serde::{Deserialize, Serialize};

pub type Offset = u64;

/// A single record of a log: its position and the value stored there.
///
/// Travels on the wire as a two element array `[offset, value]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Offset, i64)", into = "(Offset, i64)")]
pub struct LogEntry {
    pub offset: Offset,
    pub value: i64,
}

impl LogEntry {
    pub fn new(offset: Offset, value: i64) -> Self {
        Self { offset, value }
    }
}

impl From<(Offset, i64)> for LogEntry {
    fn from((offset, value): (Offset, i64)) -> Self {
        Self { offset, value }
    }
}

impl From<LogEntry> for (Offset, i64) {
    fn from(entry: LogEntry) -> Self {
        (entry.offset, entry.value)
    }
}

/// Append-only logs for the keys this node owns.
///
/// Each key's sequence sits behind the write lock of its `DashMap` shard while it is
/// appended to, so offsets for a key are handed out gapless and in order. Reads of
/// the same shard proceed together.
#[derive(Debug, Default)]
pub struct LocalLogStore {
    logs: DashMap<String, Vec<i64>>,
}

impl LocalLogStore {
    pub fn new() -> Self {
        Self {
            logs: DashMap::new(),
        }
    }

    /// Appends `value` to the log of `key` and returns the offset it was written at.
    pub fn append(&self, key: &str, value: i64) -> Offset {
        let mut log = self.logs.entry(key.to_string()).or_default();
        let offset = log.len() as Offset;
        log.push(value);

        tracing::debug!("Appended {} to key {} at offset {}", value, key, offset);
        offset
    }

    /// Returns every entry of `key` at or after `from`.
    ///
    /// Unknown keys and starts past the end yield an empty list.
    pub fn range(&self, key: &str, from: Offset) -> Vec<LogEntry> {
        let Some(log) = self.logs.get(key) else {
            return Vec::new();
        };

        let start = usize::try_from(from).unwrap_or(usize::MAX);
        log.iter()
            .enumerate()
            .skip(start)
            .map(|(offset, value)| LogEntry::new(offset as Offset, *value))
            .collect()
    }

    /// Number of entries stored under `key`.
    pub fn len(&self, key: &str) -> usize {
        self.logs.get(key).map(|log| log.len()).unwrap_or(0)
    }

    pub fn key_count(&self) -> usize {
        self.logs.len()
    }

    pub fn entry_count(&self) -> usize {
        self.logs.iter().map(|entry| entry.value().len()).sum()
    }
}
