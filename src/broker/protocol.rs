//! Broker Wire Protocol
//!
//! Defines the endpoints and message bodies exchanged with clients and between peers.
//!
//! Clients and peers speak the same closed set of messages, tagged by a `"type"` field.
//! What differs is the endpoint: a client request may span many owners and is fanned
//! out, a peer request only ever carries keys the receiving node owns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::BrokerError;
use crate::storage::log_store::{LogEntry, Offset};

// --- API Endpoints ---

/// Public endpoint for client operations.
pub const ENDPOINT_RPC: &str = "/rpc";
/// Internal endpoint for owner-local sub-requests sent by a coordinating peer.
pub const ENDPOINT_PEER_RPC: &str = "/internal/rpc";
/// Node statistics.
pub const ENDPOINT_STATS: &str = "/stats";

/// Correlates the sub-requests of one client call across nodes in the logs.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

// --- Messages ---

/// Every operation a node accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Append `msg` to the log of `key`.
    Send { key: String, msg: i64 },
    /// Read every entry at or after the given offset, per key.
    Poll { offsets: BTreeMap<String, Offset> },
    /// Overwrite the committed offset of each key.
    CommitOffsets { offsets: BTreeMap<String, Offset> },
    /// Read the committed offset of each key.
    ListCommittedOffsets { keys: Vec<String> },
}

impl Request {
    pub fn method(&self) -> &'static str {
        match self {
            Request::Send { .. } => "send",
            Request::Poll { .. } => "poll",
            Request::CommitOffsets { .. } => "commit_offsets",
            Request::ListCommittedOffsets { .. } => "list_committed_offsets",
        }
    }

    /// Whether executing the request twice leaves the same state as executing it once.
    ///
    /// Appends are the only operation that is not, so a send must never be replayed
    /// unless the first attempt provably never reached its owner.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Request::Send { .. })
    }

    pub fn keys(&self) -> Vec<&str> {
        match self {
            Request::Send { key, .. } => vec![key.as_str()],
            Request::Poll { offsets } | Request::CommitOffsets { offsets } => {
                offsets.keys().map(String::as_str).collect()
            }
            Request::ListCommittedOffsets { keys } => keys.iter().map(String::as_str).collect(),
        }
    }

    /// Checks what the JSON schema alone cannot express.
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.keys().iter().any(|key| key.is_empty()) {
            return Err(BrokerError::Malformed(format!(
                "{} request contains an empty key",
                self.method()
            )));
        }
        Ok(())
    }
}

/// Replies to [`Request`]s.
///
/// Multi-key replies carry a `failed` map naming the keys whose owner could not
/// be reached, next to the results of every other key. It is omitted when empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    SendOk {
        offset: Offset,
    },
    PollOk {
        msgs: BTreeMap<String, Vec<LogEntry>>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        failed: BTreeMap<String, String>,
    },
    CommitOffsetsOk {
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        failed: BTreeMap<String, String>,
    },
    ListCommittedOffsetsOk {
        offsets: BTreeMap<String, Offset>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        failed: BTreeMap<String, String>,
    },
    Error {
        code: u16,
        text: String,
    },
}

/// Snapshot of what a node currently stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    pub node_id: String,
    pub cluster_size: usize,
    pub log_keys: usize,
    pub log_entries: usize,
    pub committed_keys: usize,
}
