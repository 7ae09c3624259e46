//! Peer Transport
//!
//! One-attempt request/response delivery to a named peer. Retries, deadlines and
//! fan-out live in the coordinator; a transport only moves a single message and
//! reports what went wrong in a way that tells the caller whether resending is safe.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::error::BrokerError;
use super::protocol::{ENDPOINT_PEER_RPC, HEADER_REQUEST_ID, Request, Response};
use crate::membership::{service::ClusterMembership, types::NodeId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("unknown peer {0}")]
    UnknownPeer(NodeId),

    /// The request never left this node.
    #[error("connection failed: {0}")]
    Unreachable(String),

    /// The peer may or may not have applied the request.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The connection broke after the request was sent.
    #[error("transport failure: {0}")]
    Io(String),

    #[error("peer replied with error {code}: {text}")]
    Rejected { code: u16, text: String },

    #[error("undecodable reply: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether sending the same request again is allowed.
    ///
    /// Non-idempotent requests may only be resent when the first attempt is known
    /// not to have been delivered.
    pub fn is_retryable(&self, idempotent: bool) -> bool {
        match self {
            TransportError::Unreachable(_) => true,
            TransportError::Timeout(_) | TransportError::Io(_) | TransportError::Decode(_) => {
                idempotent
            }
            TransportError::UnknownPeer(_) | TransportError::Rejected { .. } => false,
        }
    }

    pub fn into_broker_error(self, node: &NodeId) -> BrokerError {
        let node = node.clone();
        match self {
            TransportError::Timeout(_) => BrokerError::Timeout { node },
            TransportError::Rejected { code, text } => BrokerError::Remote { node, code, text },
            TransportError::Decode(reason) => {
                BrokerError::Internal(format!("bad reply from {}: {}", node, reason))
            }
            TransportError::UnknownPeer(_) => BrokerError::Unreachable {
                node,
                reason: "not a cluster member".to_string(),
            },
            TransportError::Unreachable(reason) | TransportError::Io(reason) => {
                BrokerError::Unreachable { node, reason }
            }
        }
    }
}

#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Delivers `request` to `target` once and waits at most `timeout` for its reply.
    async fn call(
        &self,
        target: &NodeId,
        request_id: &str,
        request: &Request,
        timeout: Duration,
    ) -> Result<Response, TransportError>;
}

/// Sends peer requests as JSON over HTTP to the peer's internal endpoint.
pub struct HttpTransport {
    membership: Arc<ClusterMembership>,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(membership: Arc<ClusterMembership>) -> Self {
        Self {
            membership,
            http_client: reqwest::Client::new(),
        }
    }

    fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(timeout)
        } else if err.is_connect() {
            TransportError::Unreachable(err.to_string())
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Io(err.to_string())
        }
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn call(
        &self,
        target: &NodeId,
        request_id: &str,
        request: &Request,
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        let node = self
            .membership
            .get_member(target)
            .ok_or_else(|| TransportError::UnknownPeer(target.clone()))?;

        let url = format!("http://{}{}", node.addr, ENDPOINT_PEER_RPC);

        let response = self
            .http_client
            .post(url)
            .header(HEADER_REQUEST_ID, request_id)
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::classify(e, timeout))?;

        let status = response.status();
        let body: Response = response
            .json()
            .await
            .map_err(|e| Self::classify(e, timeout))?;

        match body {
            Response::Error { code, text } => Err(TransportError::Rejected { code, text }),
            body if status.is_success() => Ok(body),
            _ => Err(TransportError::Decode(format!(
                "success body with status {}",
                status
            ))),
        }
    }
}
