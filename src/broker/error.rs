use axum::http::StatusCode;

use super::protocol::Response;
use crate::membership::types::NodeId;

/// Numeric error codes carried in `{"type":"error"}` replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    Timeout = 0,
    TemporarilyUnavailable = 11,
    MalformedRequest = 12,
    Crash = 13,
    Abort = 14,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0 => Some(ErrorCode::Timeout),
            11 => Some(ErrorCode::TemporarilyUnavailable),
            12 => Some(ErrorCode::MalformedRequest),
            13 => Some(ErrorCode::Crash),
            14 => Some(ErrorCode::Abort),
            _ => None,
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::TemporarilyUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::MalformedRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Crash => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Abort => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("key '{key}' is owned by {owner}, not by this node")]
    NotOwner { key: String, owner: NodeId },

    #[error("owner {node} unreachable: {reason}")]
    Unreachable { node: NodeId, reason: String },

    #[error("timed out waiting for owner {node}")]
    Timeout { node: NodeId },

    #[error("owner {node} rejected the request (code {code}): {text}")]
    Remote { node: NodeId, code: u16, text: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    pub fn code(&self) -> u16 {
        match self {
            BrokerError::Malformed(_) => ErrorCode::MalformedRequest.as_u16(),
            BrokerError::NotOwner { .. } => ErrorCode::Abort.as_u16(),
            BrokerError::Unreachable { .. } => ErrorCode::TemporarilyUnavailable.as_u16(),
            BrokerError::Timeout { .. } => ErrorCode::Timeout.as_u16(),
            BrokerError::Remote { code, .. } => *code,
            BrokerError::Internal(_) => ErrorCode::Crash.as_u16(),
        }
    }

    pub fn status(&self) -> StatusCode {
        ErrorCode::from_u16(self.code())
            .map(ErrorCode::status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn to_response(&self) -> Response {
        Response::Error {
            code: self.code(),
            text: self.to_string(),
        }
    }
}
