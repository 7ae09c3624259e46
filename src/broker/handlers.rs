use axum::{
    Json, Router,
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use std::sync::Arc;

use super::coordinator::FanoutCoordinator;
use super::error::{BrokerError, ErrorCode};
use super::protocol::{
    ENDPOINT_PEER_RPC, ENDPOINT_RPC, ENDPOINT_STATS, HEADER_REQUEST_ID, NodeStats, Request,
    Response,
};

pub fn router(broker: Arc<FanoutCoordinator>) -> Router {
    Router::new()
        .route(ENDPOINT_RPC, post(handle_client_rpc))
        .route(ENDPOINT_PEER_RPC, post(handle_peer_rpc))
        .route(ENDPOINT_STATS, get(handle_stats))
        .layer(Extension(broker))
}

pub async fn handle_client_rpc(
    Extension(broker): Extension<Arc<FanoutCoordinator>>,
    body: Bytes,
) -> (StatusCode, Json<Response>) {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Rejected client request: {}", e);
            return (e.status(), Json(e.to_response()));
        }
    };

    tracing::debug!("Client {} request", request.method());

    let response = broker.handle_client(request).await;
    (status_of(&response), Json(response))
}

pub async fn handle_peer_rpc(
    Extension(broker): Extension<Arc<FanoutCoordinator>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Response>) {
    let request_id = headers
        .get(HEADER_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");

    let result = parse_request(&body).and_then(|request| {
        tracing::debug!("[{}] Peer {} request", request_id, request.method());
        broker.handle_peer(request)
    });

    match result {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(e) => {
            tracing::warn!("[{}] Rejected peer request: {}", request_id, e);
            (e.status(), Json(e.to_response()))
        }
    }
}

pub async fn handle_stats(Extension(broker): Extension<Arc<FanoutCoordinator>>) -> Json<NodeStats> {
    Json(broker.stats())
}

/// Decodes a request body. Anything that does not match the schema is malformed,
/// never a crash.
pub fn parse_request(body: &[u8]) -> Result<Request, BrokerError> {
    serde_json::from_slice(body).map_err(|e| BrokerError::Malformed(e.to_string()))
}

fn status_of(response: &Response) -> StatusCode {
    match response {
        Response::Error { code, .. } => ErrorCode::from_u16(*code)
            .map(ErrorCode::status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        _ => StatusCode::OK,
    }
}
