// Forward Handler
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
};

use crate::proxy::error::ProxyError;
use crate::proxy::server::AppState;
use crate::proxy::upstream::ForwardRequest;

/// Replay an already authorized request upstream and relay the answer.
///
/// The path is taken from the raw URI so percent-encoding reaches the
/// upstream untouched.
pub async fn handle_forward(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let path = uri.path();
    let request = ForwardRequest {
        method,
        path: path.strip_prefix('/').unwrap_or(path).to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };

    let response = state.upstream.forward(request).await?;
    tracing::debug!("Upstream answered {}", response.status);
    Ok(response.into_response())
}
