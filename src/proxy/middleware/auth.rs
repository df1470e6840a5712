// API Key authentication middleware
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::models::{mask_key, Decision};
use crate::proxy::authorizer::extract_credential;
use crate::proxy::error::{ProxyError, PROXY_METHODS};
use crate::proxy::server::AppState;
use crate::proxy::upstream::client::is_supported_method;

/// Gate in front of the forward handler.
///
/// Unsupported methods are refused first so they never spend quota. The
/// quota decrement is committed here, before the upstream call, and is not
/// rolled back if forwarding fails afterwards.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ProxyError> {
    // Log the request method and path (the query may carry a credential)
    tracing::info!("Request: {} {}", request.method(), request.uri().path());

    if !is_supported_method(request.method()) {
        return Err(ProxyError::MethodNotAllowed {
            method: request.method().clone(),
            allow: PROXY_METHODS,
        });
    }

    let config = &state.config;
    let credential = extract_credential(
        request.headers(),
        request.uri().query(),
        &config.check_header,
        config.check_query.as_deref(),
    );

    let decision = state
        .authorizer
        .authorize(credential.as_deref())
        .await
        .map_err(|e| ProxyError::internal(e, config.debug))?;

    match decision {
        Decision::Unauthenticated => Err(ProxyError::NoApiKeyGiven {
            header: config.check_header.clone(),
        }),
        Decision::Unknown => Err(ProxyError::AuthFailed),
        Decision::Exhausted => {
            tracing::info!(
                key = %mask_key(credential.as_deref().unwrap_or_default()),
                "Quota exhausted"
            );
            Err(ProxyError::RateExceeded)
        }
        Decision::Admin => {
            tracing::debug!("Admin credential, quota not consumed");
            Ok(next.run(request).await)
        }
        Decision::Authorized { remaining } => {
            tracing::debug!(
                key = %mask_key(credential.as_deref().unwrap_or_default()),
                remaining,
                "Authorized"
            );
            Ok(next.run(request).await)
        }
    }
}
