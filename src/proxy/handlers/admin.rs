// Admin Handler
//
// Mounted under the admin key prefix, so reaching any of these routes is
// the admin check.
use axum::{
    extract::{Path, State},
    http::Method,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::models::{mask_key, KeyGrant};
use crate::proxy::error::{ProxyError, ADMIN_METHODS};
use crate::proxy::registry::RegistryError;
use crate::proxy::server::AppState;

/// Route templates relative to the admin prefix, with their descriptions
pub const ROUTES: [(&str, &str); 4] = [
    ("/ls/:key", "Describe the usage for <key>"),
    ("/rm/:key", "Remove the api key <key>"),
    ("/add/:total", "Generate an API key with <total>. Key is returned."),
    ("/add/:total/:key", "Register an API key <key> with usage <total>"),
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add/:total", get(handle_add).fallback(method_not_allowed))
        .route(
            "/add/:total/:key",
            get(handle_add_specific).fallback(method_not_allowed),
        )
        .route("/rm/:key", get(handle_remove).fallback(method_not_allowed))
        .route("/ls/:key", get(handle_list).fallback(method_not_allowed))
}

async fn method_not_allowed(method: Method) -> ProxyError {
    ProxyError::MethodNotAllowed {
        method,
        allow: ADMIN_METHODS,
    }
}

fn success(extra: Value) -> Json<Value> {
    let mut body = json!({ "message": "success" });
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
        body.extend(extra);
    }
    Json(body)
}

fn grant_body(grant: KeyGrant) -> Json<Value> {
    success(json!({ "key": grant.key, "total": grant.total }))
}

fn parse_total(raw: &str) -> Result<i64, ProxyError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ProxyError::InvalidTotal(raw.to_string()))
}

pub async fn handle_add(
    State(state): State<AppState>,
    Path(total): Path<String>,
) -> Result<Json<Value>, ProxyError> {
    let total = parse_total(&total)?;
    let grant = state
        .registry
        .create(total)
        .await
        .map_err(|e| ProxyError::internal(e, state.config.debug))?;

    info!(key = %mask_key(&grant.key), total, "Created API key");
    Ok(grant_body(grant))
}

pub async fn handle_add_specific(
    State(state): State<AppState>,
    Path((total, key)): Path<(String, String)>,
) -> Result<Json<Value>, ProxyError> {
    let total = parse_total(&total)?;
    let grant = state
        .registry
        .register_specific(&key, total)
        .await
        .map_err(|e| ProxyError::internal(e, state.config.debug))?;

    info!(key = %mask_key(&grant.key), total, "Registered API key");
    Ok(grant_body(grant))
}

pub async fn handle_remove(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ProxyError> {
    state
        .registry
        .remove(&key)
        .await
        .map_err(|e| ProxyError::internal(e, state.config.debug))?;

    info!(key = %mask_key(&key), "Removed API key");
    Ok(success(json!({ "rm": key })))
}

pub async fn handle_list(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ProxyError> {
    match state.registry.list(&key).await {
        Ok(total) => Ok(success(json!({ "key": key, "ls": total }))),
        Err(RegistryError::NotFound(key)) => Err(ProxyError::NotFound { key }),
        Err(RegistryError::Store(e)) => Err(ProxyError::internal(e, state.config.debug)),
    }
}
