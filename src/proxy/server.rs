use crate::error::{AppError, AppResult};
use crate::proxy::authorizer::Authorizer;
use crate::proxy::config::ProxyConfig;
use crate::proxy::error::ProxyError;
use crate::proxy::registry::KeyRegistry;
use crate::proxy::store::QuotaStore;
use crate::proxy::upstream::UpstreamClient;
use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Response},
    Router,
};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub authorizer: Authorizer,
    pub registry: KeyRegistry,
    pub upstream: Arc<UpstreamClient>,
}

impl AppState {
    pub fn new(config: ProxyConfig, store: Arc<dyn QuotaStore>) -> AppResult<Self> {
        config.validate()?;
        let upstream = UpstreamClient::new(&config.upstream, config.request_timeout);
        Ok(Self {
            authorizer: Authorizer::new(store.clone(), &config.admin_api_key),
            registry: KeyRegistry::new(store),
            upstream: Arc::new(upstream),
            config: Arc::new(config),
        })
    }
}

/// Render a handler panic as a `ServerCrashed` envelope
fn panic_response(debug: bool) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response + Clone {
    move |panic: Box<dyn Any + Send + 'static>| {
        let detail = if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = panic.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "handler panicked".to_string()
        };
        ProxyError::internal(detail, debug).into_response()
    }
}

/// Build the full router: admin registry under the admin prefix, everything
/// else authorized and forwarded.
pub fn build_router(state: AppState) -> Router {
    use crate::proxy::handlers;
    use crate::proxy::middleware::auth_middleware;

    let admin_prefix = format!("/{}", state.config.admin_api_key);

    let proxy_routes = Router::new()
        .fallback(handlers::forward::handle_forward)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest(&admin_prefix, handlers::admin::router())
        .merge(proxy_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response(state.config.debug)))
        .with_state(state)
}

/// Log the admin route table without revealing the admin prefix
pub fn log_routes(config: &ProxyConfig) {
    for (route, description) in crate::proxy::handlers::admin::ROUTES {
        tracing::info!("GET /<admin>{} - {}", route, description);
    }
    tracing::info!(
        "GET|POST|PUT /*path - forwarded to {} (credential header '{}')",
        config.upstream.base_url(),
        config.check_header
    );
}

/// Axum server instance
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    local_addr: SocketAddr,
}

impl AxumServer {
    /// Start Axum server
    pub async fn start(state: AppState) -> AppResult<(Self, tokio::task::JoinHandle<()>)> {
        let addr = state.config.bind_address();
        let app = build_router(state);

        // Bind address
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Server(format!("Failed to bind address {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Reverse proxy server started at http://{}", local_addr);

        // Create shutdown channel
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let server_instance = Self {
            shutdown_tx: Some(shutdown_tx),
            local_addr,
        };

        // Start server in new task
        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(app.clone());

                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection handling finished or errored: {:?}", err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("Reverse proxy server stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((server_instance, handle))
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::config::UpstreamConfig;
    use crate::proxy::store::{MemoryQuotaStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    const ADMIN: &str = "admin-secret";

    /// Nothing listens on the discard port, so forwarding fails fast
    fn config() -> ProxyConfig {
        ProxyConfig::new(ADMIN, UpstreamConfig::new("127.0.0.1", 9))
    }

    fn app_with(config: ProxyConfig) -> (MemoryQuotaStore, Router) {
        let store = MemoryQuotaStore::new();
        let state = AppState::new(config, Arc::new(store.clone())).unwrap();
        (store, build_router(state))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn get_with_key(uri: &str, key: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("api-key", key)
            .body(Body::empty())
            .unwrap()
    }

    struct FailingStore;

    #[async_trait]
    impl QuotaStore for FailingStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<i64>> {
            Err(StoreError::Backend("connection reset".to_string()))
        }
        async fn set(&self, _key: &str, _value: i64) -> StoreResult<()> {
            Err(StoreError::Backend("connection reset".to_string()))
        }
        async fn delete(&self, _key: &str) -> StoreResult<()> {
            Err(StoreError::Backend("connection reset".to_string()))
        }
        async fn decrement(&self, _key: &str) -> StoreResult<i64> {
            Err(StoreError::Backend("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn admin_add_list_remove_flow() {
        let (store, app) = app_with(config());

        let (status, body) = send(&app, get("/admin-secret/add/5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "success");
        assert_eq!(body["total"], 5);
        let key = body["key"].as_str().unwrap().to_string();
        assert_eq!(store.peek(&key), Some(5));

        let (status, body) = send(&app, get(&format!("/admin-secret/ls/{}", key))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ls"], 5);
        assert_eq!(body["key"], key.as_str());

        let (status, body) = send(&app, get(&format!("/admin-secret/rm/{}", key))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rm"], key.as_str());

        let (status, body) = send(&app, get(&format!("/admin-secret/ls/{}", key))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            serde_json::json!({"key": key, "error": "Not Found", "type": "NotFound"})
        );
    }

    #[tokio::test]
    async fn admin_register_specific_overwrites() {
        let (store, app) = app_with(config());
        send(&app, get("/admin-secret/add/3/abc")).await;
        let (status, body) = send(&app, get("/admin-secret/add/1/abc")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"message": "success", "key": "abc", "total": 1}));
        assert_eq!(store.peek("abc"), Some(1));
    }

    #[tokio::test]
    async fn admin_remove_absent_key_is_success() {
        let (_, app) = app_with(config());
        let (status, body) = send(&app, get("/admin-secret/rm/ghost")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rm"], "ghost");
    }

    #[tokio::test]
    async fn admin_invalid_total_is_400() {
        let (store, app) = app_with(config());
        let (status, body) = send(&app, get("/admin-secret/add/lots")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "InvalidTotal");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn missing_credential_is_403() {
        let (_, app) = app_with(config());
        let (status, body) = send(&app, get("/some/path")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["type"], "NoApiKeyGiven");
    }

    #[tokio::test]
    async fn unknown_and_exhausted_keys_are_403() {
        let (store, app) = app_with(config());
        store.insert("spent", 0);

        let (status, body) = send(&app, get_with_key("/x", "who")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["type"], "AuthFailed");

        let (status, body) = send(&app, get_with_key("/x", "spent")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["type"], "RateExceeded");
        assert_eq!(store.peek("spent"), Some(0));
    }

    #[tokio::test]
    async fn unsupported_method_spends_no_quota() {
        let (store, app) = app_with(config());
        store.insert("k", 2);
        let request = Request::builder()
            .method("DELETE")
            .uri("/items/1")
            .header("api-key", "k")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["type"], "MethodNotAllowed");
        assert_eq!(store.peek("k"), Some(2));
    }

    #[tokio::test]
    async fn admin_route_with_wrong_method_is_json_405() {
        let (store, app) = app_with(config());
        store.insert("k", 2);
        let request = Request::builder()
            .method("POST")
            .uri("/admin-secret/add/5")
            .header("api-key", "k")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[axum::http::header::ALLOW], "GET");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["type"], "MethodNotAllowed");
        assert_eq!(store.len(), 1);
        assert_eq!(store.peek("k"), Some(2));
    }

    #[tokio::test]
    async fn upstream_failure_is_502_and_quota_stays_spent() {
        let (store, app) = app_with(config());
        store.insert("k", 2);
        let (status, body) = send(&app, get_with_key("/x", "k")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["type"], "UpstreamUnavailable");
        assert_eq!(store.peek("k"), Some(1));
    }

    #[tokio::test]
    async fn query_fallback_credential() {
        let mut cfg = config();
        cfg.check_query = Some("token".to_string());
        let (store, app) = app_with(cfg);
        store.insert("k", 1);
        let (status, _) = send(&app, get("/x?token=k")).await;
        // Authorized, then the upstream is unreachable
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(store.peek("k"), Some(0));
    }

    #[tokio::test]
    async fn store_failure_is_masked_unless_debug() {
        let state = AppState::new(config(), Arc::new(FailingStore)).unwrap();
        let app = build_router(state);
        let (status, body) = send(&app, get_with_key("/x", "k")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["type"], "ServerCrashed");
        assert_eq!(body["error"], "An unknown error occured.");

        let mut cfg = config();
        cfg.debug = true;
        let app = build_router(AppState::new(cfg, Arc::new(FailingStore)).unwrap());
        let (status, body) = send(&app, get("/admin-secret/ls/k")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("connection reset"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = config();
        cfg.admin_api_key = "has/slash".to_string();
        assert!(AppState::new(cfg, Arc::new(MemoryQuotaStore::new())).is_err());
    }

    #[tokio::test]
    async fn panics_become_server_crashed() {
        let (status, body) = {
            let handler = panic_response(false);
            let response = handler(Box::new("boom"));
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, serde_json::from_slice::<Value>(&bytes).unwrap())
        };
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["type"], "ServerCrashed");
    }
}
