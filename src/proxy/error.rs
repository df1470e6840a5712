//! Request-path errors and their JSON envelopes.
//!
//! Every failure on the proxy or admin routes is rendered as
//! `{"error": ..., "type": ...}` with the status code of its kind.

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

const MASKED_INTERNAL_ERROR: &str = "An unknown error occured.";

/// `Allow` value for the forwarded paths
pub const PROXY_METHODS: &str = "GET, POST, PUT";
/// `Allow` value for the admin routes
pub const ADMIN_METHODS: &str = "GET";

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("No API Key Provided. Please add the '{header}' header")]
    NoApiKeyGiven { header: String },

    #[error("You are not authenticated. Please check your API Key.")]
    AuthFailed,

    #[error("Rate Exceeded. Please contact us to increase your limit")]
    RateExceeded,

    #[error("Not Found")]
    NotFound { key: String },

    #[error("Invalid total '{0}': expected an integer")]
    InvalidTotal(String),

    #[error("Method {method} is not allowed")]
    MethodNotAllowed { method: Method, allow: &'static str },

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// `expose` is the debug flag: when false the detail stays in the logs
    #[error("Internal error: {detail}")]
    ServerCrashed { detail: String, expose: bool },
}

impl ProxyError {
    pub fn internal(err: impl std::fmt::Display, expose: bool) -> Self {
        ProxyError::ServerCrashed {
            detail: err.to_string(),
            expose,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::NoApiKeyGiven { .. } => "NoApiKeyGiven",
            ProxyError::AuthFailed => "AuthFailed",
            ProxyError::RateExceeded => "RateExceeded",
            ProxyError::NotFound { .. } => "NotFound",
            ProxyError::InvalidTotal(_) => "InvalidTotal",
            ProxyError::MethodNotAllowed { .. } => "MethodNotAllowed",
            ProxyError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            ProxyError::ServerCrashed { .. } => "ServerCrashed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoApiKeyGiven { .. } | ProxyError::AuthFailed | ProxyError::RateExceeded => {
                StatusCode::FORBIDDEN
            }
            ProxyError::NotFound { .. } => StatusCode::NOT_FOUND,
            ProxyError::InvalidTotal(_) => StatusCode::BAD_REQUEST,
            ProxyError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ProxyError::ServerCrashed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            ProxyError::NotFound { key } => json!({
                "key": key,
                "error": "Not Found",
                "type": self.kind(),
            }),
            ProxyError::ServerCrashed { detail, expose } => {
                let message = if *expose {
                    detail.as_str()
                } else {
                    MASKED_INTERNAL_ERROR
                };
                json!({
                    "error": message,
                    "type": self.kind(),
                })
            }
            _ => json!({
                "error": self.to_string(),
                "type": self.kind(),
            }),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Proxy error");
        } else {
            tracing::debug!(kind = self.kind(), "Request rejected");
        }

        let mut response = (status, Json(self.body())).into_response();
        if let ProxyError::MethodNotAllowed { allow, .. } = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}
