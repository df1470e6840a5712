// Upstream client implementation
// Replays an authorized request against the configured upstream host

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use reqwest::Client;
use url::form_urlencoded;

use crate::proxy::config::{EmptyParamStyle, UpstreamConfig};
use crate::proxy::error::{ProxyError, PROXY_METHODS};

/// Token written for a query parameter whose value is empty (legacy style)
const LEGACY_EMPTY_PARAM_TOKEN: &str = "key";

/// Connection-level headers that must not cross the proxy
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
];

pub fn is_supported_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::POST || *method == Method::PUT
}

/// One inbound call, captured for replay
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Request path without its leading `/`
    pub path: String,
    /// Raw query string, as received
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// What the upstream answered, relayed as-is
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Re-encode a query string for the upstream URL.
///
/// Parameters keep the position of their first occurrence and the value of
/// their last one. An empty value is rendered per `style`.
pub fn encode_query(query: &str, style: EmptyParamStyle) -> String {
    let mut params: Vec<(String, String)> = Vec::new();
    for (name, value) in form_urlencoded::parse(query.as_bytes()) {
        match params.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value.into_owned(),
            None => params.push((name.into_owned(), value.into_owned())),
        }
    }

    params
        .iter()
        .map(|(name, value)| {
            let name: String = form_urlencoded::byte_serialize(name.as_bytes()).collect();
            if !value.is_empty() {
                let value: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
                format!("{}={}", name, value)
            } else {
                match style {
                    EmptyParamStyle::Legacy => LEGACY_EMPTY_PARAM_TOKEN.to_string(),
                    EmptyParamStyle::Named => format!("{}=", name),
                }
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the upstream URL: `base/path`, plus `?query` when any parameter remains
pub fn build_url(base_url: &str, path: &str, query: Option<&str>, style: EmptyParamStyle) -> String {
    let mut url = format!("{}/{}", base_url, path);
    if let Some(query) = query {
        let encoded = encode_query(query, style);
        if !encoded.is_empty() {
            url.push('?');
            url.push_str(&encoded);
        }
    }
    url
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

fn upstream_error(err: reqwest::Error) -> ProxyError {
    if err.is_timeout() {
        ProxyError::UpstreamUnavailable(format!("upstream request timed out: {}", err))
    } else {
        ProxyError::UpstreamUnavailable(err.to_string())
    }
}

pub struct UpstreamClient {
    http_client: Client,
    base_url: String,
    empty_param_style: EmptyParamStyle,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig, timeout_secs: u64) -> Self {
        Self {
            http_client: crate::utils::http::create_client_with_proxy(
                timeout_secs,
                config.proxy_url.as_deref(),
            ),
            base_url: config.base_url(),
            empty_param_style: config.empty_param_style,
        }
    }

    pub fn url_for(&self, path: &str, query: Option<&str>) -> String {
        build_url(&self.base_url, path, query, self.empty_param_style)
    }

    /// Replay `request` upstream and capture the full response.
    ///
    /// GET carries no body; POST and PUT send the inbound bytes unmodified.
    /// Inbound headers, cookies included, are passed through except for
    /// connection framing and `Host`, which the client sets itself.
    pub async fn forward(&self, request: ForwardRequest) -> Result<UpstreamResponse, ProxyError> {
        let url = self.url_for(&request.path, request.query.as_deref());

        let mut headers = request.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::HOST);

        let builder = match &request.method {
            &Method::GET => self.http_client.get(&url),
            &Method::POST => self.http_client.post(&url).body(request.body),
            &Method::PUT => self.http_client.put(&url).body(request.body),
            other => {
                return Err(ProxyError::MethodNotAllowed {
                    method: other.clone(),
                    allow: PROXY_METHODS,
                })
            }
        };

        tracing::debug!("Forwarding {} {}", request.method, url);

        let response = builder
            .headers(headers)
            .send()
            .await
            .map_err(upstream_error)?;

        let status = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);
        let body = response.bytes().await.map_err(upstream_error)?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
