use reqwest::{Client, Proxy};
use std::time::Duration;

/// Create the HTTP client used for upstream calls.
///
/// Redirects are not followed and responses are not decompressed, so the
/// caller sees exactly what the upstream sent. Proxy environment variables
/// are ignored; an outbound proxy is only used when configured explicitly.
pub fn create_client_with_proxy(timeout_secs: u64, proxy_url: Option<&str>) -> Client {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy();

    if let Some(url) = proxy_url.filter(|url| !url.is_empty()) {
        match Proxy::all(url) {
            Ok(proxy) => {
                builder = builder.proxy(proxy);
                tracing::info!("HTTP client upstream proxy enabled: {}", url);
            }
            Err(e) => {
                tracing::error!("Invalid proxy address: {}, error: {}", url, e);
            }
        }
    }

    builder.build().unwrap_or_else(|e| {
        tracing::error!("Failed to build upstream HTTP client, using defaults: {}", e);
        Client::new()
    })
}
