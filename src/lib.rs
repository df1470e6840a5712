//! Authenticating reverse proxy with per-key usage quotas.
//!
//! ```text
//! client ──► auth_middleware ──► Authorizer ──► QuotaStore (GET / DECR)
//!                │                                    ▲
//!                ▼                                    │
//!          handle_forward ──► UpstreamClient     KeyRegistry ◄── /{admin}/add|rm|ls
//! ```

pub mod error;
pub mod models;
pub mod modules;
pub mod proxy; // Proxy service module
mod utils;

use modules::logger;
use tracing::info;

/// Load configuration, connect the quota store and serve until Ctrl-C
pub async fn run() -> anyhow::Result<()> {
    let config = modules::config::load_app_config()?;

    // Initialize logger
    logger::init_logger(config.log_dir.as_deref());
    info!("Configuration loaded: {:?}", config.proxy);

    let store = proxy::store::connect(&config.proxy.store).await?;
    proxy::server::log_routes(&config.proxy);

    let state = proxy::AppState::new(config.proxy, store)?;
    let (server, mut handle) = proxy::AxumServer::start(state).await?;

    let interrupted = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            true
        }
        res = &mut handle => {
            res?;
            false
        }
    };

    if interrupted {
        info!("Shutdown signal received");
        server.stop();
        handle.await?;
    }

    Ok(())
}
