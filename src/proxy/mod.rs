// proxy module - authenticating reverse proxy service

pub mod authorizer;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod store;

pub mod handlers; // Admin and forwarding endpoints
pub mod middleware; // Axum middleware
pub mod upstream; // Upstream client

pub use config::ProxyConfig;
pub use server::{AppState, AxumServer};
