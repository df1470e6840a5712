// Upstream forwarding

pub mod client;

pub use client::{ForwardRequest, UpstreamClient, UpstreamResponse};
