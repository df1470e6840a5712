// Handlers module - admin registry endpoints and the forwarding endpoint

pub mod admin;
pub mod forward;
