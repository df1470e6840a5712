pub mod config;
pub mod quota;

pub use config::AppConfig;
pub use quota::{mask_key, Decision, KeyGrant};
