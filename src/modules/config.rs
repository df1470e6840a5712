//! Builds [`AppConfig`] from environment variables.
//!
//! | Variable               | Default     | Description                              |
//! |------------------------|-------------|------------------------------------------|
//! | `FORWARD_HOST`         | (required)  | Upstream host                            |
//! | `FORWARD_PORT`         | `80`        | Upstream port                            |
//! | `FORWARD_SCHEME`       | `http`      | Upstream scheme                          |
//! | `UPSTREAM_PROXY`       | (none)      | Outbound proxy for upstream calls        |
//! | `ADMIN_API_KEY`        | (required)  | Admin route prefix and admin credential  |
//! | `CHECK_HEADER`         | `api-key`   | Header carrying the API key              |
//! | `CHECK_QUERY`          | (none)      | Fallback query parameter                 |
//! | `DEBUG`                | off         | Surface internal error details           |
//! | `LISTEN_HOST`          | `0.0.0.0`   | Listen address                           |
//! | `LISTEN_PORT`          | `8080`      | Listen port                              |
//! | `REQUEST_TIMEOUT_SECS` | `120`       | Upstream request timeout                 |
//! | `QUOTA_STORE`          | `redis`     | `redis` or `memory`                      |
//! | `REDIS_HOST`           | `localhost` | Redis host                               |
//! | `REDIS_PORT`           | `6379`      | Redis port                               |
//! | `QUERY_EMPTY_AS_NAME`  | off         | Render empty query values as `name=`     |
//! | `LOG_DIR`              | (none)      | Directory for the rolling log file       |
//!
//! Empty values count as unset.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;
use crate::proxy::config::{
    EmptyParamStyle, ProxyConfig, StoreConfig, UpstreamConfig, DEFAULT_CHECK_HEADER,
    DEFAULT_LISTEN_HOST, DEFAULT_LISTEN_PORT, DEFAULT_REDIS_PORT, DEFAULT_UPSTREAM_PORT,
};

/// Load application config from the process environment
pub fn load_app_config() -> AppResult<AppConfig> {
    load_app_config_from(|name| std::env::var(name).ok())
}

/// Load application config through `lookup`, so tests never touch the
/// process environment
pub fn load_app_config_from<F>(lookup: F) -> AppResult<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

    let admin_api_key = var("ADMIN_API_KEY")
        .ok_or_else(|| AppError::Config("ADMIN_API_KEY is required".to_string()))?;
    let host = var("FORWARD_HOST")
        .ok_or_else(|| AppError::Config("FORWARD_HOST is required".to_string()))?;

    let mut upstream = UpstreamConfig::new(host, parse_or(&var, "FORWARD_PORT", DEFAULT_UPSTREAM_PORT)?);
    if let Some(scheme) = var("FORWARD_SCHEME") {
        upstream.scheme = scheme;
    }
    upstream.proxy_url = var("UPSTREAM_PROXY");
    if flag(&var, "QUERY_EMPTY_AS_NAME") {
        upstream.empty_param_style = EmptyParamStyle::Named;
    }

    let store = match var("QUOTA_STORE").as_deref() {
        None | Some("redis") => StoreConfig::Redis {
            host: var("REDIS_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(&var, "REDIS_PORT", DEFAULT_REDIS_PORT)?,
        },
        Some("memory") => StoreConfig::Memory,
        Some(other) => {
            return Err(AppError::Config(format!(
                "QUOTA_STORE must be 'redis' or 'memory', got '{}'",
                other
            )))
        }
    };

    let mut proxy = ProxyConfig::new(admin_api_key, upstream);
    proxy.listen_host = var("LISTEN_HOST").unwrap_or_else(|| DEFAULT_LISTEN_HOST.to_string());
    proxy.port = parse_or(&var, "LISTEN_PORT", DEFAULT_LISTEN_PORT)?;
    proxy.check_header = var("CHECK_HEADER").unwrap_or_else(|| DEFAULT_CHECK_HEADER.to_string());
    proxy.check_query = var("CHECK_QUERY");
    proxy.debug = flag(&var, "DEBUG");
    proxy.request_timeout = parse_or(&var, "REQUEST_TIMEOUT_SECS", proxy.request_timeout)?;
    proxy.store = store;
    proxy.validate()?;

    let mut config = AppConfig::new(proxy);
    config.log_dir = var("LOG_DIR").map(PathBuf::from);
    Ok(config)
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {} '{}': {}", name, raw, e))),
    }
}

fn flag<F>(var: &F, name: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    var(name).is_some_and(|value| {
        !matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> AppResult<AppConfig> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_app_config_from(|name| env.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [("ADMIN_API_KEY", "root"), ("FORWARD_HOST", "backend")];

    #[test]
    fn minimal_environment_uses_defaults() {
        let config = load(&REQUIRED).unwrap();
        let proxy = &config.proxy;
        assert_eq!(proxy.admin_api_key, "root");
        assert_eq!(proxy.upstream.base_url(), "http://backend:80");
        assert_eq!(proxy.check_header, "api-key");
        assert_eq!(proxy.check_query, None);
        assert!(!proxy.debug);
        assert_eq!(proxy.bind_address(), "0.0.0.0:8080");
        assert_eq!(
            proxy.store,
            StoreConfig::Redis {
                host: "localhost".to_string(),
                port: 6379
            }
        );
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn admin_key_and_forward_host_are_required() {
        assert!(matches!(
            load(&[("FORWARD_HOST", "backend")]),
            Err(AppError::Config(msg)) if msg.contains("ADMIN_API_KEY")
        ));
        assert!(matches!(
            load(&[("ADMIN_API_KEY", "root")]),
            Err(AppError::Config(msg)) if msg.contains("FORWARD_HOST")
        ));
        assert!(load(&[("ADMIN_API_KEY", ""), ("FORWARD_HOST", "backend")]).is_err());
    }

    #[test]
    fn overrides_are_applied() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("FORWARD_PORT", "9000"),
            ("FORWARD_SCHEME", "https"),
            ("CHECK_HEADER", "x-token"),
            ("CHECK_QUERY", "token"),
            ("DEBUG", "1"),
            ("LISTEN_PORT", "9999"),
            ("REQUEST_TIMEOUT_SECS", "5"),
            ("QUOTA_STORE", "memory"),
            ("QUERY_EMPTY_AS_NAME", "true"),
            ("LOG_DIR", "/tmp/proxy-logs"),
        ]);
        let config = load(&vars).unwrap();
        let proxy = &config.proxy;
        assert_eq!(proxy.upstream.base_url(), "https://backend:9000");
        assert_eq!(proxy.check_header, "x-token");
        assert_eq!(proxy.check_query.as_deref(), Some("token"));
        assert!(proxy.debug);
        assert_eq!(proxy.port, 9999);
        assert_eq!(proxy.request_timeout, 5);
        assert_eq!(proxy.store, StoreConfig::Memory);
        assert_eq!(proxy.upstream.empty_param_style, EmptyParamStyle::Named);
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/proxy-logs")));
    }

    #[test]
    fn empty_check_query_disables_fallback() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("CHECK_QUERY", ""));
        assert_eq!(load(&vars).unwrap().proxy.check_query, None);
    }

    #[test]
    fn debug_flag_values() {
        for (value, expected) in [("1", true), ("yes", true), ("0", false), ("False", false), ("off", false)] {
            let mut vars = REQUIRED.to_vec();
            vars.push(("DEBUG", value));
            assert_eq!(load(&vars).unwrap().proxy.debug, expected, "DEBUG={}", value);
        }
    }

    #[test]
    fn invalid_numbers_are_config_errors() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("FORWARD_PORT", "eighty"));
        assert!(matches!(load(&vars), Err(AppError::Config(msg)) if msg.contains("FORWARD_PORT")));
    }

    #[test]
    fn unknown_store_backend_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("QUOTA_STORE", "etcd"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn redis_location_is_configurable() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([("REDIS_HOST", "cache"), ("REDIS_PORT", "6380")]);
        assert_eq!(
            load(&vars).unwrap().proxy.store,
            StoreConfig::Redis {
                host: "cache".to_string(),
                port: 6380
            }
        );
    }
}
