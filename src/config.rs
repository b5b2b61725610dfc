// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into a [`GatewayConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AWS_COGNITO_REGION` | Region of the user pool (falls back to `AWS_REGION`) | `eu-central-1` |
//! | `AWS_COGNITO_USERPOOL_ID` | Cognito user pool ID | Required |
//! | `AWS_COGNITO_CLIENT_ID` | App client ID tokens must be issued to | Required |
//! | `AWS_COGNITO_CLIENT_SECRET` | App client secret (enables `SECRET_HASH`) | Optional |
//! | `COGNITO_ENDPOINT` | Replaces the regional Cognito endpoint (emulators) | Optional |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWKS_CACHE_TTL_SECS` | Age after which the key set is refreshed | `3600` |
//! | `JWKS_MIN_REFRESH_SECS` | Minimum spacing between key set fetches | `15` |
//! | `JWKS_FETCH_TIMEOUT_SECS` | Timeout of a single key set fetch | `5` |
//! | `AUTH_LEEWAY_SECS` | Clock skew allowed on `exp`/`nbf` | `0` |
//! | `IS_DEV` | Development mode (mounts Swagger UI at `/docs`) | `false` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::time::Duration;

use crate::auth::jwks::{
    UserPool, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT, DEFAULT_MIN_REFRESH_INTERVAL,
};

pub const COGNITO_REGION_ENV: &str = "AWS_COGNITO_REGION";
pub const AWS_REGION_ENV: &str = "AWS_REGION";
pub const USER_POOL_ID_ENV: &str = "AWS_COGNITO_USERPOOL_ID";
pub const CLIENT_ID_ENV: &str = "AWS_COGNITO_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "AWS_COGNITO_CLIENT_SECRET";
pub const COGNITO_ENDPOINT_ENV: &str = "COGNITO_ENDPOINT";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWKS_MIN_REFRESH_ENV: &str = "JWKS_MIN_REFRESH_SECS";
pub const JWKS_FETCH_TIMEOUT_ENV: &str = "JWKS_FETCH_TIMEOUT_SECS";
pub const AUTH_LEEWAY_ENV: &str = "AUTH_LEEWAY_SECS";
pub const IS_DEV_ENV: &str = "IS_DEV";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_REGION: &str = "eu-central-1";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Default tracing filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value `{value}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub cognito_endpoint: Option<String>,
    pub bind_addr: SocketAddr,
    pub jwks_cache_ttl: Duration,
    pub jwks_min_refresh_interval: Duration,
    pub jwks_fetch_timeout: Duration,
    pub leeway_secs: u32,
    pub is_dev: bool,
    pub log_format: LogFormat,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let region = get(COGNITO_REGION_ENV)
            .or_else(|| get(AWS_REGION_ENV))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let user_pool_id = get(USER_POOL_ID_ENV).ok_or(ConfigError::Missing(USER_POOL_ID_ENV))?;
        let client_id = get(CLIENT_ID_ENV).ok_or(ConfigError::Missing(CLIENT_ID_ENV))?;

        let cognito_endpoint = match get(COGNITO_ENDPOINT_ENV) {
            Some(endpoint) => {
                url::Url::parse(&endpoint).map_err(|e| ConfigError::Invalid {
                    name: COGNITO_ENDPOINT_ENV,
                    value: endpoint.clone(),
                    reason: e.to_string(),
                })?;
                Some(endpoint)
            }
            None => None,
        };

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(get(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    value: host.clone(),
                    reason: e.to_string(),
                })?;

        let jwks_cache_ttl = seconds_or(get(JWKS_CACHE_TTL_ENV), JWKS_CACHE_TTL_ENV, DEFAULT_CACHE_TTL)?;
        let jwks_min_refresh_interval = seconds_or(
            get(JWKS_MIN_REFRESH_ENV),
            JWKS_MIN_REFRESH_ENV,
            DEFAULT_MIN_REFRESH_INTERVAL,
        )?;
        let jwks_fetch_timeout = seconds_or(
            get(JWKS_FETCH_TIMEOUT_ENV),
            JWKS_FETCH_TIMEOUT_ENV,
            DEFAULT_FETCH_TIMEOUT,
        )?;
        if jwks_fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: JWKS_FETCH_TIMEOUT_ENV,
                value: "0".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }

        let leeway_secs = parse_or(get(AUTH_LEEWAY_ENV), AUTH_LEEWAY_ENV, 0u32)?;
        let is_dev = get(IS_DEV_ENV)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            region,
            user_pool_id,
            client_id,
            client_secret: get(CLIENT_SECRET_ENV),
            cognito_endpoint,
            bind_addr,
            jwks_cache_ttl,
            jwks_min_refresh_interval,
            jwks_fetch_timeout,
            leeway_secs,
            is_dev,
            log_format,
        })
    }

    /// The user pool tokens are validated against.
    pub fn user_pool(&self) -> UserPool {
        let pool = UserPool::new(&self.region, &self.user_pool_id);
        match &self.cognito_endpoint {
            Some(endpoint) => pool.with_endpoint(endpoint),
            None => pool,
        }
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

fn seconds_or(
    raw: Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_or(raw, name, default.as_secs()).map(Duration::from_secs)
}
