//! Process configuration, read once from the environment at start-up.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use store_infra::{MAX_PER_PAGE, PgSettings};
use store_observability::LogFormat;

pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080));
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_SITE_HEADER: &str = "Store";
pub const DEFAULT_INDEX_TITLE: &str = "Special Access";
pub const DEFAULT_LIST_PER_PAGE: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Admin site branding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteConfig {
    #[serde(rename = "site_header")]
    pub header: String,
    pub index_title: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            header: DEFAULT_SITE_HEADER.to_string(),
            index_title: DEFAULT_INDEX_TITLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn pg_settings(&self) -> PgSettings {
        PgSettings {
            url: self.url.clone(),
            max_connections: self.max_connections,
            acquire_timeout: self.acquire_timeout,
        }
    }
}

/// Immutable application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// `None` selects the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub site: SiteConfig,
    pub list_per_page: u32,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match get("STORE_BIND_ADDR") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("STORE_BIND_ADDR", &raw, e))?,
            None => DEFAULT_BIND_ADDR,
        };

        let database = match get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(
                    get("DATABASE_MAX_CONNECTIONS"),
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_MAX_CONNECTIONS,
                )?,
                acquire_timeout: Duration::from_secs(parse_or(
                    get("DATABASE_ACQUIRE_TIMEOUT_SECS"),
                    "DATABASE_ACQUIRE_TIMEOUT_SECS",
                    DEFAULT_ACQUIRE_TIMEOUT_SECS,
                )?),
            }),
            None => None,
        };

        let list_per_page = parse_or(
            get("STORE_LIST_PER_PAGE"),
            "STORE_LIST_PER_PAGE",
            DEFAULT_LIST_PER_PAGE,
        )?;
        if !(1..=MAX_PER_PAGE).contains(&list_per_page) {
            return Err(ConfigError::invalid(
                "STORE_LIST_PER_PAGE",
                &list_per_page.to_string(),
                format!("must be between 1 and {MAX_PER_PAGE}"),
            ));
        }

        let log_format = match get("STORE_LOG_FORMAT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::invalid("STORE_LOG_FORMAT", &raw, e))?,
            None => LogFormat::default(),
        };

        let defaults = SiteConfig::default();
        Ok(Self {
            bind_addr,
            database,
            site: SiteConfig {
                header: get("STORE_SITE_HEADER").unwrap_or(defaults.header),
                index_title: get("STORE_INDEX_TITLE").unwrap_or(defaults.index_title),
            },
            list_per_page,
            log_format,
        })
    }
}

fn parse_or<T>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::invalid(var, &raw, e)),
        None => Ok(default),
    }
}
