use crate::billing::webhook::DEFAULT_TOLERANCE_SECS;
use crate::billing::DEFAULT_FREE_TIER_QUERY_LIMIT;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_VECTOR_DIMENSION: usize = 1536;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone)]
pub struct VectorIndexSettings {
    pub host: String,
    pub api_key: String,
    pub dimension: usize,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_pool_size: u32,
    pub admin_api_key: String,
    pub webhook_secret: String,
    pub webhook_tolerance_secs: i64,
    pub ordering_guard: bool,
    pub free_tier_query_limit: i32,
    pub vector_index: Option<VectorIndexSettings>,
    pub listen_addr: SocketAddr,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"<redacted>")
            .field("database_pool_size", &self.database_pool_size)
            .field("admin_api_key", &"<redacted>")
            .field("webhook_secret", &"<redacted>")
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .field("ordering_guard", &self.ordering_guard)
            .field("free_tier_query_limit", &self.free_tier_query_limit)
            .field(
                "vector_index_host",
                &self.vector_index.as_ref().map(|v| v.host.as_str()),
            )
            .field("listen_addr", &self.listen_addr)
            .finish()
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, ConfigError> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match lookup(key) {
        None => Ok(false),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(false),
            "1" | "true" | "yes" | "on" => Ok(true),
            _ => Err(ConfigError::Invalid { key, value }),
        },
    }
}

impl AppConfig {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vector_index = match lookup("VECTOR_INDEX_HOST").filter(|v| !v.trim().is_empty()) {
            Some(host) => Some(VectorIndexSettings {
                host,
                api_key: required(&lookup, "VECTOR_INDEX_API_KEY")?,
                dimension: parsed(&lookup, "VECTOR_INDEX_DIMENSION", DEFAULT_VECTOR_DIMENSION)?,
            }),
            None => None,
        };

        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = parsed(&lookup, "PORT", DEFAULT_PORT)?;
        let listen_addr = format!("{}:{}", host, port)
            .parse()
            .map_err(|_| ConfigError::Invalid {
                key: "HOST",
                value: host.clone(),
            })?;

        Ok(Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            database_pool_size: parsed(&lookup, "DATABASE_POOL_SIZE", DEFAULT_POOL_SIZE)?,
            admin_api_key: required(&lookup, "ADMIN_API_KEY")?,
            webhook_secret: required(&lookup, "BILLING_WEBHOOK_SECRET")?,
            webhook_tolerance_secs: parsed(
                &lookup,
                "BILLING_WEBHOOK_TOLERANCE_SECS",
                DEFAULT_TOLERANCE_SECS,
            )?,
            ordering_guard: flag(&lookup, "BILLING_ORDERING_GUARD")?,
            free_tier_query_limit: parsed(
                &lookup,
                "FREE_TIER_QUERY_LIMIT",
                DEFAULT_FREE_TIER_QUERY_LIMIT,
            )?,
            vector_index,
            listen_addr,
        })
    }
}
