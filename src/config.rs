use crate::http::DEFAULT_TIMEOUT_SECS;
use std::str::FromStr;

pub const BIND_ADDRESS_KEY: &str = "CONDUIT_BIND_ADDRESS";
pub const DEFAULT_TIMEOUT_KEY: &str = "CONDUIT_DEFAULT_TIMEOUT_SECS";
pub const STORAGE_KEY: &str = "CONDUIT_STORAGE";
pub const MAX_BODY_BYTES_KEY: &str = "CONDUIT_MAX_BODY_BYTES";

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_MAX_BODY_BYTES: usize = 5003944;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StorageKind {
    #[default]
    DynamoDb,
    Memory,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dynamodb" => Ok(StorageKind::DynamoDb),
            "memory" => Ok(StorageKind::Memory),
            other => Err(format!("unknown storage {}, expected dynamodb or memory", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_address: String,
    /// Used when neither the call nor the interface names a timeout.
    pub default_timeout_secs: u64,
    pub storage: StorageKind,
    pub max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            storage: StorageKind::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl AppConfig {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let default_timeout_secs = match value(DEFAULT_TIMEOUT_KEY) {
            Some(raw) => match parse::<u64>(DEFAULT_TIMEOUT_KEY, &raw)? {
                0 => return Err(invalid(DEFAULT_TIMEOUT_KEY, &raw, "must be at least 1")),
                secs => secs,
            },
            None => defaults.default_timeout_secs,
        };
        Ok(AppConfig {
            bind_address: value(BIND_ADDRESS_KEY).unwrap_or(defaults.bind_address),
            default_timeout_secs,
            storage: match value(STORAGE_KEY) {
                Some(raw) => parse(STORAGE_KEY, &raw)?,
                None => defaults.storage,
            },
            max_body_bytes: match value(MAX_BODY_BYTES_KEY) {
                Some(raw) => parse(MAX_BODY_BYTES_KEY, &raw)?,
                None => defaults.max_body_bytes,
            },
        })
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    raw.trim()
        .parse::<T>()
        .map_err(|err| invalid(key, raw, &err.to_string()))
}

fn invalid(key: &str, raw: &str, reason: &str) -> ConfigError {
    ConfigError {
        key: key.to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    }
}
