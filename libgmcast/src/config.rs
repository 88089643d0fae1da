//! Configuration management for gmcast
//!
//! Settings come from environment variables (optionally loaded from a `.env`
//! file by the binary). Parsing goes through a lookup function so tests can
//! feed a plain map instead of mutating the process environment.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nostr_sdk::PublicKey;
use secrecy::SecretString;

use crate::decision::default_post_interval;
use crate::error::{ConfigError, Result};
use crate::identity::parse_public_key;
use crate::logging::LogFormat;
use crate::publisher::DEFAULT_RELAY_TIMEOUT;
use crate::scheduler::Schedule;
use crate::transport::{default_relays, parse_relay_list};
use crate::types::Messages;

pub const DEFAULT_PORT: u16 = 8080;

pub const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY_NSEC";
pub const ENV_AUTHOR: &str = "AUTHOR_NPUB";
pub const ENV_RELAYS: &str = "RELAYS";
pub const ENV_PORT: &str = "PORT";
pub const ENV_DEBUG: &str = "DEBUG";
pub const ENV_POST_AT_STARTUP: &str = "POST_AT_STARTUP";
pub const ENV_LAST_POST: &str = "LAST_POST_TIMESTAMP";
pub const ENV_SCHEDULE: &str = "SCHEDULE";
pub const ENV_POST_INTERVAL: &str = "POST_INTERVAL";
pub const ENV_RELAY_TIMEOUT: &str = "RELAY_TIMEOUT";
pub const ENV_WEEKDAY_MESSAGE: &str = "WEEKDAY_MESSAGE";
pub const ENV_WEEKEND_MESSAGE: &str = "WEEKEND_MESSAGE";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

#[derive(Debug)]
pub struct Config {
    pub secret_key: SecretString,
    pub author: Option<PublicKey>,
    pub relays: Vec<String>,
    pub port: u16,
    pub debug: bool,
    pub post_at_startup: bool,
    pub last_post_seed: Option<DateTime<Utc>>,
    pub schedule: Schedule,
    pub post_interval: chrono::Duration,
    pub relay_timeout: Duration,
    pub messages: Messages,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from a key/value map
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| values.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret_key = get(ENV_PRIVATE_KEY)
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingField(ENV_PRIVATE_KEY.to_string()))?;

        let author = get(ENV_AUTHOR)
            .map(|v| parse_public_key(&v))
            .transpose()?;

        let relays = match get(ENV_RELAYS) {
            Some(list) => parse_relay_list(&list)?,
            None => default_relays(),
        };

        let port = match get(ENV_PORT) {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid(ENV_PORT, format!("{}: {}", v, e)))?,
            None => DEFAULT_PORT,
        };

        let debug = get(ENV_DEBUG)
            .map(|v| parse_bool(ENV_DEBUG, &v))
            .transpose()?
            .unwrap_or(false);

        let post_at_startup = get(ENV_POST_AT_STARTUP)
            .map(|v| parse_bool(ENV_POST_AT_STARTUP, &v))
            .transpose()?
            .unwrap_or(false);

        let last_post_seed = get(ENV_LAST_POST)
            .map(|v| parse_timestamp(&v))
            .transpose()?;

        let schedule = match get(ENV_SCHEDULE) {
            Some(v) => v.parse()?,
            None => Schedule::default(),
        };

        let post_interval = match get(ENV_POST_INTERVAL) {
            Some(v) => {
                let std = parse_duration(ENV_POST_INTERVAL, &v)?;
                chrono::Duration::from_std(std)
                    .map_err(|_| ConfigError::invalid(ENV_POST_INTERVAL, "out of range"))?
            }
            None => default_post_interval(),
        };

        let relay_timeout = match get(ENV_RELAY_TIMEOUT) {
            Some(v) => parse_duration(ENV_RELAY_TIMEOUT, &v)?,
            None => DEFAULT_RELAY_TIMEOUT,
        };

        let defaults = Messages::default();
        let messages = Messages {
            weekday: get(ENV_WEEKDAY_MESSAGE).unwrap_or(defaults.weekday),
            weekend: get(ENV_WEEKEND_MESSAGE).unwrap_or(defaults.weekend),
        };

        let logging = LoggingSettings {
            format: match get(ENV_LOG_FORMAT) {
                Some(v) => v
                    .parse()
                    .map_err(|e: String| ConfigError::invalid(ENV_LOG_FORMAT, e))?,
                None => LogFormat::Text,
            },
            level: get(ENV_LOG_LEVEL).unwrap_or_else(|| "info".to_string()),
        };

        Ok(Self {
            secret_key,
            author,
            relays,
            port,
            debug,
            post_at_startup,
            last_post_seed,
            schedule,
            post_interval,
            relay_timeout,
            messages,
            logging,
        })
    }
}

fn parse_bool(field: &str, value: &str) -> std::result::Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(
            field,
            format!("'{}' is not a boolean", other),
        )),
    }
}

fn parse_duration(field: &str, value: &str) -> std::result::Result<Duration, ConfigError> {
    let duration = humantime::parse_duration(value.trim())
        .map_err(|e| ConfigError::invalid(field, format!("{}: {}", value, e)))?;
    if duration.is_zero() {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    Ok(duration)
}

/// Unix seconds, unix milliseconds (13+ digits) or RFC 3339
fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, ConfigError> {
    let value = value.trim();

    if let Ok(number) = value.parse::<i64>() {
        let parsed = if value.trim_start_matches('-').len() >= 13 {
            DateTime::from_timestamp_millis(number)
        } else {
            DateTime::from_timestamp(number, 0)
        };
        return parsed.ok_or_else(|| ConfigError::invalid(ENV_LAST_POST, "timestamp out of range"));
    }

    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ConfigError::invalid(ENV_LAST_POST, format!("{}: {}", value, e)))
}
