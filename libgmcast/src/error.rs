//! Error types for gmcast

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GmcastError>;

#[derive(Error, Debug)]
pub enum GmcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GmcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            GmcastError::Config(_) => 2,
            GmcastError::Event(_)
            | GmcastError::Relay(_)
            | GmcastError::Publish(_)
            | GmcastError::Io(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid secret key: {0}")]
    InvalidKey(String),
}

impl ConfigError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum EventError {
    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Content integrity check failed: {0}")]
    Verification(String),
}

/// Failure of a single delivery to a single relay
#[derive(Error, Debug, Clone)]
pub enum RelayError {
    #[error("Could not connect to {relay}: {reason}")]
    Connection { relay: String, reason: String },

    #[error("{relay} rejected the event: {reason}")]
    Rejected { relay: String, reason: String },

    #[error("{relay} did not answer within {}", humantime::format_duration(*.after))]
    Timeout { relay: String, after: Duration },
}

impl RelayError {
    /// The relay URL this failure belongs to
    pub fn relay(&self) -> &str {
        match self {
            RelayError::Connection { relay, .. }
            | RelayError::Rejected { relay, .. }
            | RelayError::Timeout { relay, .. } => relay,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error("no relays configured")]
    NoRelays,

    #[error("all {} relays failed ({})", .0.len(), summarize(.0))]
    AllRelaysFailed(Vec<RelayError>),
}

fn summarize(failures: &[RelayError]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
