//! Relay transport abstraction
//!
//! A transport delivers one signed event to one relay and reports whether the
//! relay accepted it. Fan-out across relays is the publisher's job, so
//! implementations only ever deal with a single destination per call.
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//! use libgmcast::transport::{nostr::NostrTransport, RelayTransport};
//!
//! # async fn example(event: nostr_sdk::Event) -> libgmcast::Result<()> {
//! let transport = NostrTransport::new(Duration::from_secs(10));
//! transport.deliver("wss://relay.damus.io", &event).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use nostr_sdk::{Event, Url};

use crate::error::ConfigError;

pub mod nostr;

// Mock transport is available for all builds (not just tests) to support integration tests
pub mod mock;

#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Deliver a signed event to a single relay
    ///
    /// Any connection opened for the delivery must be released before this
    /// returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns `RelayError` if the relay cannot be reached or rejects the event.
    async fn deliver(&self, relay: &str, event: &Event) -> crate::Result<()>;

    /// Short identifier used in logs
    fn name(&self) -> &str;
}

/// Relays used when `RELAYS` is not configured
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.nostr.band",
];

/// Validate a comma-separated relay list
///
/// Blank entries are skipped and duplicates collapse to their first occurrence.
pub fn parse_relay_list(input: &str) -> Result<Vec<String>, ConfigError> {
    let mut relays: Vec<String> = Vec::new();

    for entry in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let url = Url::parse(entry)
            .map_err(|e| ConfigError::invalid("RELAYS", format!("{}: {}", entry, e)))?;

        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(ConfigError::invalid(
                "RELAYS",
                format!("{}: relay URLs must use ws:// or wss://", entry),
            ));
        }

        let normalized = entry.trim_end_matches('/').to_string();
        if !relays.contains(&normalized) {
            relays.push(normalized);
        }
    }

    if relays.is_empty() {
        return Err(ConfigError::invalid("RELAYS", "at least one relay is required"));
    }

    Ok(relays)
}

pub fn default_relays() -> Vec<String> {
    DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect()
}
