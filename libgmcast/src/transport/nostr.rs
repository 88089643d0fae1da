//! Nostr relay transport backed by `nostr-sdk`

use std::time::Duration;

use async_trait::async_trait;
use nostr_sdk::{Client, Event};
use tracing::{debug, warn};

use crate::error::{RelayError, Result};
use crate::transport::RelayTransport;

/// Opens a short-lived client per delivery
///
/// Signing happens before the transport is involved, so the client carries no
/// keys of its own.
pub struct NostrTransport {
    connect_timeout: Duration,
}

impl NostrTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn send(&self, client: &Client, relay: &str, event: &Event) -> Result<()> {
        client
            .add_relay(relay)
            .await
            .map_err(|e| RelayError::Connection {
                relay: relay.to_string(),
                reason: e.to_string(),
            })?;

        client.connect_with_timeout(self.connect_timeout).await;

        let output = client
            .send_event(event.clone())
            .await
            .map_err(|e| RelayError::Rejected {
                relay: relay.to_string(),
                reason: e.to_string(),
            })?;

        if output.success.is_empty() {
            return Err(RelayError::Rejected {
                relay: relay.to_string(),
                reason: format!("not acknowledged ({:?})", output.failed),
            }
            .into());
        }

        Ok(())
    }
}

/// Disconnects the client when dropped, including when the delivery future
/// is cancelled mid-await
struct ScopedClient {
    client: Client,
    relay: String,
}

impl Drop for ScopedClient {
    fn drop(&mut self) {
        let client = self.client.clone();
        let relay = std::mem::take(&mut self.relay);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = client.disconnect().await;
                    debug!(relay = %relay, "relay connection closed");
                });
            }
            Err(_) => warn!(relay = %relay, "no runtime to close relay connection"),
        }
    }
}

#[async_trait]
impl RelayTransport for NostrTransport {
    async fn deliver(&self, relay: &str, event: &Event) -> Result<()> {
        let scoped = ScopedClient {
            client: Client::default(),
            relay: relay.to_string(),
        };
        self.send(&scoped.client, relay, event).await
    }

    fn name(&self) -> &str {
        "nostr"
    }
}
