//! Mock transport implementation for testing
//!
//! Each relay URL can be scripted to accept, reject, respond slowly or never
//! respond at all. Deliveries are recorded so tests can check exactly which
//! relays saw which event without touching the network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nostr_sdk::{Event, EventId};
use tokio::time::sleep;

use crate::error::{RelayError, Result};
use crate::transport::RelayTransport;

/// Scripted behaviour of a single mock relay
#[derive(Debug, Clone)]
pub enum MockRelay {
    /// Accept after the given delay
    Accept(Duration),
    /// Reject with the given reason
    Reject(String),
    /// Fail to connect with the given reason
    Unreachable(String),
    /// Never answer
    Hang,
}

/// A delivery the mock accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub relay: String,
    pub event_id: EventId,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    relays: HashMap<String, MockRelay>,
    /// Relays not scripted explicitly fall back to this
    fallback: Option<MockRelay>,
    deliveries: Arc<Mutex<Vec<Delivery>>>,
    attempts: Arc<Mutex<usize>>,
    released: Arc<Mutex<usize>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every relay accepts immediately
    pub fn accepting() -> Self {
        Self {
            fallback: Some(MockRelay::Accept(Duration::ZERO)),
            ..Default::default()
        }
    }

    /// Every relay rejects
    pub fn rejecting(reason: &str) -> Self {
        Self {
            fallback: Some(MockRelay::Reject(reason.to_string())),
            ..Default::default()
        }
    }

    pub fn with_relay(mut self, relay: &str, behaviour: MockRelay) -> Self {
        self.relays.insert(relay.to_string(), behaviour);
        self
    }

    /// Accepted deliveries in completion order
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Number of `deliver` calls, accepted or not
    pub fn attempt_count(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    /// Number of deliveries that released their connection, including ones
    /// dropped mid-flight
    pub fn released_count(&self) -> usize {
        *self.released.lock().unwrap()
    }

    fn behaviour(&self, relay: &str) -> MockRelay {
        self.relays
            .get(relay)
            .cloned()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| MockRelay::Unreachable("relay not scripted".to_string()))
    }
}

/// Counts as released when dropped, so cancelled deliveries are seen too
struct MockConnection(Arc<Mutex<usize>>);

impl Drop for MockConnection {
    fn drop(&mut self) {
        if let Ok(mut released) = self.0.lock() {
            *released += 1;
        }
    }
}

#[async_trait]
impl RelayTransport for MockTransport {
    async fn deliver(&self, relay: &str, event: &Event) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        let _connection = MockConnection(Arc::clone(&self.released));

        match self.behaviour(relay) {
            MockRelay::Accept(delay) => {
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                self.deliveries.lock().unwrap().push(Delivery {
                    relay: relay.to_string(),
                    event_id: event.id,
                    content: event.content.clone(),
                });
                Ok(())
            }
            MockRelay::Reject(reason) => Err(RelayError::Rejected {
                relay: relay.to_string(),
                reason,
            }
            .into()),
            MockRelay::Unreachable(reason) => Err(RelayError::Connection {
                relay: relay.to_string(),
                reason,
            }
            .into()),
            MockRelay::Hang => std::future::pending::<Result<()>>().await,
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
