//! Publish orchestration
//!
//! One attempt builds a note, signs it, verifies it, then fans the event out to
//! every configured relay at once. The attempt resolves as soon as any relay
//! acknowledges; it only fails when every relay has failed or timed out.
//! Deliveries still running after the first acknowledgment are drained in the
//! background so slow relays still receive the note.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use nostr_sdk::{Event, EventId, ToBech32};
use tracing::{debug, info, warn};

use crate::error::{GmcastError, PublishError, RelayError, Result};
use crate::event::{verify_event, EventSigner, NoteDraft};
use crate::transport::RelayTransport;

/// Per-relay timeout used when none is configured
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a successful attempt
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub event_id: EventId,
    /// Bech32 `note1…` form of the event id
    pub note_id: String,
    pub content: String,
    /// Relay that acknowledged first
    pub accepted_by: String,
    /// Relays that had already failed when the first acknowledgment arrived
    pub failed: Vec<RelayError>,
}

type Delivery = BoxFuture<'static, (String, std::result::Result<(), RelayError>)>;

pub struct Publisher {
    signer: Arc<dyn EventSigner>,
    transport: Arc<dyn RelayTransport>,
    relays: Vec<String>,
    relay_timeout: Duration,
    verify_before_send: bool,
}

impl Publisher {
    pub fn new(
        signer: Arc<dyn EventSigner>,
        transport: Arc<dyn RelayTransport>,
        relays: Vec<String>,
    ) -> Self {
        Self {
            signer,
            transport,
            relays,
            relay_timeout: DEFAULT_RELAY_TIMEOUT,
            verify_before_send: true,
        }
    }

    pub fn with_relay_timeout(mut self, timeout: Duration) -> Self {
        self.relay_timeout = timeout;
        self
    }

    /// Skip the integrity check between signing and sending
    pub fn without_verification(mut self) -> Self {
        self.verify_before_send = false;
        self
    }

    pub fn relays(&self) -> &[String] {
        &self.relays
    }

    /// Sign `content` as of `now` and broadcast it
    ///
    /// # Errors
    ///
    /// - `EventError::Signing` / `EventError::Verification`: nothing was sent
    /// - `PublishError::NoRelays`: no destinations configured
    /// - `PublishError::AllRelaysFailed`: every relay failed or timed out
    pub async fn publish(&self, content: &str, now: DateTime<Utc>) -> Result<PublishReceipt> {
        if self.relays.is_empty() {
            return Err(PublishError::NoRelays.into());
        }

        let draft = NoteDraft::new(content, now)?;
        let event = self.signer.sign(&draft)?;

        if self.verify_before_send {
            verify_event(&event)?;
        }

        let note_id = event
            .id
            .to_bech32()
            .unwrap_or_else(|_| event.id.to_hex());

        info!(
            note = %note_id,
            relays = self.relays.len(),
            transport = self.transport.name(),
            "Publishing note"
        );

        let mut pending: FuturesUnordered<Delivery> = self
            .relays
            .iter()
            .map(|relay| self.delivery(relay.clone(), event.clone()))
            .collect();

        let mut failed = Vec::new();

        while let Some((relay, result)) = pending.next().await {
            match result {
                Ok(()) => {
                    info!(note = %note_id, relay = %relay, "Relay accepted note");

                    if !pending.is_empty() {
                        tokio::spawn(drain_remaining(pending, note_id.clone()));
                    }

                    return Ok(PublishReceipt {
                        event_id: event.id,
                        note_id,
                        content: content.to_string(),
                        accepted_by: relay,
                        failed,
                    });
                }
                Err(e) => {
                    warn!(note = %note_id, relay = %relay, "Delivery failed: {}", e);
                    failed.push(e);
                }
            }
        }

        Err(PublishError::AllRelaysFailed(failed).into())
    }

    fn delivery(&self, relay: String, event: Event) -> Delivery {
        let transport = Arc::clone(&self.transport);
        let timeout = self.relay_timeout;

        async move {
            let result = match tokio::time::timeout(timeout, transport.deliver(&relay, &event)).await
            {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(into_relay_error(&relay, e)),
                Err(_) => Err(RelayError::Timeout {
                    relay: relay.clone(),
                    after: timeout,
                }),
            };
            (relay, result)
        }
        .boxed()
    }
}

fn into_relay_error(relay: &str, error: GmcastError) -> RelayError {
    match error {
        GmcastError::Relay(e) => e,
        other => RelayError::Rejected {
            relay: relay.to_string(),
            reason: other.to_string(),
        },
    }
}

async fn drain_remaining(mut pending: FuturesUnordered<Delivery>, note_id: String) {
    while let Some((relay, result)) = pending.next().await {
        match result {
            Ok(()) => debug!(note = %note_id, relay = %relay, "Relay accepted note"),
            Err(e) => debug!(note = %note_id, relay = %relay, "Late delivery failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EventError;
    use crate::identity::Identity;
    use crate::transport::mock::{MockRelay, MockTransport};
    use nostr_sdk::{Keys, PublicKey};

    fn relays(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| format!("wss://{}.example", n)).collect()
    }

    fn publisher(transport: MockTransport, relay_names: &[&str]) -> Publisher {
        Publisher::new(
            Arc::new(Identity::from_keys(Keys::generate())),
            Arc::new(transport),
            relays(relay_names),
        )
    }

    struct FailingSigner;

    impl EventSigner for FailingSigner {
        fn public_key(&self) -> PublicKey {
            Keys::generate().public_key()
        }

        fn sign(&self, _draft: &NoteDraft) -> Result<Event> {
            Err(EventError::Signing("hardware key unplugged".to_string()).into())
        }
    }

    /// Signs correctly, then swaps the content so the id no longer matches
    struct TamperingSigner(Identity);

    impl EventSigner for TamperingSigner {
        fn public_key(&self) -> PublicKey {
            self.0.public_key()
        }

        fn sign(&self, draft: &NoteDraft) -> Result<Event> {
            let event = self.0.sign(draft)?;
            let mut json = serde_json::to_value(&event).unwrap();
            json["content"] = serde_json::Value::String("tampered".to_string());
            Ok(serde_json::from_value(json).unwrap())
        }
    }

    #[tokio::test]
    async fn test_publish_succeeds_when_all_accept() {
        let transport = MockTransport::accepting();
        let publisher = publisher(transport.clone(), &["a"]);

        let receipt = publisher.publish("GM", Utc::now()).await.unwrap();

        assert_eq!(receipt.accepted_by, "wss://a.example");
        assert_eq!(receipt.content, "GM");
        assert!(receipt.note_id.starts_with("note1"));
        assert!(receipt.failed.is_empty());
        assert_eq!(transport.deliveries()[0].event_id, receipt.event_id);
    }

    #[tokio::test]
    async fn test_publish_tolerates_partial_failure() {
        let transport = MockTransport::new()
            .with_relay("wss://a.example", MockRelay::Reject("blocked".to_string()))
            .with_relay("wss://b.example", MockRelay::Unreachable("dns".to_string()))
            .with_relay("wss://c.example", MockRelay::Accept(Duration::from_millis(20)));
        let publisher = publisher(transport.clone(), &["a", "b", "c"]);

        let receipt = publisher.publish("GM", Utc::now()).await.unwrap();

        assert_eq!(receipt.accepted_by, "wss://c.example");
        assert_eq!(receipt.failed.len(), 2);
        assert_eq!(transport.attempt_count(), 3);
    }

    #[tokio::test]
    async fn test_publish_fails_when_every_relay_fails() {
        let transport = MockTransport::rejecting("rate limited");
        let publisher = publisher(transport.clone(), &["a", "b", "c"]);

        let err = publisher.publish("GM", Utc::now()).await.unwrap_err();

        match err {
            GmcastError::Publish(PublishError::AllRelaysFailed(failures)) => {
                assert_eq!(failures.len(), 3);
                let mut failed: Vec<&str> = failures.iter().map(|f| f.relay()).collect();
                failed.sort();
                assert_eq!(failed, vec!["wss://a.example", "wss://b.example", "wss://c.example"]);
            }
            other => panic!("Expected AllRelaysFailed, got {:?}", other),
        }
        assert!(transport.deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_first_acknowledgment_wins() {
        let transport = MockTransport::new()
            .with_relay("wss://slow.example", MockRelay::Accept(Duration::from_millis(300)))
            .with_relay("wss://fast.example", MockRelay::Accept(Duration::ZERO));
        let publisher = publisher(transport.clone(), &["slow", "fast"]);

        let receipt = publisher.publish("GM", Utc::now()).await.unwrap();
        assert_eq!(receipt.accepted_by, "wss://fast.example");

        // The slow relay still gets the note once it answers
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(transport.deliveries().len(), 2);
    }

    #[tokio::test]
    async fn test_hanging_relay_is_bounded_by_timeout() {
        let transport = MockTransport::new().with_relay("wss://hang.example", MockRelay::Hang);
        let publisher =
            publisher(transport, &["hang"]).with_relay_timeout(Duration::from_millis(50));

        let started = std::time::Instant::now();
        let err = publisher.publish("GM", Utc::now()).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        match err {
            GmcastError::Publish(PublishError::AllRelaysFailed(failures)) => {
                assert!(matches!(failures[0], RelayError::Timeout { .. }));
            }
            other => panic!("Expected timeout failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timed_out_delivery_releases_connection() {
        let transport = MockTransport::new()
            .with_relay("wss://slow.example", MockRelay::Accept(Duration::from_millis(500)))
            .with_relay("wss://hang.example", MockRelay::Hang);
        let publisher = publisher(transport.clone(), &["slow", "hang"])
            .with_relay_timeout(Duration::from_millis(50));

        let err = publisher.publish("GM", Utc::now()).await.unwrap_err();

        assert!(matches!(
            err,
            GmcastError::Publish(PublishError::AllRelaysFailed(_))
        ));
        assert_eq!(transport.attempt_count(), 2);
        assert_eq!(transport.released_count(), transport.attempt_count());
        assert!(transport.deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_hanging_relay_does_not_block_success() {
        let transport = MockTransport::new()
            .with_relay("wss://hang.example", MockRelay::Hang)
            .with_relay("wss://ok.example", MockRelay::Accept(Duration::ZERO));
        let publisher = publisher(transport, &["hang", "ok"]).with_relay_timeout(Duration::from_secs(30));

        let receipt = tokio::time::timeout(Duration::from_secs(5), publisher.publish("GM", Utc::now()))
            .await
            .expect("publish should resolve on first acknowledgment")
            .unwrap();
        assert_eq!(receipt.accepted_by, "wss://ok.example");
    }

    #[tokio::test]
    async fn test_signing_failure_aborts_before_transmission() {
        let transport = MockTransport::accepting();
        let publisher = Publisher::new(
            Arc::new(FailingSigner),
            Arc::new(transport.clone()),
            relays(&["a"]),
        );

        let err = publisher.publish("GM", Utc::now()).await.unwrap_err();

        assert!(matches!(err, GmcastError::Event(EventError::Signing(_))));
        assert_eq!(transport.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_verification_failure_aborts_before_transmission() {
        let transport = MockTransport::accepting();
        let publisher = Publisher::new(
            Arc::new(TamperingSigner(Identity::from_keys(Keys::generate()))),
            Arc::new(transport.clone()),
            relays(&["a", "b"]),
        );

        let err = publisher.publish("GM", Utc::now()).await.unwrap_err();

        assert!(matches!(err, GmcastError::Event(EventError::Verification(_))));
        assert_eq!(transport.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_no_relays_configured() {
        let publisher = publisher(MockTransport::accepting(), &[]);
        let err = publisher.publish("GM", Utc::now()).await.unwrap_err();
        assert!(matches!(err, GmcastError::Publish(PublishError::NoRelays)));
    }
}
