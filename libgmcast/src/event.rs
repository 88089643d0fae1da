//! Note drafting, signing and verification

use chrono::{DateTime, Utc};
use nostr_sdk::{Event, EventBuilder, Kind, PublicKey, Timestamp};

use crate::error::{EventError, Result};
use crate::identity::Identity;

/// Unsigned short text note (kind 1, no tags)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub content: String,
    pub created_at: Timestamp,
}

impl NoteDraft {
    /// # Errors
    ///
    /// Returns `EventError::Signing` when `now` predates the unix epoch.
    pub fn new(content: impl Into<String>, now: DateTime<Utc>) -> Result<Self> {
        let secs = u64::try_from(now.timestamp()).map_err(|_| {
            EventError::Signing(format!("timestamp {} is before the unix epoch", now))
        })?;
        Ok(Self {
            content: content.into(),
            created_at: Timestamp::from(secs),
        })
    }

    pub fn kind(&self) -> Kind {
        Kind::TextNote
    }
}

/// Turns a draft into a signed, content-addressed event
pub trait EventSigner: Send + Sync {
    fn public_key(&self) -> PublicKey;

    fn sign(&self, draft: &NoteDraft) -> Result<Event>;
}

impl EventSigner for Identity {
    fn public_key(&self) -> PublicKey {
        Identity::public_key(self)
    }

    fn sign(&self, draft: &NoteDraft) -> Result<Event> {
        let event = EventBuilder::new(draft.kind(), &draft.content, [])
            .custom_created_at(draft.created_at)
            .to_event(self.keys())
            .map_err(|e| EventError::Signing(e.to_string()))?;
        Ok(event)
    }
}

/// Check the event id and signature
pub fn verify_event(event: &Event) -> Result<()> {
    event
        .verify()
        .map_err(|e| EventError::Verification(format!("event {}: {}", event.id.to_hex(), e)))?;
    Ok(())
}
