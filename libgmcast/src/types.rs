//! Core types for gmcast

use chrono::{DateTime, Utc};

/// Message posted on Monday through Friday
pub const DEFAULT_WEEKDAY_MESSAGE: &str = "GM fiatjaf";
/// Message posted on Saturday and Sunday
pub const DEFAULT_WEEKEND_MESSAGE: &str = "gfy fiatjaf";
/// Message posted on every debug tick
pub const DEBUG_TEST_MESSAGE: &str = "gmcast test message";

/// A successful publish, as shown on the status page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub posted_at: DateTime<Utc>,
    pub content: String,
    /// `note1…` id of the signed event
    pub event_id: String,
    /// Relay that acknowledged first
    pub accepted_by: String,
}

/// The two calendar variants of the scheduled message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages {
    pub weekday: String,
    pub weekend: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            weekday: DEFAULT_WEEKDAY_MESSAGE.to_string(),
            weekend: DEFAULT_WEEKEND_MESSAGE.to_string(),
        }
    }
}

/// What a single tick did
#[derive(Debug)]
pub enum TickOutcome {
    /// Interval has not elapsed yet
    NotDue,
    /// Another attempt is still in flight
    Busy,
    Posted(PostRecord),
    Failed(crate::GmcastError),
}

impl TickOutcome {
    pub fn is_posted(&self) -> bool {
        matches!(self, TickOutcome::Posted(_))
    }
}
