//! Posting decision engine
//!
//! Pure functions only: whether a post is due, and which message variant the
//! calendar calls for. The caller supplies "now", so every rule here can be
//! checked against fixed dates.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};

use crate::types::Messages;

/// Minimum time between two scheduled posts
pub fn default_post_interval() -> Duration {
    Duration::days(2)
}

/// Logical state of the bot between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingState {
    AwaitingInterval,
    Due,
}

impl PostingState {
    pub fn evaluate(
        now: DateTime<Utc>,
        last_post: Option<DateTime<Utc>>,
        minimum_interval: Duration,
    ) -> Self {
        if is_due(now, last_post, minimum_interval) {
            PostingState::Due
        } else {
            PostingState::AwaitingInterval
        }
    }
}

/// Whether `minimum_interval` has elapsed since `last_post`
///
/// Without a baseline nothing is due. Elapsed time is the difference between
/// the two instants in milliseconds, so month and year boundaries need no
/// special handling. A clock that went backwards never makes a post due.
pub fn is_due(
    now: DateTime<Utc>,
    last_post: Option<DateTime<Utc>>,
    minimum_interval: Duration,
) -> bool {
    let Some(last_post) = last_post else {
        return false;
    };

    let elapsed_ms = now.timestamp_millis() - last_post.timestamp_millis();
    elapsed_ms >= 0 && elapsed_ms >= minimum_interval.num_milliseconds()
}

/// Saturday or Sunday in the timezone of `date`
pub fn is_weekend<Tz: TimeZone>(date: &DateTime<Tz>) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn select_message<'a, Tz: TimeZone>(now: &DateTime<Tz>, messages: &'a Messages) -> &'a str {
    if is_weekend(now) {
        &messages.weekend
    } else {
        &messages.weekday
    }
}
