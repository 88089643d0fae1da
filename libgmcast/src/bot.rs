//! Bot state and tick handling
//!
//! `Bot` owns everything that changes while the process runs: the last-post
//! high-water mark, the history of successful posts and the in-flight guard.
//! The scheduler calls [`Bot::handle_tick`]; the status page reads a snapshot
//! of [`BotState`]. Every entry point takes `now` from the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::decision::{select_message, PostingState};
use crate::publisher::Publisher;
use crate::types::{Messages, PostRecord, TickOutcome, DEBUG_TEST_MESSAGE};

/// State shared with the status page
#[derive(Debug, Clone)]
pub struct BotState {
    pub started_at: DateTime<Utc>,
    pub last_post: Option<DateTime<Utc>>,
    /// Successful posts, oldest first
    pub history: Vec<PostRecord>,
}

pub type SharedState = Arc<RwLock<BotState>>;

/// How ticks are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// Post the calendar message once the interval has elapsed
    Regular,
    /// Post the test message on every tick
    Debug,
}

pub struct BotSettings {
    pub messages: Messages,
    pub minimum_interval: Duration,
    pub mode: TickMode,
    /// Baseline from configuration
    pub last_post_seed: Option<DateTime<Utc>>,
    /// Leave the baseline unset because a startup post will establish it
    pub post_at_startup: bool,
}

pub struct Bot {
    publisher: Publisher,
    messages: Messages,
    minimum_interval: Duration,
    mode: TickMode,
    state: SharedState,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the attempt ends, however it ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Bot {
    pub fn new(publisher: Publisher, settings: BotSettings, now: DateTime<Utc>) -> Self {
        // Without a seed the first check establishes the baseline
        let last_post = match settings.last_post_seed {
            Some(seed) => Some(seed),
            None if settings.post_at_startup => None,
            None => Some(now),
        };

        Self {
            publisher,
            messages: settings.messages,
            minimum_interval: settings.minimum_interval,
            mode: settings.mode,
            state: Arc::new(RwLock::new(BotState {
                started_at: now,
                last_post,
                history: Vec::new(),
            })),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    pub fn mode(&self) -> TickMode {
        self.mode
    }

    pub fn relays(&self) -> &[String] {
        self.publisher.relays()
    }

    pub async fn last_post(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_post
    }

    pub async fn history(&self) -> Vec<PostRecord> {
        self.state.read().await.history.clone()
    }

    /// Message for the local calendar day of `now`
    pub fn message_for(&self, now: DateTime<Utc>) -> &str {
        select_message(&now.with_timezone(&Local), &self.messages)
    }

    /// Scheduler entry point
    pub async fn handle_tick(&self, now: DateTime<Utc>) -> TickOutcome {
        match self.mode {
            TickMode::Regular => self.tick(now).await,
            TickMode::Debug => self.post_now(now, DEBUG_TEST_MESSAGE).await,
        }
    }

    /// Post the calendar message if the interval has elapsed
    pub async fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Previous attempt still in flight, skipping tick");
            return TickOutcome::Busy;
        };

        let last_post = {
            let mut state = self.state.write().await;
            if state.last_post.is_none() {
                // The first check establishes the baseline
                state.last_post = Some(now);
                debug!(baseline = %now, "No previous post, baseline set");
                return TickOutcome::NotDue;
            }
            state.last_post
        };

        match PostingState::evaluate(now, last_post, self.minimum_interval) {
            PostingState::AwaitingInterval => {
                debug!(?last_post, "Not due yet");
                TickOutcome::NotDue
            }
            PostingState::Due => {
                // A successful attempt moves the bot back to AwaitingInterval
                let content = self.message_for(now).to_string();
                self.attempt(now, &content).await
            }
        }
    }

    /// Post `content` regardless of the interval
    pub async fn post_now(&self, now: DateTime<Utc>, content: &str) -> TickOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Previous attempt still in flight, skipping post");
            return TickOutcome::Busy;
        };

        self.attempt(now, content).await
    }

    /// Post the calendar message immediately, used at startup
    pub async fn post_scheduled_message_now(&self, now: DateTime<Utc>) -> TickOutcome {
        let content = self.message_for(now).to_string();
        self.post_now(now, &content).await
    }

    async fn attempt(&self, now: DateTime<Utc>, content: &str) -> TickOutcome {
        match self.publisher.publish(content, now).await {
            Ok(receipt) => {
                let record = PostRecord {
                    posted_at: now,
                    content: receipt.content,
                    event_id: receipt.note_id,
                    accepted_by: receipt.accepted_by,
                };

                let mut state = self.state.write().await;
                // High-water mark never moves backwards
                state.last_post = Some(state.last_post.map_or(now, |last| last.max(now)));
                state.history.push(record.clone());
                drop(state);

                info!(note = %record.event_id, content = %record.content, "Posted");
                TickOutcome::Posted(record)
            }
            Err(e) => {
                error!("Publish attempt failed: {}", e);
                TickOutcome::Failed(e)
            }
        }
    }
}
