//! gmcast - a scheduled posting bot for Nostr
//!
//! This library holds everything the `gm-send` daemon needs: configuration,
//! identity, signing, relay transport, the posting decision, the publish
//! fan-out, the scheduler loop and the status page.

pub mod bot;
pub mod config;
pub mod decision;
pub mod error;
pub mod event;
pub mod identity;
pub mod logging;
pub mod publisher;
pub mod scheduler;
pub mod status;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use bot::{Bot, BotSettings, BotState, TickMode};
pub use config::Config;
pub use error::{GmcastError, Result};
pub use identity::Identity;
pub use publisher::{PublishReceipt, Publisher};
pub use scheduler::Schedule;
pub use types::{Messages, PostRecord, TickOutcome};
