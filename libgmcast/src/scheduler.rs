//! Tick rules and the scheduler loop
//!
//! A [`Schedule`] answers one question: when is the next tick after a given
//! instant. [`run`] sleeps until that instant, hands the tick to the bot and
//! repeats until shutdown is signalled.
//!
//! Supported rules:
//! - `hourly`
//! - `every <duration>` with humantime durations: `every 30m`, `every 2h 30m`
//! - `daily HH:MM` in local time: `daily 12:00`

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::bot::Bot;
use crate::error::ConfigError;
use crate::types::TickOutcome;

/// Tick period in debug mode
pub fn debug_tick() -> Duration {
    Duration::seconds(30)
}

const MIN_PERIOD_SECONDS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Every(Duration),
    DailyAt(NaiveTime),
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::Every(Duration::hours(1))
    }
}

impl Schedule {
    /// First tick strictly after `after`
    pub fn next_fire<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> DateTime<Tz> {
        match self {
            Schedule::Every(period) => after.clone() + *period,
            Schedule::DailyAt(time) => {
                let tz = after.timezone();
                // A DST gap can swallow the local time for one day
                for offset in 0..3 {
                    let date = after.date_naive() + Duration::days(offset);
                    let candidate = date
                        .and_time(*time)
                        .and_local_timezone(tz.clone())
                        .earliest();
                    if let Some(fire) = candidate {
                        if fire > *after {
                            return fire;
                        }
                    }
                }
                after.clone() + Duration::days(1)
            }
        }
    }
}

impl FromStr for Schedule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim().to_lowercase();

        if input == "hourly" {
            return Ok(Schedule::default());
        }

        if let Some(period) = input.strip_prefix("every ") {
            let std_duration = humantime::parse_duration(period.trim())
                .map_err(|e| ConfigError::invalid("SCHEDULE", format!("{}: {}", period, e)))?;
            let period = Duration::from_std(std_duration)
                .map_err(|_| ConfigError::invalid("SCHEDULE", "period out of range"))?;
            if period.num_seconds() < MIN_PERIOD_SECONDS {
                return Err(ConfigError::invalid(
                    "SCHEDULE",
                    format!("period must be at least {} second", MIN_PERIOD_SECONDS),
                ));
            }
            return Ok(Schedule::Every(period));
        }

        if let Some(time) = input.strip_prefix("daily ") {
            let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
                .map_err(|e| ConfigError::invalid("SCHEDULE", format!("{}: {}", time, e)))?;
            return Ok(Schedule::DailyAt(time));
        }

        Err(ConfigError::invalid(
            "SCHEDULE",
            format!(
                "'{}' is not a schedule. Valid forms: hourly, every <duration>, daily HH:MM",
                s
            ),
        ))
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Every(period) => match period.to_std() {
                Ok(d) => write!(f, "every {}", humantime::format_duration(d)),
                Err(_) => write!(f, "every {}s", period.num_seconds()),
            },
            Schedule::DailyAt(time) => write!(f, "daily {}", time.format("%H:%M")),
        }
    }
}

/// Drive the bot until `shutdown` flips to `true`
pub async fn run(bot: Arc<Bot>, schedule: Schedule, mut shutdown: watch::Receiver<bool>) {
    info!(%schedule, mode = ?bot.mode(), "Scheduler started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let now = Local::now();
        let next = schedule.next_fire(&now);
        let wait = (next.clone() - now).to_std().unwrap_or_default();
        debug!(next = %next, "Waiting for next tick");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        match bot.handle_tick(Utc::now()).await {
            TickOutcome::Posted(record) => debug!(note = %record.event_id, "Tick posted"),
            TickOutcome::NotDue => debug!("Tick: not due"),
            TickOutcome::Busy => warn!("Tick skipped: previous attempt still running"),
            TickOutcome::Failed(e) => warn!("Tick failed, will retry on next tick: {}", e),
        }
    }

    info!("Scheduler stopped");
}
