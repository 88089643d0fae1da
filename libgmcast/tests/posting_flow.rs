//! End-to-end posting flow against the mock transport
//!
//! Wires configuration, identity, publisher and bot together the same way the
//! daemon does, then drives ticks with a fixed clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use libgmcast::transport::mock::{MockRelay, MockTransport};
use libgmcast::{Bot, BotSettings, Config, Identity, Publisher, TickMode, TickOutcome};
use nostr_sdk::{Keys, ToBech32};

fn config(extra: &[(&str, &str)]) -> Config {
    let mut values = HashMap::new();
    values.insert(
        "PRIVATE_KEY_NSEC".to_string(),
        Keys::generate().secret_key().to_bech32().unwrap(),
    );
    values.insert(
        "RELAYS".to_string(),
        "wss://a.example,wss://b.example,wss://c.example".to_string(),
    );
    for (key, value) in extra {
        values.insert(key.to_string(), value.to_string());
    }
    Config::from_map(&values).unwrap()
}

fn bot_from_config(config: &Config, transport: MockTransport, now: DateTime<Utc>) -> Bot {
    let identity = Identity::from_secret(&config.secret_key).unwrap();
    let publisher = Publisher::new(Arc::new(identity), Arc::new(transport), config.relays.clone())
        .with_relay_timeout(config.relay_timeout);

    Bot::new(
        publisher,
        BotSettings {
            messages: config.messages.clone(),
            minimum_interval: config.post_interval,
            mode: if config.debug {
                TickMode::Debug
            } else {
                TickMode::Regular
            },
            last_post_seed: config.last_post_seed,
            post_at_startup: config.post_at_startup,
        },
        now,
    )
}

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

#[tokio::test]
async fn test_hourly_ticks_post_every_two_days() {
    let start = at(2024, 1, 29, 12);
    let transport = MockTransport::accepting();
    let bot = bot_from_config(&config(&[]), transport.clone(), start);

    let mut posted_at = Vec::new();
    for hour in 1..=24 * 7 {
        let now = start + Duration::hours(hour);
        if let TickOutcome::Posted(record) = bot.tick(now).await {
            posted_at.push(record.posted_at);
        }
    }

    // Crossing the January/February boundary does not disturb the cadence
    assert_eq!(
        posted_at,
        vec![at(2024, 1, 31, 12), at(2024, 2, 2, 12), at(2024, 2, 4, 12)]
    );
    assert_eq!(bot.history().await.len(), 3);
}

#[tokio::test]
async fn test_seeded_timestamp_drives_first_post() {
    let seed = at(2024, 3, 1, 8);
    let cfg = config(&[("LAST_POST_TIMESTAMP", &seed.timestamp().to_string())]);
    let bot = bot_from_config(&cfg, MockTransport::accepting(), at(2024, 3, 2, 12));

    assert!(matches!(bot.tick(at(2024, 3, 3, 7)).await, TickOutcome::NotDue));
    assert!(bot.tick(at(2024, 3, 3, 8)).await.is_posted());
}

#[tokio::test]
async fn test_startup_post_with_unset_timestamp() {
    let start = at(2024, 6, 8, 9); // Saturday
    let cfg = config(&[("POST_AT_STARTUP", "true")]);
    let transport = MockTransport::accepting();
    let bot = bot_from_config(&cfg, transport.clone(), start);

    assert_eq!(bot.last_post().await, None);

    let outcome = bot.post_scheduled_message_now(start).await;
    let expected = bot.message_for(start).to_string();

    match outcome {
        TickOutcome::Posted(record) => assert_eq!(record.content, expected),
        other => panic!("Expected Posted, got {:?}", other),
    }
    assert_eq!(bot.last_post().await, Some(start));
    assert!(transport.deliveries().iter().all(|d| d.content == expected));
}

#[tokio::test]
async fn test_outage_then_recovery() {
    let start = at(2024, 4, 1, 12);
    let transport = MockTransport::new()
        .with_relay("wss://a.example", MockRelay::Unreachable("down".to_string()))
        .with_relay("wss://b.example", MockRelay::Reject("down".to_string()))
        .with_relay("wss://c.example", MockRelay::Hang);
    let cfg = config(&[("RELAY_TIMEOUT", "100ms")]);
    let bot = bot_from_config(&cfg, transport, start);
    let due = start + Duration::days(2);

    let outcome = bot.tick(due).await;
    assert!(matches!(outcome, TickOutcome::Failed(_)));
    assert_eq!(bot.last_post().await, Some(start));
    assert!(bot.history().await.is_empty());
}

#[tokio::test]
async fn test_one_relay_up_is_enough() {
    let start = at(2024, 4, 1, 12);
    let transport = MockTransport::new()
        .with_relay("wss://a.example", MockRelay::Unreachable("down".to_string()))
        .with_relay("wss://b.example", MockRelay::Hang)
        .with_relay("wss://c.example", MockRelay::Accept(StdDuration::from_millis(10)));
    let cfg = config(&[("RELAY_TIMEOUT", "2s")]);
    let bot = bot_from_config(&cfg, transport.clone(), start);
    let due = start + Duration::days(2);

    let outcome = bot.tick(due).await;

    match outcome {
        TickOutcome::Posted(record) => assert_eq!(record.accepted_by, "wss://c.example"),
        other => panic!("Expected Posted, got {:?}", other),
    }
    assert_eq!(bot.history().await.len(), 1);
    assert_eq!(bot.last_post().await, Some(due));
}

#[tokio::test]
async fn test_debug_mode_ignores_interval() {
    let start = at(2024, 4, 1, 12);
    let cfg = config(&[("DEBUG", "yes")]);
    let bot = bot_from_config(&cfg, MockTransport::accepting(), start);

    for i in 1..=4 {
        let outcome = bot.handle_tick(start + Duration::seconds(30 * i)).await;
        assert!(outcome.is_posted());
    }
    assert_eq!(bot.history().await.len(), 4);
}
