//! gm-send - Scheduled posting daemon for Nostr
//!
//! Posts the weekday or weekend message once the configured interval has
//! passed and serves a small status page while it runs.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use libgmcast::error::ConfigError;
use libgmcast::identity::encode_npub;
use libgmcast::logging::LoggingConfig;
use libgmcast::scheduler::{self, debug_tick};
use libgmcast::status::{self, StatusPage};
use libgmcast::transport::nostr::NostrTransport;
use libgmcast::{
    Bot, BotSettings, Config, GmcastError, Identity, Publisher, Result, Schedule, TickMode,
    TickOutcome,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "gm-send")]
#[command(version)]
#[command(about = "Scheduled posting daemon for Nostr")]
#[command(long_about = "\
gm-send - Scheduled posting daemon for Nostr

DESCRIPTION:
    gm-send holds a Nostr keypair and posts a short greeting once the
    posting interval (default: 2 days) has elapsed. Weekdays get the
    weekday message, Saturdays and Sundays the weekend message.

    The note is signed locally and sent to every configured relay. One
    relay accepting it is enough. A status page is served on PORT.

USAGE:
    # Run in foreground (logs to stderr)
    gm-send

    # Load settings from a specific file
    gm-send --env-file /etc/gmcast.env

    # Post the scheduled message right now and exit
    gm-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown

CONFIGURATION:
    Settings are read from the environment, after loading .env if present.

    PRIVATE_KEY_NSEC     Bot secret key, nsec or hex (required)
    AUTHOR_NPUB          Author shown on the status page
    RELAYS               Comma-separated relay URLs
    PORT                 Status page port (default: 8080)
    DEBUG                Post a test message every 30 seconds
    POST_AT_STARTUP      Post immediately on startup
    LAST_POST_TIMESTAMP  When the last post happened (unix or RFC 3339)
    SCHEDULE             hourly | every <duration> | daily HH:MM
    POST_INTERVAL        Minimum time between posts (default: 2days)
    RELAY_TIMEOUT        Per-relay deadline (default: 10s)
    WEEKDAY_MESSAGE      Message for Monday to Friday
    WEEKEND_MESSAGE      Message for Saturday and Sunday
    LOG_FORMAT           text | json | pretty
    LOG_LEVEL            Default log level (default: info)

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Load settings from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Post the scheduled message once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    load_env_file(cli.env_file.as_deref())?;

    let config = Config::from_env()?;

    // A subscriber may already be installed when embedded; keep going
    if let Err(e) = LoggingConfig::from_settings(&config.logging, cli.verbose).init() {
        eprintln!("Warning: logging not initialised: {}", e);
    }

    let identity = Identity::from_secret(&config.secret_key)?;
    let bot_npub = identity.npub().to_string();
    let author_npub = config.author.as_ref().map(encode_npub);

    info!(npub = %bot_npub, relays = config.relays.len(), "gm-send starting");
    if config.debug {
        warn!("Debug mode: posting a test message every {}s", debug_tick().num_seconds());
    }

    let transport = NostrTransport::new(config.relay_timeout);
    let publisher = Publisher::new(
        Arc::new(identity),
        Arc::new(transport),
        config.relays.clone(),
    )
    .with_relay_timeout(config.relay_timeout);

    let bot = Arc::new(Bot::new(
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
        Utc::now(),
    ));

    if cli.once {
        return match bot.post_scheduled_message_now(Utc::now()).await {
            TickOutcome::Failed(e) => Err(e),
            outcome => {
                info!(?outcome, "gm-send: posted once, exiting");
                Ok(())
            }
        };
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    setup_signal_handlers(shutdown_tx)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Status page listening on http://{}", listener.local_addr()?);

    let page = StatusPage {
        bot_npub,
        author_npub,
        relays: bot.relays().to_vec(),
        state: bot.state(),
    };
    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(status::serve(listener, page, async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    }));

    // The status page is already up while this waits on relays
    if config.post_at_startup {
        info!("Posting at startup");
        if let TickOutcome::Failed(e) = bot.post_scheduled_message_now(Utc::now()).await {
            warn!("Startup post failed, the scheduler will retry: {}", e);
        }
    }

    let schedule = if config.debug {
        Schedule::Every(debug_tick())
    } else {
        config.schedule
    };
    scheduler::run(Arc::clone(&bot), schedule, shutdown_rx).await;

    match server.await {
        Ok(result) => result?,
        Err(e) => error!("Status page task failed: {}", e),
    }

    info!("gm-send stopped");
    Ok(())
}

/// Load `path`, or `./.env` when no path is given
///
/// Variables already present in the environment win over the file.
fn load_env_file(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| {
                GmcastError::Config(ConfigError::invalid(
                    "--env-file",
                    format!("{}: {}", path.display(), e),
                ))
            })?;
        }
        None => {
            // A missing .env is the normal case in containers
            let _ = dotenvy::dotenv();
        }
    }
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: watch::Sender<bool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "Received shutdown signal, stopping gracefully...");
            let _ = shutdown.send(true);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: watch::Sender<bool>) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping gracefully...");
            let _ = shutdown.send(true);
        }
    });
    Ok(())
}
