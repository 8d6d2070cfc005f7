//! rsvpd — the RSVP intake daemon.
//!
//! Single binary that assembles the service:
//! - JSON record stores (responses, chat identities, reminder fence)
//! - Email and chat-channel collaborators
//! - Reminder scheduler
//! - HTTP API, landing page, static files
//!
//! # Usage
//!
//! ```text
//! rsvpd serve --config /etc/rsvp/rsvpd.toml --port 8080
//! rsvpd check --config /etc/rsvp/rsvpd.toml
//! ```
//!
//! Settings come from the TOML file (optional), then the environment
//! (`RESEND_API_KEY`, `RSVP_TO_EMAIL`, `WEDDING_DATE`, ...), then flags.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rsvp_api::{AppState, build_router};
use rsvp_core::ServiceConfig;
use rsvp_notify::{ChannelMessenger, Dispatcher, EmailSender, HttpsClient, ResendMailer, TelegramBot};
use rsvp_reminder::{ReminderScheduler, ReminderSettings};
use rsvp_state::{IdentityStore, ReminderSentStore, RsvpStore};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Per-request deadline for the email and chat providers.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

/// How long shutdown waits for detached notifications.
const DRAIN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "rsvpd", about = "RSVP intake daemon")]
struct Cli {
    /// TOML config file. Without one, defaults and the environment apply.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the API, landing page, and reminder loop.
    Serve {
        /// Port to listen on (overrides config and `PORT`).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate the configuration and read every store once.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rsvpd=debug,rsvp=debug")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ServiceConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(config).await
        }
        Command::Check => run_check(&config),
    }
}

// ── Stores ─────────────────────────────────────────────────────

struct Stores {
    rsvps: RsvpStore,
    identities: IdentityStore,
    sent: ReminderSentStore,
}

/// Open the three stores and read each once. A file that exists but does
/// not decode is fatal; it is never overwritten.
fn open_stores(config: &ServiceConfig) -> anyhow::Result<Stores> {
    let storage = &config.storage;
    let stores = Stores {
        rsvps: RsvpStore::open(storage.rsvp_path.clone()),
        identities: IdentityStore::open(storage.identity_path()),
        sent: ReminderSentStore::open(storage.reminder_sent_path()),
    };

    let rsvps = stores
        .rsvps
        .records()
        .verify()
        .with_context(|| format!("rsvp store {}", stores.rsvps.records().path().display()))?;
    let identities = stores
        .identities
        .records()
        .verify()
        .with_context(|| format!("identity store {}", stores.identities.records().path().display()))?;
    let sent = stores
        .sent
        .records()
        .verify()
        .with_context(|| format!("reminder store {}", stores.sent.records().path().display()))?;

    info!(rsvps, identities, reminded = sent, "stores opened");
    Ok(stores)
}

// ── check ──────────────────────────────────────────────────────

fn run_check(config: &ServiceConfig) -> anyhow::Result<()> {
    config.validate()?;
    open_stores(config)?;
    match config.event.parsed_date()? {
        Some(date) => info!(%date, days_before = config.reminder.days_before, "reminders enabled"),
        None => info!("no event date; reminders disabled"),
    }
    info!(channel = config.channel.enabled(), "configuration ok");
    Ok(())
}

// ── serve ──────────────────────────────────────────────────────

async fn run_server(config: ServiceConfig) -> anyhow::Result<()> {
    info!("rsvp daemon starting");
    config.validate()?;
    let event_date = config.event.parsed_date()?;

    // ── Initialize subsystems ──────────────────────────────────

    let stores = open_stores(&config)?;

    let client = HttpsClient::new(PROVIDER_TIMEOUT)?;
    let email: Arc<dyn EmailSender> = Arc::new(ResendMailer::new(
        client.clone(),
        config.email.api_base.as_str(),
        config.email.api_key.as_str(),
    ));

    let channel: Option<Arc<dyn ChannelMessenger>> = match config.channel.bot_token.as_deref() {
        Some(token) if config.channel.enabled() => {
            info!("chat channel enabled");
            Some(Arc::new(TelegramBot::new(client, &config.channel.api_base, token)) as Arc<dyn ChannelMessenger>)
        }
        _ => {
            info!("chat channel disabled");
            None
        }
    };

    let dispatcher = Dispatcher::new();

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Reminder loop ──────────────────────────────────────────

    let reminder_handle = match event_date {
        Some(date) => {
            let settings = ReminderSettings::from_config(date, config.email.from.as_str(), &config.reminder);
            let scheduler = ReminderScheduler::new(
                stores.rsvps.clone(),
                stores.sent.clone(),
                stores.identities.clone(),
                Arc::clone(&email),
                channel.clone(),
                settings,
            );
            info!(event = %date, trigger = %scheduler.trigger_date(), "reminder scheduler initialized");
            Some(tokio::spawn(async move {
                scheduler.run(shutdown_rx).await;
            }))
        }
        None => {
            info!("no event date; reminders disabled");
            None
        }
    };

    // ── HTTP server ────────────────────────────────────────────

    let state = AppState::new(
        &config,
        stores.rsvps,
        stores.identities,
        email,
        channel,
        dispatcher.clone(),
    );
    let router = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, static_dir = %config.server.static_dir.display(), "HTTP server starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    })
    .await?;

    // ── Clean up ───────────────────────────────────────────────

    if let Some(handle) = reminder_handle {
        let _ = handle.await;
    }
    let pending = dispatcher.in_flight();
    if !dispatcher.drain(DRAIN_GRACE).await {
        warn!(pending = dispatcher.in_flight(), "notifications still in flight at exit");
    } else if pending > 0 {
        info!(pending, "notifications drained");
    }

    info!("rsvp daemon stopped");
    Ok(())
}

/// Resolve on CTRL+C or, on unix, SIGTERM. A handler that cannot be
/// installed is logged and never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("CTRL+C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.storage.rsvp_path = dir.join("rsvps.json");
        config
    }

    #[test]
    fn serve_accepts_config_and_port() {
        let cli = Cli::try_parse_from(["rsvpd", "serve", "--config", "rsvpd.toml", "--port", "9090"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("rsvpd.toml")));
        assert!(matches!(cli.command, Command::Serve { port: Some(9090) }));

        let cli = Cli::try_parse_from(["rsvpd", "check"]).unwrap();
        assert!(cli.config.is_none());
        assert!(matches!(cli.command, Command::Check));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["rsvpd"]).is_err());
    }

    #[test]
    fn missing_store_files_open_empty() {
        let dir = tempfile::tempdir().unwrap();
        let stores = open_stores(&config_in(dir.path())).unwrap();
        assert!(stores.rsvps.list().unwrap().is_empty());
        assert!(!dir.path().join("rsvps.json").exists());
    }

    #[test]
    fn corrupt_store_is_fatal_and_named() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let identity_path = config.storage.identity_path();
        std::fs::write(&identity_path, "{ not a list").unwrap();

        let err = open_stores(&config).err().unwrap();
        let chain = format!("{err:#}");
        assert!(chain.contains(&identity_path.display().to_string()), "{chain}");
        assert_eq!(std::fs::read_to_string(&identity_path).unwrap(), "{ not a list");
    }

    #[test]
    fn check_requires_provider_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        assert!(run_check(&config).is_err());

        config.email.api_key = "re_test".to_string();
        config.email.organizer = "org@example.com".to_string();
        run_check(&config).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_triggers_shutdown() {
        use tokio::signal::unix::{SignalKind, signal};
        // Installs the process-wide handler, so SIGTERM never kills the test binary.
        let _installed = signal(SignalKind::terminate()).unwrap();

        let waiter = tokio::spawn(shutdown_signal());
        // Let the handler register before the signal is raised.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let pid = std::process::id().to_string();
        let status = std::process::Command::new("kill")
            .args(["-TERM", &pid])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("shutdown signal did not resolve")
            .unwrap();
    }
}
