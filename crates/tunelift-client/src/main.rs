mod alert;
mod auth_flow;
mod auth_poller;
mod backend;
mod console;
mod context;
mod core;
mod event;
mod migration;
mod notify;
mod playlists;
mod requests;
mod signals;
mod surface;
mod theme;
mod timers;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tunelift_proto::config::Config;
use tunelift_proto::platform;
use tunelift_proto::prefs::PrefsStore;

use crate::backend::HttpBackend;
use crate::event::{Command, Event};
use crate::surface::BrowserSurface;

/// Move a Spotify playlist to YouTube Music through the tunelift backend.
#[derive(Parser, Debug)]
#[command(name = "tunelift", version)]
struct Args {
    /// Backend base URL (overrides the config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Don't start the local auth notification listener
    #[arg(long)]
    no_notify: bool,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("tunelift.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; keep HTTP client internals quiet by default.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("tunelift log: {}", log_path.display());
    tracing::info!("tunelift starting");

    // ── Load config ──────────────────────────────────────────────────────────
    let loaded = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Config not loaded, using defaults: {}", e);
        Config::default()
    });
    if let Some(url) = args.base_url {
        config.backend.base_url = url;
    }
    if args.no_notify {
        config.notify.enabled = false;
    }
    tracing::info!("backend: {}", config.backend.base_url);

    let prefs = PrefsStore::open(PrefsStore::default_path());

    // ── Event channel (timers/requests/notify/console → Orchestrator) ───────
    let (event_tx, event_rx) = mpsc::channel::<Event>(1024);

    // ── Build Orchestrator ───────────────────────────────────────────────────
    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    // A configured opener is watched for window closing; the platform opener
    // detaches, so only the completion signal ends its flows.
    let surfaces = Box::new(match config.auth.opener.clone() {
        Some(opener) => BrowserSurface::new(opener),
        None => BrowserSurface::detached(platform::default_opener()),
    });
    let orchestrator = core::Orchestrator::new(&config, backend, surfaces, event_tx.clone());
    let views = orchestrator.views();

    // ── Notification listener ────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    let notify_task = if config.notify.enabled {
        Some(notify::start_server(
            config.notify.bind_address.clone(),
            config.notify.port,
            event_tx.clone(),
            shutdown.clone(),
        ))
    } else {
        None
    };

    // ── Ctrl-C → Quit ────────────────────────────────────────────────────────
    let quit_tx = event_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = quit_tx.send(Event::Command(Command::Quit)).await;
        }
    });

    // ── Console ──────────────────────────────────────────────────────────────
    let console_task = tokio::spawn(async move {
        if let Err(e) = console::run(event_tx, views, prefs).await {
            tracing::error!("Console exited with error: {}", e);
        }
    });

    // ── Run Orchestrator ─────────────────────────────────────────────────────
    let result = orchestrator.run(event_rx).await;

    shutdown.cancel();
    console_task.abort();
    if let Some(task) = notify_task {
        let _ = task.await;
    }
    tracing::info!("tunelift stopped");
    result
}
