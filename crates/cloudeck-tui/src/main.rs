mod action;
mod app;
mod app_state;
mod component;
mod components;
mod core;
mod mpv;
mod theme;
mod widgets;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use cloudeck_core::drive::FolderNode;
use cloudeck_core::protocol::Notice;
use cloudeck_core::state::PlayerSnapshot;

/// What the PlayerCore broadcasts to the UI.
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// Player state changed; carries the full snapshot.
    StateUpdated(Arc<PlayerSnapshot>),
    /// A user-facing notification.
    Notice(Notice),
    /// A remote folder listing arrived.
    FolderTree(Arc<FolderNode>),
    /// A remote folder fetch started (true) or finished (false).
    Browsing(bool),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = cloudeck_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("cloudeck.log");

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

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("cloudeck log: {}", log_path.display());

    tracing::info!("cloudeck starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match cloudeck_core::config::Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("config load failed, using defaults: {:#}", e);
            cloudeck_core::config::Config::default()
        }
    };

    // ── Broadcast channel (PlayerCore → TUI) ─────────────────────────────────
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<BroadcastMessage>(1024);

    // ── CoreEvent channel (TUI → PlayerCore) ─────────────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<core::CoreEvent>(1024);

    let player_core = core::PlayerCore::new(config.clone(), broadcast_tx, event_tx.clone());
    let core_task = tokio::spawn(async move {
        if let Err(e) = player_core.run(event_rx).await {
            tracing::error!("PlayerCore exited with error: {}", e);
        }
    });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(event_tx, &config);
    let result = app.run(broadcast_rx).await;

    // Give the core a moment to flush the pending session save.
    if tokio::time::timeout(Duration::from_secs(2), core_task)
        .await
        .is_err()
    {
        tracing::warn!("PlayerCore did not stop in time");
    }

    tracing::info!("cloudeck exiting");
    result
}
