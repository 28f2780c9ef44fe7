//! autoclick-daemon: hotkey-toggled input automation
//!
//! This daemon runs in the background and provides:
//! - A global hotkey (learned interactively) that toggles automation
//! - Feature loops for clicking, chat commands and walking
//! - A watchdog that keeps the global key listener alive
//! - IPC server for a status/control UI

mod config;
mod events;
mod features;
mod hotkey;
mod input;
mod ipc;
mod lifecycle;
mod settings;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::StateEvent;
use crate::hotkey::{HotkeyCommand, HotkeyService};
use crate::ipc::{DaemonHandles, Server};
use crate::lifecycle::ShutdownSignal;
use crate::settings::{FileStore, SettingsHandle};
use crate::state::{AutomationOrchestrator, StatusBoard};

/// Pending toggles beyond this are dropped
const CONTROL_QUEUE: usize = 4;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "autoclick-daemon starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, ?config.settings_path, "configuration loaded");

    let backend = input::platform_backend().context("no usable input backend")?;

    let settings = SettingsHandle::load(Arc::new(FileStore::new(&config.settings_path)));
    let status = StatusBoard::new();
    let shutdown = ShutdownSignal::new();

    // Hotkey service -> orchestrator
    let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE);
    // Orchestrator / IPC -> hotkey service
    let (hotkey_tx, hotkey_rx) = mpsc::channel(16);
    // Everyone -> log and IPC subscribers
    let (event_tx, _) = broadcast::channel::<StateEvent>(64);

    let server = Server::new(
        &config.socket_path,
        DaemonHandles {
            status: Arc::clone(&status),
            settings: settings.clone(),
            control: control_tx.clone(),
            hotkey: hotkey_tx.clone(),
            events: event_tx.clone(),
        },
    )?;

    let hotkey_service = HotkeyService::new(
        backend.keys,
        settings.clone(),
        Arc::clone(&status),
        control_tx,
        event_tx.clone(),
        config.listener,
    );
    let hotkey_task = tokio::spawn(hotkey_service.run(hotkey_rx));

    let orchestrator = AutomationOrchestrator::new(
        backend.output,
        settings,
        Arc::clone(&status),
        event_tx.clone(),
        hotkey_tx.clone(),
    );
    let stop_orchestrator = CancellationToken::new();
    let orchestrator_task = tokio::spawn(orchestrator.run(control_rx, stop_orchestrator.clone()));

    let mut event_rx = event_tx.subscribe();

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Log state events
        _ = async {
            loop {
                match event_rx.recv().await {
                    Ok(event) => info!(%event, "state event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "state event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("state event handler exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup: force Idle first, then stop the listener and watchdog
    info!("shutting down...");

    stop_orchestrator.cancel();
    if let Err(e) = orchestrator_task.await {
        error!(?e, "orchestrator task failed");
    }

    if hotkey_tx.send(HotkeyCommand::Shutdown).await.is_err() {
        warn!("hotkey service already stopped");
    }
    if let Err(e) = hotkey_task.await {
        error!(?e, "hotkey task failed");
    }

    server.shutdown();

    info!("autoclick-daemon stopped");

    Ok(())
}
