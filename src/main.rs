//! rapidfire: repeats a mouse click or key press at a configurable rate
//!
//! Provides:
//! - An action engine that clicks or taps a key on a dedicated thread,
//!   at a configured rate with optional jitter
//! - Global hotkey detection: the toggle key starts/stops the engine,
//!   Escape exits, and a capture mode rebinds the toggle key
//! - A flat JSON settings file restored at startup
//! - A console front end for commands and statistics

mod config;
mod console;
mod engine;
mod events;
mod hotkey;
mod input;
mod lifecycle;
mod settings;
mod state;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::console::{spawn_stdin_reader, Console};
use crate::engine::ActionEngine;
use crate::events::ClickerEvent;
use crate::hotkey::HotkeyListener;
use crate::input::{PointerTracker, RdevBackend};
use crate::lifecycle::ShutdownSignal;
use crate::settings::SettingsStore;
use crate::state::StateMachine;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "rapidfire starting");

    // Load configuration and persisted settings
    let config = Config::load()?;
    let store = SettingsStore::new(&config.settings_path);
    let settings = store.load();
    info!(?config.settings_path, "configuration loaded");

    let shutdown = ShutdownSignal::new();

    // Hotkey listener -> State machine
    let (hotkey_tx, hotkey_rx) = mpsc::channel(64);
    // Console -> State machine
    let (command_tx, command_rx) = mpsc::channel(16);
    // Engine and state machine -> Console
    let (event_tx, _event_rx) = broadcast::channel::<ClickerEvent>(256);

    let pointer = PointerTracker::new();
    let backend = Arc::new(RdevBackend::new(pointer.clone()));
    let engine = Arc::new(ActionEngine::new(backend, event_tx.clone()));
    let mut state_machine = StateMachine::new(engine, store, settings, event_tx.clone());

    // Start the hotkey listener (runs on dedicated thread)
    let hotkey_listener = HotkeyListener::new(hotkey_tx, pointer);
    match hotkey_listener.start() {
        Ok(()) => {
            info!(
                toggle_key = state_machine.binding().name(),
                "hotkey listener started, press the toggle key to start/stop, ESC to exit"
            );
        }
        Err(e) => {
            error!(?e, "failed to start hotkey listener");
            warn!("continuing without hotkey support, use console commands");
        }
    }

    let mut console = Console::new(command_tx, event_tx.subscribe());

    info!("initialized, entering main loop");

    tokio::select! {
        reason = state_machine.run(hotkey_rx, command_rx) => {
            info!(?reason, "state machine exited");
        }

        result = console.run(spawn_stdin_reader(), tokio::io::stdout()) => {
            if let Err(e) = result {
                error!(?e, "console error");
            }
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    state_machine.shutdown();
    hotkey_listener.stop();

    info!("rapidfire stopped");

    Ok(())
}
