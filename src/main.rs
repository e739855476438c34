//! hidwatch - HID scan listener daemon for Linux
//!
//! Watches keyboard-emulation input devices (barcode scanners, RFID
//! readers) via evdev, reconstructs the text typed on each device, and
//! relays completed scans when a trigger key fires.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             Device Registry                  │
//! │   enumerate /dev/input + periodic reconcile  │
//! ├──────────────────────────────────────────────┤
//! │  Watch Loop (per device)                     │
//! │     evdev stream → Decoder → buffer/flags    │
//! │                       ↓ trigger              │
//! │              ScanEvent → ScanHandler         │
//! │                  (HTTP relay / log)          │
//! └──────────────────────────────────────────────┘
//! ```

mod config;
mod constants;
mod event;
mod keymap;
mod listener;
mod relay;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};

use config::{default_config_path, Config};
use event::{LogHandler, ScanHandler};
use keymap::Keymap;
use listener::KeyboardListener;
use relay::HttpRelay;

/// All watch loops and the reconciliation task share one thread; per-device
/// decode state is only ever touched by its own task, so the whole daemon
/// runs without locks
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(default_config_path);
    let config = Config::load(config_path.as_deref())?;

    let keymap = Keymap::from_config(&config.keymap).context("Invalid keymap configuration")?;

    let handler: Arc<dyn ScanHandler> = if config.relay.endpoint.is_some() {
        Arc::new(HttpRelay::new(&config.relay)?)
    } else {
        info!("No relay endpoint configured, scans are logged only");
        Arc::new(LogHandler)
    };

    let handle = KeyboardListener::new(keymap, handler, &config.listener).start()?;

    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);
    info!("hidwatch running");

    wait_for_shutdown().await?;

    info!("Shutting down");
    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Stopping]);
    handle.stop().await;

    Ok(())
}

/// Block until SIGINT or SIGTERM
async fn wait_for_shutdown() -> Result<()> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("Cannot install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Cannot install SIGINT handler")?;
            debug!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            debug!("Received SIGTERM");
        }
    }
    Ok(())
}
