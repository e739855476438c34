//! Device registry and watch lifecycle
//!
//! Enumerates /dev/input event devices, keeps one watch task per device,
//! and reconciles the watched set against the kernel's on a fixed
//! interval: newly appeared devices get a fresh watch task and decode
//! state, vanished devices get their task cancelled. A device that
//! disappears and reappears is treated as brand new; no buffer contents
//! survive a replug.
//!
//! The watched map is owned by a single registry task, so a
//! reconciliation pass always completes its full diff before yielding and
//! no two passes can overlap.

pub mod decode;
pub mod watch;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use evdev::Device;
use log::{debug, info, warn};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::ListenerConfig;
use crate::constants::{EVENT_DEVICE_PREFIX, INPUT_DEVICE_DIR};
use crate::event::ScanHandler;
use crate::keymap::Keymap;
use watch::spawn_watch;

/// One watched device: its watch task and the cancel handle that winds the
/// task down at its next idle point without interrupting an in-flight
/// dispatch
struct DeviceWatch {
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// HID scan listener: watches every event device and dispatches completed
/// scans to the injected handler
pub struct KeyboardListener {
    keymap: Arc<Keymap>,
    handler: Arc<dyn ScanHandler>,
    max_string_length: usize,
    update_interval: Duration,
    device_dir: PathBuf,
}

impl KeyboardListener {
    pub fn new(keymap: Keymap, handler: Arc<dyn ScanHandler>, config: &ListenerConfig) -> Self {
        Self {
            keymap: Arc::new(keymap),
            handler,
            max_string_length: config.max_string_length,
            update_interval: Duration::from_secs(config.update_devices_interval_secs),
            device_dir: PathBuf::from(INPUT_DEVICE_DIR),
        }
    }

    /// Begin watching all currently present devices and spawn the
    /// reconciliation task. Must be called inside a tokio runtime.
    pub fn start(self) -> Result<ListenerHandle> {
        let paths = list_event_devices(&self.device_dir)?;

        let mut watched = HashMap::new();
        for path in paths {
            match Device::open(&path) {
                Ok(device) => {
                    watched.insert(
                        path.clone(),
                        spawn_device_watch(
                            path,
                            device,
                            &self.keymap,
                            &self.handler,
                            self.max_string_length,
                        ),
                    );
                }
                Err(e) => warn!("Cannot open device {}: {}", path.display(), e),
            }
        }
        info!("Watching {} input devices", watched.len());

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let registry = tokio::spawn(run_registry(
            watched,
            self.keymap,
            self.handler,
            self.max_string_length,
            self.update_interval,
            self.device_dir,
            shutdown_rx,
        ));

        Ok(ListenerHandle {
            shutdown: shutdown_tx,
            registry,
        })
    }
}

/// Handle for the running listener; dropping it does NOT stop the tasks,
/// call `stop()` for a deterministic shutdown
pub struct ListenerHandle {
    shutdown: oneshot::Sender<()>,
    registry: JoinHandle<()>,
}

impl ListenerHandle {
    /// Stop the reconciliation task and wind down every watch loop.
    /// In-flight dispatches complete before their loop exits.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.registry.await;
    }
}

fn spawn_device_watch(
    path: PathBuf,
    device: Device,
    keymap: &Arc<Keymap>,
    handler: &Arc<dyn ScanHandler>,
    max_len: usize,
) -> DeviceWatch {
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let task = spawn_watch(
        path,
        device,
        keymap.clone(),
        handler.clone(),
        max_len,
        cancel_rx,
    );
    DeviceWatch {
        cancel: cancel_tx,
        task,
    }
}

async fn run_registry(
    mut watched: HashMap<PathBuf, DeviceWatch>,
    keymap: Arc<Keymap>,
    handler: Arc<dyn ScanHandler>,
    max_len: usize,
    update_interval: Duration,
    device_dir: PathBuf,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = time::interval(update_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; consume it so the first
    // reconciliation pass runs one full interval after start
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                reconcile(&mut watched, &keymap, &handler, max_len, &device_dir);
            }
            _ = &mut shutdown => break,
        }
    }

    debug!("Stopping {} watch loops", watched.len());
    for (_, device_watch) in watched.drain() {
        let DeviceWatch { cancel, task } = device_watch;
        drop(cancel);
        let _ = task.await;
    }
}

/// One reconciliation pass: diff the kernel's device set against the
/// watched set, then retire and spawn watch tasks accordingly
fn reconcile(
    watched: &mut HashMap<PathBuf, DeviceWatch>,
    keymap: &Arc<Keymap>,
    handler: &Arc<dyn ScanHandler>,
    max_len: usize,
    device_dir: &Path,
) {
    let current = match list_event_devices(device_dir) {
        Ok(paths) => paths,
        Err(e) => {
            warn!("Device scan failed: {:#}", e);
            return;
        }
    };
    let known: HashSet<PathBuf> = watched.keys().cloned().collect();
    let (added, removed) = diff_device_sets(&known, &current);

    for path in removed {
        // Dropping the cancel sender lets the task finish any in-flight
        // dispatch before exiting
        if watched.remove(&path).is_some() {
            info!("Device removed: {}", path.display());
        }
    }

    for path in added {
        match Device::open(&path) {
            Ok(device) => {
                info!("Device added: {}", path.display());
                watched.insert(
                    path.clone(),
                    spawn_device_watch(path, device, keymap, handler, max_len),
                );
            }
            // Likely a permission problem; retried on the next pass
            Err(e) => debug!("Cannot open device {}: {}", path.display(), e),
        }
    }
}

/// Scan a directory for event device nodes (event0, event1, ...)
fn list_event_devices(dir: &Path) -> Result<HashSet<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Cannot scan {}", dir.display()))?;

    let mut paths = HashSet::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with(EVENT_DEVICE_PREFIX) {
            paths.insert(path);
        }
    }
    Ok(paths)
}

/// Symmetric difference between the watched and enumerated device sets:
/// (paths to start watching, paths to stop watching)
fn diff_device_sets(
    known: &HashSet<PathBuf>,
    current: &HashSet<PathBuf>,
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let added = current.difference(known).cloned().collect();
    let removed = known.difference(current).cloned().collect();
    (added, removed)
}
