//! Per-device watch loop
//!
//! One long-lived task per watched device: pulls raw events from the
//! device's evdev stream, feeds key events to the decoder, and dispatches
//! completed scans to the injected handler.
//!
//! Error boundaries, from innermost out:
//! - A failed dispatch is logged and the loop continues; one bad event
//!   never tears down the watch.
//! - ENODEV from the stream means the device was unplugged; the loop ends
//!   cleanly and the registry reaps the entry at its next pass.
//! - Any other stream error terminates the loop; the device is not
//!   re-watched until it drops out of and back into enumeration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use evdev::{Device, InputEventKind};
use log::{debug, warn};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::decode::{decode_key, DecodeState, KeyState};
use crate::event::{DeviceInfo, ScanEvent, ScanHandler};
use crate::keymap::Keymap;

/// Terminal condition of a watch loop
#[derive(Debug, Error)]
pub enum WatchError {
    /// The device node vanished (unplug); expected, not a failure
    #[error("device detached")]
    Disconnected,
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    fn from_stream_error(err: std::io::Error) -> Self {
        if err.raw_os_error() == Some(libc::ENODEV) {
            Self::Disconnected
        } else {
            Self::Io(err)
        }
    }
}

/// Spawn the watch task for one device.
/// Dropping the paired cancel sender ends the loop at its next idle point.
pub(super) fn spawn_watch(
    path: PathBuf,
    device: Device,
    keymap: Arc<Keymap>,
    handler: Arc<dyn ScanHandler>,
    max_len: usize,
    cancel: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match watch_device(&path, device, keymap, handler, max_len, cancel).await {
            Ok(()) => {}
            Err(WatchError::Disconnected) => {
                debug!("Watch loop for {} ended: device detached", path.display());
            }
            Err(e) => {
                warn!("Watch loop for {} terminated: {}", path.display(), e);
            }
        }
    })
}

async fn watch_device(
    path: &Path,
    device: Device,
    keymap: Arc<Keymap>,
    handler: Arc<dyn ScanHandler>,
    max_len: usize,
    mut cancel: oneshot::Receiver<()>,
) -> Result<(), WatchError> {
    let info = DeviceInfo::from_device(path, &device);
    let name = device.name().unwrap_or("unknown").to_string();
    let mut stream = device
        .into_event_stream()
        .map_err(WatchError::from_stream_error)?;
    let mut state = DecodeState::new();

    debug!("Watching {} ({})", path.display(), name);

    loop {
        // Cancellation is only observed here, between events; a dispatch
        // already in flight below always runs to completion
        let event = tokio::select! {
            _ = &mut cancel => {
                debug!("Watch loop for {} cancelled", path.display());
                return Ok(());
            }
            result = stream.next_event() => match result {
                Ok(event) => event,
                Err(e) => return Err(WatchError::from_stream_error(e)),
            },
        };

        // Only key events carry scan data; axis/sync/misc events are skipped
        let code = match event.kind() {
            InputEventKind::Key(key) => key.code(),
            _ => continue,
        };
        let key_state = match KeyState::from_value(event.value()) {
            Some(key_state) => key_state,
            None => continue,
        };

        if let Some(string) = decode_key(&mut state, &keymap, code, key_state, max_len) {
            let scan = ScanEvent::new(string, name.clone(), info.clone());
            if let Err(e) = handler.handle(scan).await {
                warn!(
                    "Scan dispatch failed for {} (code {}): {:#}",
                    name, code, e
                );
            }
        }
    }
}
