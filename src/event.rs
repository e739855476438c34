//! Completed scan events and the dispatch seam
//!
//! A `ScanEvent` is produced once per trigger key press on a non-empty
//! buffer and handed to the injected `ScanHandler`. The core invokes the
//! handler exactly once per scan and never retries; delivery is the
//! handler's concern.

use std::os::unix::io::AsRawFd;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use serde::Serialize;

/// Physical identity of the device a scan came from
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    /// Physical topology string (e.g. "usb-0000:00:14.0-2/input0")
    pub phys: String,
    /// Device node path (/dev/input/eventN)
    pub path: String,
    /// Open file descriptor of the device node
    pub fd: i32,
    /// Bus type (BUS_USB = 3, BUS_BLUETOOTH = 5, ...)
    pub bustype: u16,
    pub product: u16,
    pub vendor: u16,
    pub version: u16,
}

impl DeviceInfo {
    /// Snapshot the identity of an open evdev device
    pub fn from_device(path: &Path, device: &evdev::Device) -> Self {
        let id = device.input_id();
        Self {
            phys: device.physical_path().unwrap_or_default().to_string(),
            path: path.display().to_string(),
            fd: device.as_raw_fd(),
            bustype: id.bus_type().0,
            product: id.product(),
            vendor: id.vendor(),
            version: id.version(),
        }
    }
}

/// One completed scan, flushed by a trigger key press
#[derive(Debug, Clone, Serialize)]
pub struct ScanEvent {
    /// Accumulated buffer contents at flush time (never empty)
    pub string: String,
    /// Human-readable device name
    pub name: String,
    /// Seconds since epoch, fractional, as a string
    pub timestamp: String,
    /// Device metadata
    pub info: DeviceInfo,
}

impl ScanEvent {
    /// Build an event stamped with the current time
    pub fn new(string: String, name: String, info: DeviceInfo) -> Self {
        let now = Utc::now();
        Self {
            string,
            name,
            timestamp: format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros()),
            info,
        }
    }
}

/// Consumer of completed scans, injected into the listener.
///
/// Invoked once per scan from the emitting device's watch loop; errors are
/// logged there and never tear down the loop.
#[async_trait]
pub trait ScanHandler: Send + Sync {
    async fn handle(&self, event: ScanEvent) -> Result<()>;
}

/// Fallback handler that logs scans instead of relaying them.
/// Used when no relay endpoint is configured.
pub struct LogHandler;

#[async_trait]
impl ScanHandler for LogHandler {
    async fn handle(&self, event: ScanEvent) -> Result<()> {
        debug!(
            "scan from {} ({}): {:?}",
            event.name, event.info.path, event.string
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> DeviceInfo {
        DeviceInfo {
            phys: "usb-0000:00:14.0-2/input0".to_string(),
            path: "/dev/input/event3".to_string(),
            fd: 7,
            bustype: 3,
            product: 0x0011,
            vendor: 0x0c2e,
            version: 0x0110,
        }
    }

    #[test]
    fn test_timestamp_is_fractional_epoch_seconds() {
        let event = ScanEvent::new("4006381333931".to_string(), "scanner".to_string(), sample_info());
        let value: f64 = event.timestamp.parse().unwrap();
        assert!(value > 1_600_000_000.0);
        assert!(event.timestamp.contains('.'));
    }

    #[test]
    fn test_event_serializes_with_nested_info() {
        let event = ScanEvent::new("A".to_string(), "scanner".to_string(), sample_info());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["string"], "A");
        assert_eq!(json["name"], "scanner");
        assert_eq!(json["info"]["path"], "/dev/input/event3");
        assert_eq!(json["info"]["bustype"], 3);
        assert_eq!(json["info"]["fd"], 7);
    }

    #[tokio::test]
    async fn test_log_handler_accepts_events() {
        let handler = LogHandler;
        let event = ScanEvent::new("A".to_string(), "scanner".to_string(), sample_info());
        assert!(handler.handle(event).await.is_ok());
    }
}
