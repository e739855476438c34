//! Global constants for hidwatch
//!
//! Consolidates tunable defaults and filesystem paths
//! to eliminate magic numbers throughout the codebase.

// ============================================================================
// Listener Defaults
// ============================================================================

/// Maximum number of characters retained per device buffer.
/// Older characters are evicted first once the bound is reached.
pub const DEFAULT_MAX_STRING_LENGTH: usize = 256;

/// Interval between device re-enumeration passes, in seconds
pub const DEFAULT_UPDATE_DEVICES_INTERVAL_SECS: u64 = 5;

// ============================================================================
// Relay Defaults
// ============================================================================

/// Per-request timeout for the HTTP relay, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Filesystem Paths
// ============================================================================

/// Directory scanned for input devices
pub const INPUT_DEVICE_DIR: &str = "/dev/input";

/// Filename prefix of event device nodes (event0, event1, ...)
pub const EVENT_DEVICE_PREFIX: &str = "event";
