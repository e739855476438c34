//! Configuration file management
//!
//! Loads TOML configuration files and provides daemon settings.
//! Default config path: ~/.config/hidwatch/config.toml

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_STRING_LENGTH, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_UPDATE_DEVICES_INTERVAL_SECS,
};

/// Daemon settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device listener settings
    pub listener: ListenerConfig,
    /// HTTP relay settings
    pub relay: RelayConfig,
    /// Keymap overrides
    pub keymap: KeymapConfig,
}

/// Device listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Per-device buffer bound; the oldest character is evicted
    /// when a scan grows past this length
    pub max_string_length: usize,
    /// Seconds between device re-enumeration passes
    pub update_devices_interval_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            update_devices_interval_secs: DEFAULT_UPDATE_DEVICES_INTERVAL_SECS,
        }
    }
}

/// HTTP relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Endpoint completed scans are POSTed to as JSON.
    /// Unset: scans are logged instead of relayed.
    pub endpoint: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Keymap overrides
///
/// Every field is optional; unset fields use the built-in US layout.
/// Table keys are scancodes as decimal strings (TOML table keys are
/// always strings), values are single characters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeymapConfig {
    /// Scancodes that flush the buffer as a completed scan
    pub trigger_keys: Option<Vec<u16>>,
    /// Scancodes that toggle both capitalization flags (Shift)
    pub capitalize_all_keys: Option<Vec<u16>>,
    /// Scancodes that toggle the letter flag only (CapsLock)
    pub capitalize_symbols_keys: Option<Vec<u16>>,
    /// Lowercase letter table
    pub regular_letters: Option<BTreeMap<String, String>>,
    /// Uppercase letter table
    pub capital_letters: Option<BTreeMap<String, String>>,
    /// Unshifted symbol table
    pub regular_symbols: Option<BTreeMap<String, String>>,
    /// Shifted symbol table
    pub capital_symbols: Option<BTreeMap<String, String>>,
    /// Numpad table
    pub numpad_symbols: Option<BTreeMap<String, String>>,
}

impl Config {
    /// Load configuration from the given path.
    /// A missing file is not an error; defaults are used with a warning.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config path available, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&text)
            .with_context(|| format!("Cannot parse config file {}", path.display()))?;
        config.validate();

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Clamp out-of-range values to usable minimums
    fn validate(&mut self) {
        if self.listener.max_string_length == 0 {
            warn!("listener.max_string_length must be positive, using 1");
            self.listener.max_string_length = 1;
        }
        if self.listener.update_devices_interval_secs == 0 {
            warn!(
                "listener.update_devices_interval_secs must be positive, using {}",
                DEFAULT_UPDATE_DEVICES_INTERVAL_SECS
            );
            self.listener.update_devices_interval_secs = DEFAULT_UPDATE_DEVICES_INTERVAL_SECS;
        }
        if self.relay.request_timeout_secs == 0 {
            warn!(
                "relay.request_timeout_secs must be positive, using {}",
                DEFAULT_REQUEST_TIMEOUT_SECS
            );
            self.relay.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
        }
    }
}

/// Get default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hidwatch").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listener.max_string_length, DEFAULT_MAX_STRING_LENGTH);
        assert_eq!(
            config.listener.update_devices_interval_secs,
            DEFAULT_UPDATE_DEVICES_INTERVAL_SECS
        );
        assert!(config.relay.endpoint.is_none());
        assert!(config.keymap.trigger_keys.is_none());
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [listener]
            max_string_length = 64

            [relay]
            endpoint = "http://127.0.0.1:5000/workbench/hid-event"
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.max_string_length, 64);
        // Unset fields keep defaults
        assert_eq!(
            config.listener.update_devices_interval_secs,
            DEFAULT_UPDATE_DEVICES_INTERVAL_SECS
        );
        assert_eq!(
            config.relay.endpoint.as_deref(),
            Some("http://127.0.0.1:5000/workbench/hid-event")
        );
        assert_eq!(config.relay.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_parse_keymap_section() {
        let config: Config = toml::from_str(
            r#"
            [keymap]
            trigger_keys = [28]
            capitalize_all_keys = [42, 54]

            [keymap.regular_letters]
            30 = "a"
            31 = "s"
            "#,
        )
        .unwrap();
        assert_eq!(config.keymap.trigger_keys, Some(vec![28]));
        assert_eq!(config.keymap.capitalize_all_keys, Some(vec![42, 54]));
        let letters = config.keymap.regular_letters.unwrap();
        assert_eq!(letters.get("30").map(String::as_str), Some("a"));
        assert_eq!(letters.len(), 2);
    }

    #[test]
    fn test_validate_clamps_zero_values() {
        let mut config: Config = toml::from_str(
            r#"
            [listener]
            max_string_length = 0
            update_devices_interval_secs = 0
            "#,
        )
        .unwrap();
        config.validate();
        assert_eq!(config.listener.max_string_length, 1);
        assert_eq!(
            config.listener.update_devices_interval_secs,
            DEFAULT_UPDATE_DEVICES_INTERVAL_SECS
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/hidwatch.toml"))).unwrap();
        assert_eq!(config.listener.max_string_length, DEFAULT_MAX_STRING_LENGTH);
    }
}
