//! System configuration parameters
//!
//! All timing contracts of the telemetry link and the reset debouncer live
//! here as plain millisecond values, so tests can shrink them and a build
//! can override them from a JSON blob.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default advertised device name of the sensing node.
pub const DEFAULT_DEVICE_NAME: &str = "TempMon";

/// Receiver-side link timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Maximum time spent scanning for the sensing node.
    pub scan_window_ms: u32,
    /// Pause after a scan window closes empty.
    pub rescan_delay_ms: u32,
    /// Maximum time to establish a connection.
    pub connect_timeout_ms: u32,
    /// Pause after any other link failure before scanning again.
    pub retry_backoff_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            scan_window_ms: 10_000,
            rescan_delay_ms: 2_000,
            connect_timeout_ms: 10_000,
            retry_backoff_ms: 5_000,
        }
    }
}

impl LinkConfig {
    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_window_ms as u64)
    }

    pub fn rescan_delay(&self) -> Duration {
        Duration::from_millis(self.rescan_delay_ms as u64)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms as u64)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms as u64)
    }
}

/// Reset button debounce timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    /// Fixed poll cadence of the reset input.
    pub poll_interval_ms: u32,
    /// How long the input must read released before a new press counts.
    pub release_stable_ms: u32,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            release_stable_ms: 100,
        }
    }
}

impl ResetConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms as u64)
    }
}

/// Sensing-node (transmitter) parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmitterConfig {
    /// Advertised local name.
    pub device_name: heapless::String<24>,
    /// Period between telemetry notifications.
    pub telemetry_interval_ms: u32,
    /// Pause before advertising again after a session ends.
    pub readvertise_delay_ms: u32,
    /// Threshold at the potentiometer's low end stop (°F).
    pub threshold_min_f: f32,
    /// Threshold at the potentiometer's high end stop (°F).
    pub threshold_max_f: f32,
    /// Threshold used when no potentiometer is fitted (°F).
    pub default_threshold_f: f32,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        let mut device_name = heapless::String::new();
        let _ = device_name.push_str(DEFAULT_DEVICE_NAME);
        Self {
            device_name,
            telemetry_interval_ms: 1_000,
            readvertise_delay_ms: 1_000,
            threshold_min_f: 50.0,
            threshold_max_f: 250.0,
            default_threshold_f: 104.0, // 40 °C
        }
    }
}

impl TransmitterConfig {
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms as u64)
    }

    pub fn readvertise_delay(&self) -> Duration {
        Duration::from_millis(self.readvertise_delay_ms as u64)
    }
}

/// Core system configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub link: LinkConfig,
    pub reset: ResetConfig,
    pub transmitter: TransmitterConfig,
}

impl SystemConfig {
    /// Parse a JSON override.  Missing fields keep their defaults.
    pub fn from_json(raw: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(raw).map_err(|_| ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall or spin the state machines.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let link = &self.link;
        if link.scan_window_ms == 0 {
            return Err(ConfigError::ValidationFailed("scan_window_ms must be > 0"));
        }
        if link.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("connect_timeout_ms must be > 0"));
        }
        if link.rescan_delay_ms == 0 || link.retry_backoff_ms == 0 {
            return Err(ConfigError::ValidationFailed("link backoff delays must be > 0"));
        }

        let reset = &self.reset;
        if reset.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("poll_interval_ms must be > 0"));
        }
        if reset.release_stable_ms < reset.poll_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "release_stable_ms must cover at least one poll",
            ));
        }

        let tx = &self.transmitter;
        if tx.device_name.is_empty() {
            return Err(ConfigError::ValidationFailed("device_name must not be empty"));
        }
        if tx.telemetry_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("telemetry_interval_ms must be > 0"));
        }
        if tx.readvertise_delay_ms == 0 {
            return Err(ConfigError::ValidationFailed("readvertise_delay_ms must be > 0"));
        }
        if !(tx.threshold_min_f.is_finite()
            && tx.threshold_max_f.is_finite()
            && tx.threshold_min_f < tx.threshold_max_f)
        {
            return Err(ConfigError::ValidationFailed("threshold span must be finite and ascending"));
        }
        if !tx.default_threshold_f.is_finite() {
            return Err(ConfigError::ValidationFailed("default_threshold_f must be finite"));
        }
        Ok(())
    }
}
