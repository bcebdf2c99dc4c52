//! BLE telemetry link.
//!
//! - [`receiver`] — valve node: scan → connect → subscribe → stream, with
//!   backoff-and-retry on every failure.
//! - [`transmitter`] — sensing node: advertise → accept → notify.

pub mod receiver;
pub mod transmitter;

use core::fmt;
use core::time::Duration;

use crate::config::LinkConfig;
use crate::error::LinkError;

pub use receiver::TelemetryLink;
pub use transmitter::Transmitter;

/// Receiver link phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkPhase {
    Idle,
    Scanning,
    Connecting,
    Subscribing,
    Streaming,
    Disconnecting,
}

impl LinkPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Disconnecting => "disconnecting",
        }
    }
}

impl fmt::Display for LinkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long to wait before the next scan after `error`.
///
/// An empty scan window only needs a short pause; everything else gets the
/// full retry backoff.
pub fn backoff_for(error: LinkError, config: &LinkConfig) -> Duration {
    match error {
        LinkError::ScanTimeout => config.rescan_delay(),
        _ => config.retry_backoff(),
    }
}

/// Link counters.  Monotonic, wrapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub connections: u32,
    pub disconnects: u32,
    pub payloads: u32,
    pub invalid_payloads: u32,
    faults: [u32; LinkError::ALL.len()],
}

impl LinkStats {
    pub fn record_fault(&mut self, error: LinkError) {
        let slot = &mut self.faults[error.index()];
        *slot = slot.wrapping_add(1);
    }

    pub fn faults(&self, error: LinkError) -> u32 {
        self.faults[error.index()]
    }

    pub fn total_faults(&self) -> u32 {
        self.faults.iter().fold(0u32, |acc, n| acc.wrapping_add(*n))
    }
}
