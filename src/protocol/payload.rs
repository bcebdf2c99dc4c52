//! Telemetry payload codec.
//!
//! Wire format:
//! ```text
//! ┌───────────────────┬───────────────────┐
//! │ Temperature (4B)  │ Threshold (4B)    │
//! │ LE f32, °F        │ LE f32, °F        │
//! └───────────────────┴───────────────────┘
//! ```
//!
//! Exactly eight bytes or nothing.  Values are carried bit-for-bit; NaN and
//! infinities survive the round trip and are judged by the receiver.

use crate::error::LinkError;

/// Encoded payload size.
pub const PAYLOAD_LEN: usize = 8;

/// One telemetry sample as carried over the air.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryPayload {
    pub temperature: f32,
    pub threshold: f32,
}

impl TelemetryPayload {
    pub const fn new(temperature: f32, threshold: f32) -> Self {
        Self {
            temperature,
            threshold,
        }
    }

    /// Serialise to the 8-byte wire form.
    pub fn encode(&self) -> [u8; PAYLOAD_LEN] {
        let mut out = [0u8; PAYLOAD_LEN];
        out[..4].copy_from_slice(&self.temperature.to_le_bytes());
        out[4..].copy_from_slice(&self.threshold.to_le_bytes());
        out
    }

    /// Parse the wire form.  Any length other than 8 is a protocol violation.
    pub fn decode(bytes: &[u8]) -> Result<Self, LinkError> {
        let raw: &[u8; PAYLOAD_LEN] = bytes
            .try_into()
            .map_err(|_| LinkError::MalformedPayload)?;
        let [t0, t1, t2, t3, h0, h1, h2, h3] = *raw;
        Ok(Self {
            temperature: f32::from_le_bytes([t0, t1, t2, t3]),
            threshold: f32::from_le_bytes([h0, h1, h2, h3]),
        })
    }

    /// Both fields are ordinary numbers (not NaN, not infinite).
    pub fn is_finite(&self) -> bool {
        self.temperature.is_finite() && self.threshold.is_finite()
    }
}

/// Free-function form of [`TelemetryPayload::encode`].
pub fn encode(temperature: f32, threshold: f32) -> [u8; PAYLOAD_LEN] {
    TelemetryPayload::new(temperature, threshold).encode()
}

/// Free-function form of [`TelemetryPayload::decode`].
pub fn decode(bytes: &[u8]) -> Result<(f32, f32), LinkError> {
    TelemetryPayload::decode(bytes).map(|p| (p.temperature, p.threshold))
}
