//! Unified error types for the ThermoValve firmware.
//!
//! Every radio-facing operation returns a [`LinkError`]; the telemetry link
//! state machine maps each variant to a named recovery transition, so none of
//! them ever escapes to the process.  All variants are `Copy` so they can be
//! logged, counted and re-emitted as events without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Fallible startup / adapter operations funnel into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A telemetry link operation failed.
    Link(LinkError),
    /// A transmitter-side sensor could not be read.
    Sensor(SensorError),
    /// Configuration is invalid or could not be parsed.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

/// Radio / protocol failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkError {
    /// The scan window closed without an advertiser carrying our service.
    ScanTimeout,
    /// The peer did not complete the connection in time.
    ConnectTimeout,
    /// Service or characteristic lookup, or notification enable, failed.
    SubscriptionFailure,
    /// The peer closed the link or supervision timed out.
    UnexpectedDisconnect,
    /// A notification body was not exactly one telemetry payload long.
    MalformedPayload,
    /// Any other link-layer error reported by the radio stack.
    RadioTransientError,
}

impl LinkError {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::ScanTimeout,
        Self::ConnectTimeout,
        Self::SubscriptionFailure,
        Self::UnexpectedDisconnect,
        Self::MalformedPayload,
        Self::RadioTransientError,
    ];

    /// Dense index, used for per-category counters.
    pub const fn index(self) -> usize {
        match self {
            Self::ScanTimeout => 0,
            Self::ConnectTimeout => 1,
            Self::SubscriptionFailure => 2,
            Self::UnexpectedDisconnect => 3,
            Self::MalformedPayload => 4,
            Self::RadioTransientError => 5,
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScanTimeout => write!(f, "scan window expired"),
            Self::ConnectTimeout => write!(f, "connect timed out"),
            Self::SubscriptionFailure => write!(f, "subscription failed"),
            Self::UnexpectedDisconnect => write!(f, "peer disconnected"),
            Self::MalformedPayload => write!(f, "malformed payload"),
            Self::RadioTransientError => write!(f, "radio error"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error or timed out.
    AdcReadFailed,
    /// Reading is pinned to a rail (open or shorted probe).
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The override blob is not valid JSON for [`SystemConfig`](crate::config::SystemConfig).
    Parse,
    /// A field failed range validation; the message names it.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => write!(f, "config parse failed"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
