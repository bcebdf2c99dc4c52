//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ TelemetryLink / TripLatch / ResetDebouncer
//! ```
//!
//! Driven adapters (radio, valve pin, reset button, sensors, timers, event
//! sinks) implement these traits.  The core consumes them via generics, so
//! the state machines never touch hardware directly and run unchanged
//! against the mocks in `tests/integration/`.
//!
//! The async ports are plain `async fn` in traits: everything runs on one
//! local executor, so no `Send` bounds are required.

#![allow(async_fn_in_trait)]

use core::fmt;
use core::time::Duration;

use crate::error::{LinkError, SensorError};
use crate::protocol::advert::AdvertisingData;

use super::events::AppEvent;

// ───────────────────────────────────────────────────────────────
// Valve / reset input (driven adapters: domain ↔ GPIO)
// ───────────────────────────────────────────────────────────────

/// Single binary output driving the valve (and its indicator LED).
///
/// `true` = tripped.  Must tolerate being called repeatedly with the same
/// value.
pub trait ValvePort {
    fn set_output(&mut self, tripped: bool);
}

/// The operator's reset button, read as a logical level.
pub trait ResetInput {
    fn is_pressed(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Sensing-node inputs
// ───────────────────────────────────────────────────────────────

/// Temperature acquisition.  May suspend for the probe's conversion time.
pub trait TemperatureSource {
    /// Latest reading in degrees Celsius.
    async fn read_temperature(&mut self) -> Result<f32, SensorError>;
}

/// Operator-adjustable trip threshold, polled once per telemetry cycle.
pub trait ThresholdSource {
    /// Threshold in degrees Fahrenheit.
    fn read_threshold(&mut self) -> f32;
}

/// Local over-threshold lamp pair on the sensing node.
pub trait DangerIndicator {
    /// `true` lights danger, `false` lights safe.
    fn set_danger(&mut self, danger: bool);
}

// ───────────────────────────────────────────────────────────────
// Timing
// ───────────────────────────────────────────────────────────────

/// Suspension point used for every backoff, poll and timeout.
pub trait Delay {
    async fn sleep(&self, duration: Duration);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Radio — central (valve node)
// ───────────────────────────────────────────────────────────────

/// Bluetooth device address type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrKind {
    Public,
    Random,
}

/// Identity of a remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddress {
    /// Address bytes, most-significant first (as printed).
    pub addr: [u8; 6],
    pub kind: AddrKind,
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.addr;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

/// Scanning and connection establishment.
pub trait Central {
    type Connection: GattConnection;

    /// Scan until an advertiser carrying `service` is seen, or `window`
    /// expires ([`LinkError::ScanTimeout`]).
    async fn scan(&mut self, service: u128, window: Duration) -> Result<PeerAddress, LinkError>;

    /// Open a link to `peer`.
    async fn connect(
        &mut self,
        peer: &PeerAddress,
        timeout: Duration,
    ) -> Result<Self::Connection, LinkError>;
}

/// One established link.  Dropped after [`disconnect`](Self::disconnect);
/// never reused.
pub trait GattConnection {
    fn peer(&self) -> PeerAddress;

    /// Resolve `service`/`characteristic` and enable notifications.
    async fn subscribe(&mut self, service: u128, characteristic: u128) -> Result<(), LinkError>;

    /// Wait for the next notification and copy its body into `buf`.
    ///
    /// Returns the body's true length, which may exceed `buf.len()` when
    /// the peer sent more than fits (only `buf.len()` bytes are copied).
    async fn next_notification(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;

    /// Tear the link down.  Infallible from the caller's point of view.
    async fn disconnect(self);
}

// ───────────────────────────────────────────────────────────────
// Radio — peripheral (sensing node)
// ───────────────────────────────────────────────────────────────

/// Advertising and connection acceptance.
pub trait Peripheral {
    type Session: NotifySession;

    /// Advertise `data` until a central connects.  At most one session
    /// exists at a time.
    async fn advertise(&mut self, data: &AdvertisingData) -> Result<Self::Session, LinkError>;
}

/// The single connected central.
pub trait NotifySession {
    /// Update the readable characteristic value and notify the subscriber.
    async fn notify(&mut self, value: &[u8]) -> Result<(), LinkError>;

    /// Absorb pending connection events without sending anything.
    /// Fails once the central has gone.
    fn check_link(&mut self) -> Result<(), LinkError>;
}
