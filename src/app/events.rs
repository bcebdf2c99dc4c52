//! Outbound application events.
//!
//! The link state machines and the reset debouncer emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them: the serial log in production, a `Vec` in
//! the integration tests.

use crate::error::LinkError;
use crate::link::LinkPhase;

use super::ports::PeerAddress;

/// Structured events emitted by the firmware core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Receiver link moved between phases.
    PhaseChanged { from: LinkPhase, to: LinkPhase },

    /// An advertiser carrying our service was found.
    PeerFound(PeerAddress),

    /// A connection to the peer is up.
    Connected(PeerAddress),

    /// Notifications are enabled; streaming starts.
    Subscribed,

    /// A valid reading was applied to the trip latch.
    Reading {
        temperature: f32,
        threshold: f32,
        tripped: bool,
    },

    /// A notification was rejected; the latch was cleared.
    InvalidPayload { len: usize },

    /// A link failure was recovered with a backoff.
    Fault(LinkError),

    /// The operator reset the latch.
    ResetPressed,

    /// Sensing node: a central connected to our advertisement.
    SessionOpened,

    /// Sensing node: a telemetry notification went out.
    Notified {
        temperature: f32,
        threshold: f32,
    },

    /// Sensing node: the session ended.
    SessionClosed(LinkError),
}
