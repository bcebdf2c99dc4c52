//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one structured line per
//! [`AppEvent`] to the ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

use super::time::uptime_ms;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        let t = uptime_ms();
        match event {
            AppEvent::PhaseChanged { from, to } => {
                info!("LINK | t={}ms | {} -> {}", t, from, to);
            }
            AppEvent::PeerFound(peer) => {
                info!("LINK | t={}ms | found peer={}", t, peer);
            }
            AppEvent::Connected(peer) => {
                info!("LINK | t={}ms | connected peer={}", t, peer);
            }
            AppEvent::Subscribed => {
                info!("LINK | t={}ms | subscribed", t);
            }
            AppEvent::Reading {
                temperature,
                threshold,
                tripped,
            } => {
                info!(
                    "TRIP | t={}ms | T={:.2}\u{00b0}F limit={:.2}\u{00b0}F | valve={}",
                    t,
                    temperature,
                    threshold,
                    if *tripped { "DISABLED" } else { "ENABLED" },
                );
            }
            AppEvent::InvalidPayload { len } => {
                warn!("TRIP | t={}ms | invalid payload len={} | latch cleared", t, len);
            }
            AppEvent::Fault(e) => {
                warn!("LINK | t={}ms | fault: {}", t, e);
            }
            AppEvent::ResetPressed => {
                info!("TRIP | t={}ms | reset pressed | latch cleared", t);
            }
            AppEvent::SessionOpened => {
                info!("TX   | t={}ms | central connected", t);
            }
            AppEvent::Notified {
                temperature,
                threshold,
            } => {
                info!(
                    "TX   | t={}ms | T={:.2}\u{00b0}F limit={:.2}\u{00b0}F",
                    t, temperature, threshold
                );
            }
            AppEvent::SessionClosed(e) => {
                warn!("TX   | t={}ms | session closed: {}", t, e);
            }
        }
    }
}
