//! Valve-node telemetry link.
//!
//! ```text
//!        ┌──────────────────────── backoff ◀──────────────────────┐
//!        ▼                                                        │
//!      Idle ─▶ Scanning ─▶ Connecting ─▶ Subscribing ─▶ Streaming ─┤
//!                                                   (Disconnecting)┘
//! ```
//!
//! Every failure is a [`LinkError`].  Recovery is always the same shape:
//! log the cause, tear down any live connection, sleep the category's
//! backoff, go back to `Idle`.  Nothing escapes [`TelemetryLink::run`].
//!
//! Notifications that are not exactly one payload, or that carry NaN /
//! infinite values, are *invalid data*: they go to the latch's invalid path
//! and streaming continues.

use core::time::Duration;

use futures_lite::future;
use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{Central, Delay, EventSink, GattConnection, PeerAddress, ValvePort};
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::protocol::{CHAR_TELEMETRY, MAX_NOTIFICATION_LEN, SERVICE_UUID, TelemetryPayload};
use crate::trip::TripLatch;

use super::{LinkPhase, LinkStats, backoff_for};

/// Receiver link state machine.
pub struct TelemetryLink<'a, R: Central, D, V, S> {
    radio: R,
    delay: &'a D,
    latch: TripLatch<'a, V>,
    sink: S,
    config: LinkConfig,
    phase: LinkPhase,
    target: Option<PeerAddress>,
    connection: Option<R::Connection>,
    stats: LinkStats,
}

impl<'a, R, D, V, S> TelemetryLink<'a, R, D, V, S>
where
    R: Central,
    D: Delay,
    V: ValvePort,
    S: EventSink,
{
    pub fn new(radio: R, delay: &'a D, latch: TripLatch<'a, V>, sink: S, config: LinkConfig) -> Self {
        Self {
            radio,
            delay,
            latch,
            sink,
            config,
            phase: LinkPhase::Idle,
            target: None,
            connection: None,
            stats: LinkStats::default(),
        }
    }

    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Run the link forever.
    pub async fn run(&mut self) {
        info!(
            "LINK: starting (scan {} ms, connect {} ms, backoff {} ms)",
            self.config.scan_window_ms, self.config.connect_timeout_ms, self.config.retry_backoff_ms
        );
        loop {
            self.step().await;
        }
    }

    /// Execute one transition (including any recovery backoff it triggers).
    /// Returns the phase the link ends up in.
    pub async fn step(&mut self) -> LinkPhase {
        let result = match self.phase {
            // Disconnecting only exists inside `recover`, which always
            // leaves the link in Idle.
            LinkPhase::Idle | LinkPhase::Disconnecting => {
                self.enter(LinkPhase::Scanning);
                Ok(())
            }
            LinkPhase::Scanning => self.scan().await,
            LinkPhase::Connecting => self.connect().await,
            LinkPhase::Subscribing => self.subscribe().await,
            LinkPhase::Streaming => self.stream_one().await,
        };

        if let Err(error) = result {
            self.recover(error).await;
        }
        self.phase
    }

    async fn scan(&mut self) -> Result<(), LinkError> {
        let window = self.config.scan_window();
        debug!("LINK: scanning for {} ms", window.as_millis());

        let radio = &mut self.radio;
        let peer = with_timeout(
            self.delay,
            window,
            LinkError::ScanTimeout,
            radio.scan(SERVICE_UUID, window),
        )
        .await?;

        info!("LINK: found {}", peer);
        self.target = Some(peer);
        self.sink.emit(&AppEvent::PeerFound(peer));
        self.enter(LinkPhase::Connecting);
        Ok(())
    }

    async fn connect(&mut self) -> Result<(), LinkError> {
        let peer = self.target.ok_or(LinkError::ScanTimeout)?;
        let timeout = self.config.connect_timeout();

        let radio = &mut self.radio;
        let connection = with_timeout(
            self.delay,
            timeout,
            LinkError::ConnectTimeout,
            radio.connect(&peer, timeout),
        )
        .await?;

        info!("LINK: connected to {}", peer);
        self.connection = Some(connection);
        self.stats.connections = self.stats.connections.wrapping_add(1);
        self.sink.emit(&AppEvent::Connected(peer));
        self.enter(LinkPhase::Subscribing);
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<(), LinkError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(LinkError::UnexpectedDisconnect)?;

        // Discovery on a wedged peer can hang; bound it like the connect.
        with_timeout(
            self.delay,
            self.config.connect_timeout(),
            LinkError::SubscriptionFailure,
            connection.subscribe(SERVICE_UUID, CHAR_TELEMETRY),
        )
        .await?;

        info!("LINK: subscribed, streaming");
        self.sink.emit(&AppEvent::Subscribed);
        self.enter(LinkPhase::Streaming);
        Ok(())
    }

    async fn stream_one(&mut self) -> Result<(), LinkError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(LinkError::UnexpectedDisconnect)?;

        let mut buf = [0u8; MAX_NOTIFICATION_LEN];
        match connection.next_notification(&mut buf).await {
            Ok(len) if len <= buf.len() => self.deliver(&buf[..len]),
            Ok(len) => self.reject(len),
            // The radio already judged the body unusable; same path.
            Err(LinkError::MalformedPayload) => self.reject(0),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn deliver(&mut self, body: &[u8]) {
        let payload = match TelemetryPayload::decode(body) {
            Ok(p) if p.is_finite() => p,
            _ => return self.reject(body.len()),
        };

        let tripped = self.latch.observe(payload.temperature, payload.threshold);
        self.stats.payloads = self.stats.payloads.wrapping_add(1);
        debug!(
            "LINK: {:.2} / {:.2} -> tripped={}",
            payload.temperature, payload.threshold, tripped
        );
        self.sink.emit(&AppEvent::Reading {
            temperature: payload.temperature,
            threshold: payload.threshold,
            tripped,
        });
    }

    fn reject(&mut self, len: usize) {
        warn!("LINK: invalid notification ({} bytes)", len);
        self.stats.invalid_payloads = self.stats.invalid_payloads.wrapping_add(1);
        self.stats.record_fault(LinkError::MalformedPayload);
        self.latch.observe_invalid();
        self.sink.emit(&AppEvent::InvalidPayload { len });
    }

    async fn recover(&mut self, error: LinkError) {
        match error {
            LinkError::ScanTimeout => info!("LINK: no sensing node found"),
            _ => warn!("LINK: {} in {} phase, recovering", error, self.phase),
        }
        self.stats.record_fault(error);
        self.sink.emit(&AppEvent::Fault(error));

        if self.connection.is_some() {
            self.enter(LinkPhase::Disconnecting);
            self.teardown().await;
        }

        let backoff = backoff_for(error, &self.config);
        debug!("LINK: backing off {} ms", backoff.as_millis());
        self.delay.sleep(backoff).await;
        self.enter(LinkPhase::Idle);
    }

    async fn teardown(&mut self) {
        self.target = None;
        if let Some(connection) = self.connection.take() {
            let peer = connection.peer();
            connection.disconnect().await;
            self.stats.disconnects = self.stats.disconnects.wrapping_add(1);
            info!("LINK: disconnected from {}", peer);
        }
    }

    fn enter(&mut self, next: LinkPhase) {
        if next != self.phase {
            debug!("LINK: {} -> {}", self.phase, next);
            let from = core::mem::replace(&mut self.phase, next);
            self.sink.emit(&AppEvent::PhaseChanged { from, to: next });
        }
    }
}

/// Race `op` against `delay`; the delay winning yields `timeout_error`.
async fn with_timeout<D, T, F>(
    delay: &D,
    limit: Duration,
    timeout_error: LinkError,
    op: F,
) -> Result<T, LinkError>
where
    D: Delay,
    F: Future<Output = Result<T, LinkError>>,
{
    future::or(op, async {
        delay.sleep(limit).await;
        Err(timeout_error)
    })
    .await
}
