//! Mock adapters for integration tests.
//!
//! The radios play back a script: every scan, connect, subscribe and
//! notification outcome is queued up front.  A [`Step::Hang`] never
//! resolves, so the caller's own timeout has to fire.  Every call is
//! recorded so tests can assert on the full radio history.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use futures_lite::future;

use thermovalve::app::events::AppEvent;
use thermovalve::app::ports::{
    AddrKind, Central, DangerIndicator, Delay, EventSink, GattConnection, NotifySession, PeerAddress, Peripheral,
    ResetInput, TemperatureSource, ValvePort,
};
use thermovalve::error::{LinkError, SensorError};
use thermovalve::protocol::advert::AdvertisingData;

pub const SENSOR_PEER: PeerAddress = PeerAddress {
    addr: [0x24, 0x6F, 0x28, 0x1A, 0x2B, 0x3C],
    kind: AddrKind::Public,
};

// ── Scripted outcomes ─────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Step<T> {
    Ok(T),
    Err(LinkError),
    Hang,
}

impl<T> Step<T> {
    async fn resolve(self) -> Result<T, LinkError> {
        match self {
            Step::Ok(value) => Ok(value),
            Step::Err(e) => Err(e),
            Step::Hang => future::pending().await,
        }
    }
}

/// Everything one connection will do, in order.
#[derive(Debug, Clone)]
pub struct LinkScript {
    pub subscribe: Step<()>,
    pub notifications: VecDeque<Step<Vec<u8>>>,
}

impl LinkScript {
    /// Subscribes fine, then delivers `bodies`.
    pub fn streaming(bodies: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            subscribe: Step::Ok(()),
            notifications: bodies.into_iter().map(Step::Ok).collect(),
        }
    }

    /// Append a terminal failure after the bodies.
    pub fn then_fail(mut self, error: LinkError) -> Self {
        self.notifications.push_back(Step::Err(error));
        self
    }
}

// ── Radio call record ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RadioCall {
    Scan { service: u128 },
    Connect(PeerAddress),
    Subscribe { service: u128, characteristic: u128 },
    Disconnect(PeerAddress),
}

pub type CallLog = Rc<RefCell<Vec<RadioCall>>>;

// ── MockCentral ───────────────────────────────────────────────

pub struct MockCentral {
    pub scans: VecDeque<Step<PeerAddress>>,
    pub links: VecDeque<Step<LinkScript>>,
    pub calls: CallLog,
}

impl MockCentral {
    pub fn new() -> Self {
        Self {
            scans: VecDeque::new(),
            links: VecDeque::new(),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// One successful scan + connect delivering `script`.
    pub fn with_session(mut self, script: LinkScript) -> Self {
        self.scans.push_back(Step::Ok(SENSOR_PEER));
        self.links.push_back(Step::Ok(script));
        self
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        self.calls.borrow().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, RadioCall::Disconnect(_)))
            .count()
    }
}

impl Central for MockCentral {
    type Connection = MockConnection;

    async fn scan(&mut self, service: u128, _window: Duration) -> Result<PeerAddress, LinkError> {
        self.calls.borrow_mut().push(RadioCall::Scan { service });
        let step = self
            .scans
            .pop_front()
            .unwrap_or(Step::Err(LinkError::ScanTimeout));
        step.resolve().await
    }

    async fn connect(
        &mut self,
        peer: &PeerAddress,
        _timeout: Duration,
    ) -> Result<MockConnection, LinkError> {
        self.calls.borrow_mut().push(RadioCall::Connect(*peer));
        let step = self
            .links
            .pop_front()
            .unwrap_or(Step::Err(LinkError::ConnectTimeout));
        let script = step.resolve().await?;
        Ok(MockConnection {
            peer: *peer,
            script,
            calls: Rc::clone(&self.calls),
        })
    }
}

pub struct MockConnection {
    peer: PeerAddress,
    script: LinkScript,
    calls: CallLog,
}

impl GattConnection for MockConnection {
    fn peer(&self) -> PeerAddress {
        self.peer
    }

    async fn subscribe(&mut self, service: u128, characteristic: u128) -> Result<(), LinkError> {
        self.calls.borrow_mut().push(RadioCall::Subscribe {
            service,
            characteristic,
        });
        core::mem::replace(&mut self.script.subscribe, Step::Ok(()))
            .resolve()
            .await
    }

    async fn next_notification(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        // An exhausted script looks like the peer walking away.
        let step = self
            .script
            .notifications
            .pop_front()
            .unwrap_or(Step::Err(LinkError::UnexpectedDisconnect));
        let body = step.resolve().await?;
        let n = body.len().min(buf.len());
        buf[..n].copy_from_slice(&body[..n]);
        Ok(body.len())
    }

    async fn disconnect(self) {
        self.calls.borrow_mut().push(RadioCall::Disconnect(self.peer));
    }
}

// ── MockPeripheral ────────────────────────────────────────────

/// One scripted central session: accepts `accept` notifications, then
/// fails the next one with `then`.
#[derive(Debug, Clone)]
pub struct SessionScript {
    pub accept: usize,
    pub then: LinkError,
}

pub type NotifyLog = Rc<RefCell<Vec<Vec<u8>>>>;

pub struct MockPeripheral {
    pub sessions: VecDeque<Step<SessionScript>>,
    pub adverts: Vec<AdvertisingData>,
    pub sent: NotifyLog,
}

impl MockPeripheral {
    pub fn new(sessions: impl IntoIterator<Item = Step<SessionScript>>) -> Self {
        Self {
            sessions: sessions.into_iter().collect(),
            adverts: Vec::new(),
            sent: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.borrow().clone()
    }
}

impl Peripheral for MockPeripheral {
    type Session = MockSession;

    async fn advertise(&mut self, data: &AdvertisingData) -> Result<MockSession, LinkError> {
        self.adverts.push(data.clone());
        let step = self.sessions.pop_front().unwrap_or(Step::Hang);
        let script = step.resolve().await?;
        Ok(MockSession {
            script,
            sent: Rc::clone(&self.sent),
        })
    }
}

pub struct MockSession {
    script: SessionScript,
    sent: NotifyLog,
}

impl NotifySession for MockSession {
    async fn notify(&mut self, value: &[u8]) -> Result<(), LinkError> {
        if self.script.accept == 0 {
            return Err(self.script.then);
        }
        self.script.accept -= 1;
        self.sent.borrow_mut().push(value.to_vec());
        Ok(())
    }

    /// The central is gone once the accepted notifications are used up.
    fn check_link(&mut self) -> Result<(), LinkError> {
        if self.script.accept == 0 {
            return Err(self.script.then);
        }
        Ok(())
    }
}

// ── Timing ────────────────────────────────────────────────────

/// Records every requested sleep and returns after one yield.
#[derive(Default)]
pub struct MockDelay {
    pub sleeps: RefCell<Vec<Duration>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    pub fn last(&self) -> Option<Duration> {
        self.sleeps.borrow().last().copied()
    }

    pub fn clear(&self) {
        self.sleeps.borrow_mut().clear();
    }
}

impl Delay for MockDelay {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        future::yield_now().await;
    }
}

// ── Valve / inputs ────────────────────────────────────────────

/// Records every level written to the valve.
#[derive(Debug, Default)]
pub struct RecordingValve {
    pub writes: Vec<bool>,
}

impl RecordingValve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> Option<bool> {
        self.writes.last().copied()
    }
}

impl ValvePort for RecordingValve {
    fn set_output(&mut self, tripped: bool) {
        self.writes.push(tripped);
    }
}

/// Records every danger level shown on the lamps.
#[derive(Debug, Default)]
pub struct RecordingIndicator {
    pub writes: Vec<bool>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DangerIndicator for RecordingIndicator {
    fn set_danger(&mut self, danger: bool) {
        self.writes.push(danger);
    }
}

/// Reset button that plays back a level sequence, then holds the last one.
pub struct ScriptedButton {
    levels: VecDeque<bool>,
    last: bool,
}

impl ScriptedButton {
    pub fn new(levels: impl IntoIterator<Item = bool>) -> Self {
        Self {
            levels: levels.into_iter().collect(),
            last: false,
        }
    }
}

impl ResetInput for ScriptedButton {
    fn is_pressed(&mut self) -> bool {
        if let Some(level) = self.levels.pop_front() {
            self.last = level;
        }
        self.last
    }
}

/// Temperature probe that plays back readings (°C), then repeats the
/// last good one.
pub struct ScriptedProbe {
    readings: VecDeque<Result<f32, SensorError>>,
    last_good: f32,
}

impl ScriptedProbe {
    pub fn new(readings: impl IntoIterator<Item = Result<f32, SensorError>>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
            last_good: 20.0,
        }
    }

    /// Always reads 20 °C.
    pub fn steady() -> Self {
        Self::new(Vec::<Result<f32, SensorError>>::new())
    }
}

impl TemperatureSource for ScriptedProbe {
    async fn read_temperature(&mut self) -> Result<f32, SensorError> {
        match self.readings.pop_front() {
            Some(Ok(c)) => {
                self.last_good = c;
                Ok(c)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last_good),
        }
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<AppEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
