//! Integration tests for the receiver pipeline:
//! radio → TelemetryLink → TripLatch → valve.
//!
//! The link is driven one transition at a time with `step()`, so every
//! intermediate phase, backoff and valve write can be asserted.

use std::time::Duration;

use futures_lite::future::block_on;

use thermovalve::app::events::AppEvent;
use thermovalve::config::LinkConfig;
use thermovalve::error::LinkError;
use thermovalve::link::{LinkPhase, TelemetryLink};
use thermovalve::protocol::payload::encode;
use thermovalve::protocol::{CHAR_TELEMETRY, SERVICE_UUID};
use thermovalve::trip::{TripLatch, TripState};

use crate::mock_radio::{
    EventLog, LinkScript, MockCentral, MockDelay, RadioCall, RecordingValve, SENSOR_PEER, Step,
};

type Link<'a> = TelemetryLink<'a, MockCentral, MockDelay, RecordingValve, EventLog>;

fn make_link<'a>(
    radio: MockCentral,
    delay: &'a MockDelay,
    trip: &'a TripState<RecordingValve>,
) -> Link<'a> {
    TelemetryLink::new(
        radio,
        delay,
        TripLatch::new(trip),
        EventLog::new(),
        LinkConfig::default(),
    )
}

fn step(link: &mut Link<'_>) -> LinkPhase {
    block_on(link.step())
}

fn reach_streaming(link: &mut Link<'_>) {
    for _ in 0..4 {
        step(link);
    }
    assert_eq!(link.phase(), LinkPhase::Streaming);
}

fn body(temperature: f32, threshold: f32) -> Vec<u8> {
    encode(temperature, threshold).to_vec()
}

fn valve_level(trip: &TripState<RecordingValve>) -> Option<bool> {
    trip.with_valve(|v| v.level())
}

// ── Happy path ────────────────────────────────────────────────

#[test]
fn connects_subscribes_and_walks_every_phase() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let radio = MockCentral::new().with_session(LinkScript::streaming([body(70.0, 104.0)]));
    let mut link = make_link(radio, &delay, &trip);

    assert_eq!(link.phase(), LinkPhase::Idle);
    assert_eq!(step(&mut link), LinkPhase::Scanning);
    assert_eq!(step(&mut link), LinkPhase::Connecting);
    assert_eq!(step(&mut link), LinkPhase::Subscribing);
    assert_eq!(step(&mut link), LinkPhase::Streaming);

    assert_eq!(
        link.radio().calls(),
        vec![
            RadioCall::Scan {
                service: SERVICE_UUID
            },
            RadioCall::Connect(SENSOR_PEER),
            RadioCall::Subscribe {
                service: SERVICE_UUID,
                characteristic: CHAR_TELEMETRY
            },
        ]
    );

    let phases: Vec<_> = link
        .sink()
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::PhaseChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            LinkPhase::Scanning,
            LinkPhase::Connecting,
            LinkPhase::Subscribing,
            LinkPhase::Streaming
        ]
    );
    assert!(link.sink().events.contains(&AppEvent::Connected(SENSOR_PEER)));
    assert_eq!(link.stats().connections, 1);
    assert!(delay.sleeps().is_empty(), "no backoff on the happy path");
}

#[test]
fn reading_at_threshold_trips_the_valve() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let radio = MockCentral::new().with_session(LinkScript::streaming([body(104.0, 104.0)]));
    let mut link = make_link(radio, &delay, &trip);

    reach_streaming(&mut link);
    assert!(!trip.is_tripped());

    step(&mut link);

    assert!(trip.is_tripped());
    assert_eq!(valve_level(&trip), Some(true));
    assert_eq!(
        link.sink().events.last(),
        Some(&AppEvent::Reading {
            temperature: 104.0,
            threshold: 104.0,
            tripped: true
        })
    );
    assert_eq!(link.stats().payloads, 1);
}

#[test]
fn safe_reading_never_untrips() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let radio = MockCentral::new().with_session(LinkScript::streaming([
        body(120.0, 104.0),
        body(90.0, 104.0),
        body(-40.0, 104.0),
    ]));
    let mut link = make_link(radio, &delay, &trip);

    reach_streaming(&mut link);
    step(&mut link);
    step(&mut link);
    step(&mut link);

    assert!(trip.is_tripped());
    assert_eq!(valve_level(&trip), Some(true));
    assert_eq!(link.stats().payloads, 3);
}

#[test]
fn safe_readings_keep_valve_open() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let radio = MockCentral::new()
        .with_session(LinkScript::streaming([body(70.0, 104.0), body(103.9, 104.0)]));
    let mut link = make_link(radio, &delay, &trip);

    reach_streaming(&mut link);
    step(&mut link);
    step(&mut link);

    assert!(!trip.is_tripped());
    assert!(trip.with_valve(|v| v.writes.iter().all(|w| !w)));
}

// ── Invalid data ──────────────────────────────────────────────

#[test]
fn short_notification_clears_trip_and_keeps_streaming() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let radio = MockCentral::new().with_session(LinkScript::streaming([
        body(110.0, 104.0),
        vec![0u8; 6],
        body(50.0, 104.0),
    ]));
    let mut link = make_link(radio, &delay, &trip);

    reach_streaming(&mut link);
    step(&mut link);
    assert!(trip.is_tripped());

    assert_eq!(step(&mut link), LinkPhase::Streaming);
    assert!(!trip.is_tripped());
    assert_eq!(valve_level(&trip), Some(false));
    assert_eq!(
        link.sink().events.last(),
        Some(&AppEvent::InvalidPayload { len: 6 })
    );

    // The link carries on with the next notification.
    assert_eq!(step(&mut link), LinkPhase::Streaming);
    assert!(!trip.is_tripped());
    assert_eq!(link.stats().invalid_payloads, 1);
    assert_eq!(link.stats().faults(LinkError::MalformedPayload), 1);
    assert_eq!(link.radio().disconnects(), 0);
}

#[test]
fn oversized_notification_reports_true_length() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let radio = MockCentral::new().with_session(LinkScript::streaming([vec![0xAA; 40]]));
    let mut link = make_link(radio, &delay, &trip);

    reach_streaming(&mut link);
    step(&mut link);

    assert_eq!(
        link.sink().events.last(),
        Some(&AppEvent::InvalidPayload { len: 40 })
    );
    assert!(!trip.is_tripped());
}

#[test]
fn nine_byte_notification_is_rejected() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let mut long = body(200.0, 104.0);
    long.push(0);
    let radio = MockCentral::new().with_session(LinkScript::streaming([long]));
    let mut link = make_link(radio, &delay, &trip);

    reach_streaming(&mut link);
    step(&mut link);

    assert!(!trip.is_tripped(), "a 9-byte body must not trip");
    assert_eq!(link.stats().payloads, 0);
    assert_eq!(link.stats().invalid_payloads, 1);
}

#[test]
fn nan_temperature_is_treated_as_invalid() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let radio = MockCentral::new()
        .with_session(LinkScript::streaming([body(120.0, 104.0), body(f32::NAN, 104.0)]));
    let mut link = make_link(radio, &delay, &trip);

    reach_streaming(&mut link);
    step(&mut link);
    step(&mut link);

    assert!(!trip.is_tripped());
    assert_eq!(
        link.sink().events.last(),
        Some(&AppEvent::InvalidPayload { len: 8 })
    );
}

// ── Recovery ──────────────────────────────────────────────────

#[test]
fn disconnect_mid_stream_backs_off_then_resumes() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let radio = MockCentral::new()
        .with_session(
            LinkScript::streaming([body(105.0, 104.0)]).then_fail(LinkError::UnexpectedDisconnect),
        )
        .with_session(LinkScript::streaming([body(60.0, 104.0)]));
    let mut link = make_link(radio, &delay, &trip);

    reach_streaming(&mut link);
    step(&mut link);
    assert!(trip.is_tripped());

    // Peer vanishes: tear down, back off, return to Idle.
    assert_eq!(step(&mut link), LinkPhase::Idle);
    assert_eq!(delay.sleeps(), vec![Duration::from_secs(5)]);
    assert_eq!(link.radio().disconnects(), 1);
    assert_eq!(link.stats().disconnects, 1);
    assert_eq!(link.stats().faults(LinkError::UnexpectedDisconnect), 1);
    assert!(
        link.sink()
            .events
            .contains(&AppEvent::Fault(LinkError::UnexpectedDisconnect))
    );
    assert!(link.sink().events.contains(&AppEvent::PhaseChanged {
        from: LinkPhase::Streaming,
        to: LinkPhase::Disconnecting
    }));

    // The trip survives the reconnect.
    assert!(trip.is_tripped());

    reach_streaming(&mut link);
    step(&mut link);
    assert!(trip.is_tripped(), "safe reading after reconnect must not untrip");
    assert_eq!(link.stats().connections, 2);
    assert_eq!(link.stats().payloads, 2);
}

#[test]
fn teardown_passes_through_disconnecting_within_one_step() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let radio = MockCentral::new().with_session(
        LinkScript::streaming([body(60.0, 104.0)]).then_fail(LinkError::RadioTransientError),
    );
    let mut link = make_link(radio, &delay, &trip);

    reach_streaming(&mut link);
    step(&mut link);
    let before = link.sink().events.len();

    assert_eq!(step(&mut link), LinkPhase::Idle);
    assert_eq!(link.phase(), LinkPhase::Idle);
    let phases: Vec<_> = link.sink().events[before..]
        .iter()
        .filter_map(|e| match e {
            AppEvent::PhaseChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            (LinkPhase::Streaming, LinkPhase::Disconnecting),
            (LinkPhase::Disconnecting, LinkPhase::Idle),
        ]
    );
    assert_eq!(link.radio().disconnects(), 1);
    assert_eq!(step(&mut link), LinkPhase::Scanning);
}

#[test]
fn empty_scan_window_waits_rescan_delay() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let mut radio = MockCentral::new();
    radio.scans.push_back(Step::Err(LinkError::ScanTimeout));
    let mut link = make_link(radio, &delay, &trip);

    step(&mut link);
    assert_eq!(step(&mut link), LinkPhase::Idle);

    assert_eq!(delay.sleeps(), vec![Duration::from_secs(2)]);
    assert_eq!(link.stats().faults(LinkError::ScanTimeout), 1);
    assert_eq!(link.radio().disconnects(), 0);
}

#[test]
fn silent_scan_is_bounded_by_the_scan_window() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let mut radio = MockCentral::new();
    radio.scans.push_back(Step::Hang);
    let mut link = make_link(radio, &delay, &trip);

    step(&mut link);
    assert_eq!(step(&mut link), LinkPhase::Idle);

    assert_eq!(
        delay.sleeps(),
        vec![Duration::from_secs(10), Duration::from_secs(2)],
        "scan window, then rescan delay"
    );
    assert!(
        link.sink()
            .events
            .contains(&AppEvent::Fault(LinkError::ScanTimeout))
    );
}

#[test]
fn stalled_connect_times_out_and_backs_off() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let mut radio = MockCentral::new();
    radio.scans.push_back(Step::Ok(SENSOR_PEER));
    radio.links.push_back(Step::Hang);
    let mut link = make_link(radio, &delay, &trip);

    step(&mut link);
    step(&mut link);
    assert_eq!(step(&mut link), LinkPhase::Idle);

    assert_eq!(
        delay.sleeps(),
        vec![Duration::from_secs(10), Duration::from_secs(5)],
        "connect timeout, then retry backoff"
    );
    assert_eq!(link.stats().faults(LinkError::ConnectTimeout), 1);
    assert_eq!(link.stats().connections, 0);
}

#[test]
fn subscription_failure_disconnects_before_backoff() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let radio = MockCentral::new().with_session(LinkScript {
        subscribe: Step::Err(LinkError::SubscriptionFailure),
        notifications: Default::default(),
    });
    let mut link = make_link(radio, &delay, &trip);

    step(&mut link);
    step(&mut link);
    step(&mut link);
    assert_eq!(step(&mut link), LinkPhase::Idle);

    assert_eq!(link.radio().disconnects(), 1);
    assert_eq!(delay.sleeps(), vec![Duration::from_secs(5)]);
    assert_eq!(link.stats().faults(LinkError::SubscriptionFailure), 1);
}

#[test]
fn radio_error_while_streaming_leaves_trip_untouched() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let radio = MockCentral::new().with_session(
        LinkScript::streaming([body(100.0, 104.0)]).then_fail(LinkError::RadioTransientError),
    );
    let mut link = make_link(radio, &delay, &trip);

    reach_streaming(&mut link);
    step(&mut link);
    step(&mut link);

    assert!(!trip.is_tripped());
    assert_eq!(link.phase(), LinkPhase::Idle);
    assert_eq!(link.stats().faults(LinkError::RadioTransientError), 1);
    assert_eq!(link.stats().invalid_payloads, 0);
}
