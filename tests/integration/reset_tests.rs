//! Integration tests for the reset path: button → ResetDebouncer →
//! shared TripState, interleaved with the telemetry link.

use futures_lite::future::block_on;

use thermovalve::app::events::AppEvent;
use thermovalve::config::{LinkConfig, ResetConfig};
use thermovalve::drivers::button::ResetDebouncer;
use thermovalve::link::{LinkPhase, TelemetryLink};
use thermovalve::protocol::payload::encode;
use thermovalve::trip::{TripLatch, TripState};

use crate::mock_radio::{EventLog, LinkScript, MockCentral, MockDelay, RecordingValve, ScriptedButton};

fn debouncer<'a>(
    trip: &'a TripState<RecordingValve>,
    levels: impl IntoIterator<Item = bool>,
) -> ResetDebouncer<'a, RecordingValve, ScriptedButton, EventLog> {
    ResetDebouncer::new(
        trip,
        ScriptedButton::new(levels),
        EventLog::new(),
        ResetConfig::default(),
    )
}

#[test]
fn held_button_clears_exactly_once() {
    let trip = TripState::new(RecordingValve::new());
    trip.trip();
    let mut reset = debouncer(&trip, [true; 20]);

    let clears = (0..20).filter(|_| reset.poll()).count();

    assert_eq!(clears, 1);
    assert_eq!(reset.presses(), 1);
    assert!(!trip.is_tripped());
    assert_eq!(trip.with_valve(|v| v.level()), Some(false));
    assert_eq!(
        reset.sink().count(|e| *e == AppEvent::ResetPressed),
        1
    );
}

#[test]
fn press_while_untripped_is_harmless() {
    let trip = TripState::new(RecordingValve::new());
    let mut reset = debouncer(&trip, [true]);

    assert!(reset.poll());
    assert!(!trip.is_tripped());
    assert_eq!(trip.with_valve(|v| v.level()), Some(false));
}

#[test]
fn retrip_while_held_is_not_cleared_until_next_press() {
    let trip = TripState::new(RecordingValve::new());
    trip.trip();
    // press, hold, hold, release for the stable window, press again
    let mut reset = debouncer(&trip, [true, true, true, false, false, false, true]);

    assert!(reset.poll());
    assert!(!trip.is_tripped());

    // Over-temperature arrives while the button is still down.
    trip.trip();
    assert!(!reset.poll());
    assert!(!reset.poll());
    assert!(trip.is_tripped(), "a held button must not keep clearing");

    assert!(!reset.poll());
    assert!(!reset.poll());
    assert!(!reset.is_armed(), "released for only 50 ms");
    assert!(!reset.poll());
    assert!(reset.is_armed());

    assert!(reset.poll());
    assert!(!trip.is_tripped());
    assert_eq!(reset.presses(), 2);
}

#[test]
fn bounce_after_one_released_sample_is_not_a_press() {
    let trip = TripState::new(RecordingValve::new());
    trip.trip();
    let mut reset = ResetDebouncer::new(
        &trip,
        ScriptedButton::new([true, false, true, false, false]),
        EventLog::new(),
        ResetConfig {
            poll_interval_ms: 50,
            release_stable_ms: 50,
        },
    );

    assert!(reset.poll());
    trip.trip();
    assert!(!reset.poll());
    assert!(!reset.poll(), "one released sample must not re-arm");
    assert!(trip.is_tripped());
    assert_eq!(reset.presses(), 1);
}

#[test]
fn release_bounce_does_not_count_as_second_press() {
    let trip = TripState::new(RecordingValve::new());
    let mut reset = debouncer(&trip, [true, false, true, false, true, false, false, false]);

    let clears = (0..8).filter(|_| reset.poll()).count();

    assert_eq!(clears, 1);
    assert!(reset.is_armed());
}

#[test]
fn reset_then_stream_retrips_on_next_hot_reading() {
    let trip = TripState::new(RecordingValve::new());
    let delay = MockDelay::new();
    let radio = MockCentral::new().with_session(LinkScript::streaming([
        encode(110.0, 104.0).to_vec(),
        encode(90.0, 104.0).to_vec(),
        encode(104.5, 104.0).to_vec(),
    ]));
    let mut link = TelemetryLink::new(
        radio,
        &delay,
        TripLatch::new(&trip),
        EventLog::new(),
        LinkConfig::default(),
    );
    let mut reset = debouncer(&trip, [true]);

    for _ in 0..4 {
        block_on(link.step());
    }
    assert_eq!(link.phase(), LinkPhase::Streaming);

    block_on(link.step());
    assert!(trip.is_tripped());

    assert!(reset.poll());
    assert!(!trip.is_tripped());

    // Safe reading leaves it cleared.
    block_on(link.step());
    assert!(!trip.is_tripped());
    assert_eq!(trip.with_valve(|v| v.level()), Some(false));

    // Hot again: trips again.
    block_on(link.step());
    assert!(trip.is_tripped());
    assert_eq!(trip.with_valve(|v| v.level()), Some(true));
}
