//! Polled reset-button debouncer.
//!
//! ## Hardware
//!
//! Momentary switch read as a plain GPIO level (active-low with pull-up on
//! the valve board).  No interrupt: the input is sampled at a fixed
//! `poll_interval`, which also bounds contact bounce.
//!
//! ## State machine
//!
//! | State      | Input     | Action                               | Next                |
//! |------------|-----------|--------------------------------------|---------------------|
//! | `Armed`    | pressed   | clear trip state, valve off          | `Held`              |
//! | `Held`     | pressed   | —                                    | `Held`              |
//! | `Held`     | released  | start release window at 0 ms         | `Settling`          |
//! | `Settling` | pressed   | —                                    | `Held`              |
//! | `Settling` | released  | window += poll; re-arm when complete | `Settling`/`Armed`  |
//!
//! One press is one clear, however long it is held or however much the
//! contacts bounce on release.

use embedded_hal::digital::InputPin;
use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::{Delay, EventSink, ResetInput, ValvePort};
use crate::config::ResetConfig;
use crate::trip::TripState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebounceState {
    Armed,
    Held,
    Settling { released_ms: u32 },
}

/// Watches the reset input and clears the trip state on each debounced press.
pub struct ResetDebouncer<'a, V, I, S> {
    trip: &'a TripState<V>,
    input: I,
    sink: S,
    config: ResetConfig,
    state: DebounceState,
    presses: u32,
}

impl<'a, V, I, S> ResetDebouncer<'a, V, I, S>
where
    V: ValvePort,
    I: ResetInput,
    S: EventSink,
{
    pub fn new(trip: &'a TripState<V>, input: I, sink: S, config: ResetConfig) -> Self {
        Self {
            trip,
            input,
            sink,
            config,
            state: DebounceState::Armed,
            presses: 0,
        }
    }

    /// Sample the input once.  Returns `true` when this poll issued a clear.
    pub fn poll(&mut self) -> bool {
        let pressed = self.input.is_pressed();

        match self.state {
            DebounceState::Armed => {
                if pressed {
                    let was_tripped = self.trip.clear();
                    self.state = DebounceState::Held;
                    self.presses = self.presses.wrapping_add(1);
                    info!("RESET: press accepted (was tripped: {})", was_tripped);
                    self.sink.emit(&AppEvent::ResetPressed);
                    return true;
                }
            }

            DebounceState::Held => {
                // First released sample: nothing has been observed stable yet.
                if !pressed {
                    self.state = DebounceState::Settling { released_ms: 0 };
                }
            }

            DebounceState::Settling { released_ms } => {
                self.state = if pressed {
                    DebounceState::Held
                } else {
                    self.settle(released_ms)
                };
            }
        }

        false
    }

    /// Poll forever at the configured cadence.
    pub async fn run<D: Delay>(&mut self, delay: &D) {
        let interval = self.config.poll_interval();
        loop {
            self.poll();
            delay.sleep(interval).await;
        }
    }

    /// Debounced presses accepted so far.
    pub fn presses(&self) -> u32 {
        self.presses
    }

    /// `true` while a new press would be accepted.
    pub fn is_armed(&self) -> bool {
        self.state == DebounceState::Armed
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn settle(&self, released_ms: u32) -> DebounceState {
        let released_ms = released_ms.saturating_add(self.config.poll_interval_ms);
        if released_ms >= self.config.release_stable_ms {
            DebounceState::Armed
        } else {
            DebounceState::Settling { released_ms }
        }
    }
}

/// GPIO-backed [`ResetInput`].
pub struct ResetButton<P> {
    pin: P,
    active_low: bool,
}

impl<P: InputPin> ResetButton<P> {
    /// Pulled-up switch to ground.
    pub fn active_low(pin: P) -> Self {
        Self {
            pin,
            active_low: true,
        }
    }

    pub fn active_high(pin: P) -> Self {
        Self {
            pin,
            active_low: false,
        }
    }
}

impl<P: InputPin> ResetInput for ResetButton<P> {
    fn is_pressed(&mut self) -> bool {
        // A read error counts as "not pressed": a flaky input must never
        // look like an operator command.
        let high = match self.pin.is_high() {
            Ok(high) => high,
            Err(_) => return false,
        };
        high != self.active_low
    }
}
