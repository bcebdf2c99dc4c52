//! Trip state and trip latch.
//!
//! [`TripState`] is the one piece of state shared between the two
//! concurrent activities: the telemetry link (through [`TripLatch`]) sets
//! it, the reset debouncer clears it.  The flag and the valve pin are
//! written together under one critical section, so a reader never sees a
//! flag that disagrees with the output it drove.
//!
//! ## Latch rules
//!
//! | Input                       | Trip state after | Valve write |
//! |-----------------------------|------------------|-------------|
//! | `temperature >= threshold`  | `true`           | `true`      |
//! | `temperature <  threshold`  | unchanged        | current     |
//! | invalid payload             | `false`          | `false`     |
//! | debounced reset press       | `false`          | `false`     |
//!
//! A safe reading never un-trips the valve.  An invalid payload *does*:
//! the deployed system prefers "do not close on noise" over "a glitch may
//! mask a real trip".  That is a safety-policy decision owned by the
//! process engineers; do not flip it here.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{info, warn};

use crate::app::ports::ValvePort;

/// Latched valve-disable flag plus the valve it drives.
pub struct TripState<V> {
    tripped: AtomicBool,
    valve: Mutex<CriticalSectionRawMutex, RefCell<V>>,
}

impl<V: ValvePort> TripState<V> {
    /// Start untripped.  The valve is driven low immediately so the pin
    /// matches the flag from the first instant.
    pub fn new(mut valve: V) -> Self {
        valve.set_output(false);
        Self {
            tripped: AtomicBool::new(false),
            valve: Mutex::new(RefCell::new(valve)),
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// Set the flag and drive the valve high.  Returns the previous flag.
    pub fn trip(&self) -> bool {
        self.write(true)
    }

    /// Clear the flag and drive the valve low.  Returns the previous flag.
    pub fn clear(&self) -> bool {
        self.write(false)
    }

    /// Re-drive the valve with the current flag.
    pub fn refresh(&self) -> bool {
        self.valve.lock(|valve| {
            let tripped = self.tripped.load(Ordering::Acquire);
            valve.borrow_mut().set_output(tripped);
            tripped
        })
    }

    /// Inspect the valve adapter (diagnostics and tests).
    pub fn with_valve<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        self.valve.lock(|valve| f(&valve.borrow()))
    }

    fn write(&self, tripped: bool) -> bool {
        self.valve.lock(|valve| {
            let previous = self.tripped.swap(tripped, Ordering::AcqRel);
            valve.borrow_mut().set_output(tripped);
            previous
        })
    }
}

/// Converts readings into trip-state updates.
pub struct TripLatch<'a, V> {
    state: &'a TripState<V>,
}

impl<'a, V: ValvePort> TripLatch<'a, V> {
    pub fn new(state: &'a TripState<V>) -> Self {
        Self { state }
    }

    /// Apply one valid reading.  Returns the trip state afterwards.
    pub fn observe(&mut self, temperature: f32, threshold: f32) -> bool {
        if temperature >= threshold {
            if !self.state.trip() {
                warn!(
                    "LATCH: tripped ({:.2} >= {:.2}), valve disabled",
                    temperature, threshold
                );
            }
            true
        } else {
            self.state.refresh()
        }
    }

    /// Apply a malformed / unusable payload: clear the latch.
    pub fn observe_invalid(&mut self) -> bool {
        if self.state.clear() {
            warn!("LATCH: invalid data cleared an active trip");
        } else {
            info!("LATCH: invalid data, valve held off");
        }
        false
    }

    pub fn state(&self) -> &'a TripState<V> {
        self.state
    }
}
