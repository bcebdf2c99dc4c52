//! Valve-disable output.
//!
//! One GPIO drives the valve relay and the indicator LED in parallel.
//! HIGH = tripped (valve disabled), LOW = normal operation.
//!
//! The driver is dumb: it writes whatever the trip state says, as often as
//! it is told to.  Redundant writes are harmless and keep the pin honest if
//! something else glitches it.

use embedded_hal::digital::OutputPin;
use log::error;

use crate::app::ports::ValvePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveState {
    Open,
    Tripped,
}

pub struct ValveDriver<P> {
    pin: P,
    state: ValveState,
    write_errors: u32,
}

impl<P: OutputPin> ValveDriver<P> {
    /// Take the pin and drive it low.
    pub fn new(mut pin: P) -> Self {
        let write_errors = u32::from(pin.set_low().is_err());
        Self {
            pin,
            state: ValveState::Open,
            write_errors,
        }
    }

    pub fn state(&self) -> ValveState {
        self.state
    }

    pub fn write_errors(&self) -> u32 {
        self.write_errors
    }
}

impl<P: OutputPin> ValvePort for ValveDriver<P> {
    fn set_output(&mut self, tripped: bool) {
        let result = if tripped {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if result.is_err() {
            self.write_errors = self.write_errors.saturating_add(1);
            error!("VALVE: GPIO write failed (tripped={})", tripped);
            return;
        }
        self.state = if tripped {
            ValveState::Tripped
        } else {
            ValveState::Open
        };
    }
}
