//! Danger / safe lamps on the sensing node.
//!
//! Two GPIOs: red lit while the local reading is at or above the threshold,
//! green otherwise.  Exactly one is lit after every successful update.

use embedded_hal::digital::OutputPin;
use log::error;

use crate::app::ports::DangerIndicator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lamp {
    Safe,
    Danger,
}

pub struct DangerLeds<R, G> {
    red: R,
    green: G,
    lamp: Lamp,
    write_errors: u32,
}

impl<R: OutputPin, G: OutputPin> DangerLeds<R, G> {
    /// Take both pins and show safe.
    pub fn new(red: R, green: G) -> Self {
        let mut leds = Self {
            red,
            green,
            lamp: Lamp::Safe,
            write_errors: 0,
        };
        leds.show(false);
        leds
    }

    pub fn lamp(&self) -> Lamp {
        self.lamp
    }

    pub fn write_errors(&self) -> u32 {
        self.write_errors
    }

    fn show(&mut self, danger: bool) -> bool {
        let red = if danger {
            self.red.set_high().is_ok()
        } else {
            self.red.set_low().is_ok()
        };
        let green = if danger {
            self.green.set_low().is_ok()
        } else {
            self.green.set_high().is_ok()
        };
        let failed = u32::from(!red) + u32::from(!green);
        self.write_errors = self.write_errors.saturating_add(failed);
        failed == 0
    }
}

impl<R: OutputPin, G: OutputPin> DangerIndicator for DangerLeds<R, G> {
    fn set_danger(&mut self, danger: bool) {
        if !self.show(danger) {
            error!("LEDS: GPIO write failed (danger={})", danger);
            return;
        }
        self.lamp = if danger { Lamp::Danger } else { Lamp::Safe };
    }
}
