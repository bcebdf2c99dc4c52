//! Trip-threshold potentiometer.
//!
//! Wiper on an ADC channel; the 12-bit span maps linearly onto the
//! configured °F range.  A failed conversion keeps the last good value
//! (the configured default until the first success), so a flaky pot can
//! never produce a nonsense threshold on the wire.

use log::warn;

use crate::app::ports::ThresholdSource;
use crate::config::TransmitterConfig;

use super::{ADC_MAX, AdcReader};

pub struct ThresholdPot<A> {
    adc: A,
    min_f: f32,
    max_f: f32,
    last_f: f32,
}

impl<A: AdcReader> ThresholdPot<A> {
    pub fn new(adc: A, config: &TransmitterConfig) -> Self {
        Self {
            adc,
            min_f: config.threshold_min_f,
            max_f: config.threshold_max_f,
            last_f: config.default_threshold_f,
        }
    }

    fn scale(&self, raw: u16) -> f32 {
        let frac = raw.min(ADC_MAX) as f32 / ADC_MAX as f32;
        self.min_f + frac * (self.max_f - self.min_f)
    }
}

impl<A: AdcReader> ThresholdSource for ThresholdPot<A> {
    fn read_threshold(&mut self) -> f32 {
        match self.adc.read_raw() {
            Ok(raw) => self.last_f = self.scale(raw),
            Err(e) => warn!("TX: threshold pot read failed ({}), holding {:.1}", e, self.last_f),
        }
        self.last_f
    }
}

/// Fixed threshold for builds without a potentiometer.
pub struct FixedThreshold(pub f32);

impl ThresholdSource for FixedThreshold {
    fn read_threshold(&mut self) -> f32 {
        self.0
    }
}
