//! NTC thermistor probe (10 kΩ @ 25 °C, B = 3950).
//!
//! Wired as the low side of a divider with a fixed 10 kΩ resistor to the
//! 3.3 V rail.  The simplified Beta equation converts resistance to
//! temperature.  Readings pinned to either rail mean an open or shorted
//! probe and are reported as [`SensorError::OutOfRange`] instead of a
//! bogus number.
//!
//! This divider replaces the DS18B20 1-Wire probe the sensing node used to
//! carry.  The DS18B20 needed a ~750 ms conversion wait per reading; the
//! ADC sample is ready on the first poll.  Both report °C through
//! [`TemperatureSource`], so the transmitter is unaffected by the swap.

use crate::app::ports::TemperatureSource;
use crate::error::SensorError;

use super::{ADC_MAX, AdcReader};

const R25: f32 = 10_000.0;
const BETA: f32 = 3950.0;
const T25_K: f32 = 298.15;
const R_DIVIDER: f32 = 10_000.0;
const V_REF: f32 = 3.3;
/// Volts from either rail treated as "stuck".
const RAIL_MARGIN: f32 = 0.01;

pub struct NtcThermistor<A> {
    adc: A,
    last_raw: u16,
}

impl<A: AdcReader> NtcThermistor<A> {
    pub fn new(adc: A) -> Self {
        Self { adc, last_raw: 0 }
    }

    /// Raw value behind the most recent reading.
    pub fn last_raw(&self) -> u16 {
        self.last_raw
    }

    pub fn read_celsius(&mut self) -> Result<f32, SensorError> {
        let raw = self.adc.read_raw()?;
        self.last_raw = raw;
        adc_to_celsius(raw)
    }
}

impl<A: AdcReader> TemperatureSource for NtcThermistor<A> {
    async fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.read_celsius()
    }
}

/// Beta-equation conversion of a raw divider reading.
pub fn adc_to_celsius(raw: u16) -> Result<f32, SensorError> {
    let voltage = (raw.min(ADC_MAX) as f32 / ADC_MAX as f32) * V_REF;
    if voltage <= RAIL_MARGIN || voltage >= V_REF - RAIL_MARGIN {
        return Err(SensorError::OutOfRange);
    }
    let r_ntc = R_DIVIDER * voltage / (V_REF - voltage);
    let inv_t = (1.0 / T25_K) + (1.0 / BETA) * (r_ntc / R25).ln();
    if inv_t <= 0.0 {
        return Err(SensorError::OutOfRange);
    }
    Ok((1.0 / inv_t) - 273.15)
}
