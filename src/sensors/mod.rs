//! Sensing-node inputs.
//!
//! Both sensors sit behind a voltage divider on a 12-bit ADC channel.  The
//! raw conversion is abstracted by [`AdcReader`] so the maths runs on host;
//! on target `main` hands in a closure over the oneshot channel driver.

pub mod temperature;
pub mod threshold;

use crate::error::SensorError;

pub use temperature::NtcThermistor;
pub use threshold::ThresholdPot;

/// Full-scale raw value of the 12-bit ADC.
pub const ADC_MAX: u16 = 4095;

/// One raw ADC conversion.
pub trait AdcReader {
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

impl<F> AdcReader for F
where
    F: FnMut() -> Result<u16, SensorError>,
{
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        self()
    }
}

/// °C → °F.  Acquisition is metric; the wire carries Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}
