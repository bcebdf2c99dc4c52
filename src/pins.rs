//! GPIO / peripheral pin assignments (ESP32-S3).
//!
//! Single source of truth: `main` references this module rather than
//! hard-coding pin numbers.  The ADC inputs are also taken as typed pins
//! in `main`; keep the two in step.

// ---------------------------------------------------------------------------
// Valve node
// ---------------------------------------------------------------------------

/// Digital output: valve-disable relay and indicator LED.
/// HIGH = tripped (valve disabled).
pub const VALVE_GPIO: i32 = 4;

/// Digital input: operator reset button, active-low with internal pull-up.
pub const RESET_BUTTON_GPIO: i32 = 16;

// ---------------------------------------------------------------------------
// Sensing node — Analog (ADC1)
// ---------------------------------------------------------------------------

/// NTC thermistor divider.  ADC1 channel 0.
pub const TEMP_ADC_GPIO: i32 = 1;

/// Threshold potentiometer wiper.  ADC1 channel 1.
pub const THRESHOLD_ADC_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Sensing node — Digital outputs
// ---------------------------------------------------------------------------

/// Red lamp: local reading at or above the threshold.
pub const DANGER_LED_GPIO: i32 = 11;

/// Green lamp: local reading below the threshold.
pub const SAFE_LED_GPIO: i32 = 9;
