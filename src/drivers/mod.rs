//! Valve output, reset button and danger lamps.

pub mod button;
pub mod indicator;
pub mod valve;
