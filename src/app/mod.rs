//! Application core boundary — events out, ports in.
//!
//! The state machines in [`crate::link`], [`crate::trip`] and
//! [`crate::drivers::button`] talk to hardware exclusively through the
//! **port traits** defined in [`ports`], keeping them fully testable
//! without a radio or GPIO.

pub mod events;
pub mod ports;
