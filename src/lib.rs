//! ThermoValve firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod link;
pub mod protocol;
pub mod runtime;
pub mod trip;

pub mod pins;

// Adapters, drivers and sensors compile on every target; the ESP-IDF
// implementations inside are cfg-gated.
pub mod adapters;
pub mod drivers;
pub mod sensors;
