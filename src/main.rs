//! ThermoValve Firmware — Main Entry Point
//!
//! One binary, two roles, selected at build time:
//!
//! - default: **valve node** — BLE central, trip latch, reset button.
//! - `--features transmitter`: **sensing node** — BLE peripheral, NTC
//!   probe, threshold potentiometer, danger lamps.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  GattcCentral / GattsPeripheral   LogEventSink   ReactorDelay  │
//! │  ValveDriver   ResetButton        NtcThermistor  ThresholdPot  │
//! │  DangerLeds                                                    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  TelemetryLink · TripLatch · ResetDebouncer            │    │
//! │  │  Transmitter                                           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  runtime (edge-executor, shutdown signal)                      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use thermovalve::config::SystemConfig;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  ThermoValve v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = load_config();

    // ── 3. Hardware + role ────────────────────────────────────
    let peripherals = esp_idf_hal::peripherals::Peripherals::take()?;

    #[cfg(not(feature = "transmitter"))]
    run_valve_node(peripherals, &config)?;

    #[cfg(feature = "transmitter")]
    run_sensing_node(peripherals, &config)?;

    Ok(())
}

/// Build-time JSON override, or the defaults.
fn load_config() -> SystemConfig {
    match option_env!("THERMOVALVE_CONFIG") {
        Some(raw) => match SystemConfig::from_json(raw.as_bytes()) {
            Ok(config) => {
                info!("Config: build-time override applied");
                config
            }
            Err(e) => {
                warn!("Config: override rejected ({}), using defaults", e);
                SystemConfig::default()
            }
        },
        None => {
            info!("Config: defaults");
            SystemConfig::default()
        }
    }
}

#[cfg(not(feature = "transmitter"))]
fn run_valve_node(
    _peripherals: esp_idf_hal::peripherals::Peripherals,
    config: &SystemConfig,
) -> Result<()> {
    use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver, Pull};

    use thermovalve::adapters::ble_central::{BluedroidGattc, GattcCentral};
    use thermovalve::adapters::log_sink::LogEventSink;
    use thermovalve::adapters::radio_events::CENTRAL_EVENTS;
    use thermovalve::adapters::time::ReactorDelay;
    use thermovalve::drivers::button::{ResetButton, ResetDebouncer};
    use thermovalve::drivers::valve::ValveDriver;
    use thermovalve::link::TelemetryLink;
    use thermovalve::pins;
    use thermovalve::runtime::{Shutdown, run_receiver};
    use thermovalve::trip::{TripLatch, TripState};

    // Valve first: the output must be driven low before anything else runs.
    // SAFETY: the pin number comes from the board map and is claimed once.
    let valve_pin = PinDriver::output(unsafe { AnyOutputPin::new(pins::VALVE_GPIO) })?;
    let trip = TripState::new(ValveDriver::new(valve_pin));

    // SAFETY: as above.
    let mut button_pin = PinDriver::input(unsafe { AnyIOPin::new(pins::RESET_BUTTON_GPIO) })?;
    button_pin.set_pull(Pull::Up)?;

    let radio = GattcCentral::new(BluedroidGattc::start()?, &CENTRAL_EVENTS);
    let delay = ReactorDelay::new();

    let mut link = TelemetryLink::new(
        radio,
        &delay,
        TripLatch::new(&trip),
        LogEventSink::new(),
        config.link.clone(),
    );
    let mut debouncer = ResetDebouncer::new(
        &trip,
        ResetButton::active_low(button_pin),
        LogEventSink::new(),
        config.reset.clone(),
    );

    info!("Valve node ready.");
    let shutdown = Shutdown::new();
    futures_lite::future::block_on(run_receiver(&mut link, &mut debouncer, &delay, &shutdown));
    Ok(())
}

#[cfg(feature = "transmitter")]
fn run_sensing_node(
    peripherals: esp_idf_hal::peripherals::Peripherals,
    config: &SystemConfig,
) -> Result<()> {
    use esp_idf_hal::adc::attenuation::DB_11;
    use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
    use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
    use esp_idf_hal::gpio::{AnyOutputPin, PinDriver};

    use thermovalve::adapters::ble_peripheral::{BluedroidGatts, GattsPeripheral};
    use thermovalve::adapters::log_sink::LogEventSink;
    use thermovalve::adapters::radio_events::PERIPHERAL_EVENTS;
    use thermovalve::adapters::time::ReactorDelay;
    use thermovalve::drivers::indicator::DangerLeds;
    use thermovalve::error::SensorError;
    use thermovalve::link::Transmitter;
    use thermovalve::pins;
    use thermovalve::runtime::{Shutdown, run_transmitter};
    use thermovalve::sensors::{NtcThermistor, ThresholdPot};

    let adc = AdcDriver::new(peripherals.adc1)?;
    let channel_cfg = AdcChannelConfig {
        attenuation: DB_11,
        ..Default::default()
    };
    let mut temp_channel = AdcChannelDriver::new(&adc, peripherals.pins.gpio1, &channel_cfg)?;
    let mut pot_channel = AdcChannelDriver::new(&adc, peripherals.pins.gpio2, &channel_cfg)?;
    info!(
        "ADC: probe on GPIO{}, threshold pot on GPIO{}",
        pins::TEMP_ADC_GPIO,
        pins::THRESHOLD_ADC_GPIO
    );

    let probe = NtcThermistor::new(move || {
        temp_channel
            .read()
            .map_err(|_| SensorError::AdcReadFailed)
    });
    let pot = ThresholdPot::new(
        move || pot_channel.read().map_err(|_| SensorError::AdcReadFailed),
        &config.transmitter,
    );

    let leds = DangerLeds::new(
        PinDriver::output(unsafe { AnyOutputPin::new(pins::DANGER_LED_GPIO) })?,
        PinDriver::output(unsafe { AnyOutputPin::new(pins::SAFE_LED_GPIO) })?,
    );

    let radio = GattsPeripheral::new(
        BluedroidGatts::start(&config.transmitter.device_name)?,
        &PERIPHERAL_EVENTS,
    );
    let delay = ReactorDelay::new();

    let mut transmitter = Transmitter::new(
        radio,
        probe,
        pot,
        leds,
        &delay,
        LogEventSink::new(),
        config.transmitter.clone(),
    );

    info!("Sensing node ready.");
    let shutdown = Shutdown::new();
    futures_lite::future::block_on(run_transmitter(&mut transmitter, &shutdown));
    Ok(())
}
