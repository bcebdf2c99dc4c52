//! Sensing-node telemetry loop.
//!
//! Advertise with the service UUID in every advertising packet, accept one
//! central, then notify a freshly encoded payload once per telemetry cycle.
//! When a notify fails the session is dropped and advertising resumes after
//! `readvertise_delay`.
//!
//! The danger lamps follow the local reading every cycle, connected or not.

use core::time::Duration;

use futures_lite::future;
use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{
    DangerIndicator, Delay, EventSink, NotifySession, Peripheral, TemperatureSource,
    ThresholdSource,
};
use crate::config::TransmitterConfig;
use crate::error::LinkError;
use crate::protocol::SERVICE_UUID;
use crate::protocol::advert::AdvertisingData;
use crate::protocol::payload;
use crate::sensors::celsius_to_fahrenheit;

pub struct Transmitter<'a, P, T, H, L, D, S> {
    radio: P,
    temperature: T,
    threshold: H,
    indicator: L,
    delay: &'a D,
    sink: S,
    config: TransmitterConfig,
    advert: AdvertisingData,
    sessions: u32,
    notifications: u32,
    skipped: u32,
}

impl<'a, P, T, H, L, D, S> Transmitter<'a, P, T, H, L, D, S>
where
    P: Peripheral,
    T: TemperatureSource,
    H: ThresholdSource,
    L: DangerIndicator,
    D: Delay,
    S: EventSink,
{
    pub fn new(
        radio: P,
        temperature: T,
        threshold: H,
        indicator: L,
        delay: &'a D,
        sink: S,
        config: TransmitterConfig,
    ) -> Self {
        let advert = AdvertisingData::build(&config.device_name, SERVICE_UUID);
        Self {
            radio,
            temperature,
            threshold,
            indicator,
            delay,
            sink,
            config,
            advert,
            sessions: 0,
            notifications: 0,
            skipped: 0,
        }
    }

    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    pub fn notifications(&self) -> u32 {
        self.notifications
    }

    /// Cycles skipped because the temperature could not be read.
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn radio(&self) -> &P {
        &self.radio
    }

    pub fn indicator(&self) -> &L {
        &self.indicator
    }

    /// Advertise and serve sessions forever.
    pub async fn run(&mut self) {
        info!(
            "TX: advertising as '{}', every {} ms",
            self.config.device_name, self.config.telemetry_interval_ms
        );
        loop {
            let cause = self.serve_once().await;
            info!("TX: session ended ({}), re-advertising", cause);
            self.delay.sleep(self.config.readvertise_delay()).await;
        }
    }

    /// Advertise, serve one session until it fails, and return the cause.
    pub async fn serve_once(&mut self) -> LinkError {
        let interval = self.config.telemetry_interval();
        let advertising = self.radio.advertise(&self.advert);
        let idle = indicate_until_connected(
            &mut self.temperature,
            &mut self.threshold,
            &mut self.indicator,
            self.delay,
            interval,
        );
        let mut session = match future::or(advertising, idle).await {
            Ok(session) => session,
            Err(e) => {
                warn!("TX: advertising failed: {}", e);
                return e;
            }
        };

        self.sessions = self.sessions.wrapping_add(1);
        info!("TX: central connected");
        self.sink.emit(&AppEvent::SessionOpened);

        loop {
            if let Err(e) = self.cycle(&mut session).await {
                warn!("TX: session lost: {}", e);
                self.sink.emit(&AppEvent::SessionClosed(e));
                return e;
            }
            self.delay.sleep(interval).await;
        }
    }

    async fn cycle(&mut self, session: &mut P::Session) -> Result<(), LinkError> {
        let celsius = match self.temperature.read_temperature().await {
            Ok(c) => c,
            Err(e) => {
                self.skipped = self.skipped.wrapping_add(1);
                warn!("TX: temperature read failed ({}), cycle skipped", e);
                return session.check_link();
            }
        };

        let temperature = celsius_to_fahrenheit(celsius);
        let threshold = self.threshold.read_threshold();
        self.indicator.set_danger(temperature >= threshold);
        let body = payload::encode(temperature, threshold);

        session.notify(&body).await?;

        self.notifications = self.notifications.wrapping_add(1);
        debug!("TX: {:.2} °F / {:.2} °F", temperature, threshold);
        self.sink.emit(&AppEvent::Notified {
            temperature,
            threshold,
        });
        Ok(())
    }
}

/// Keep the lamps current while no central is connected.  Never completes;
/// raced against advertising.
async fn indicate_until_connected<T, H, L, D, R>(
    temperature: &mut T,
    threshold: &mut H,
    indicator: &mut L,
    delay: &D,
    interval: Duration,
) -> Result<R, LinkError>
where
    T: TemperatureSource,
    H: ThresholdSource,
    L: DangerIndicator,
    D: Delay,
{
    loop {
        if let Ok(celsius) = temperature.read_temperature().await {
            let reading = celsius_to_fahrenheit(celsius);
            indicator.set_danger(reading >= threshold.read_threshold());
        }
        delay.sleep(interval).await;
    }
}
