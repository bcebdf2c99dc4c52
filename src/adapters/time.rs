//! Timer adapter.
//!
//! [`ReactorDelay`] implements the [`Delay`] port on `async-io-mini`
//! timers, which work the same on ESP-IDF (its reactor sits on the VFS
//! `select()`) and on host.
//!
//! - **`target_os = "espidf"`** — uptime from `esp_timer_get_time()`.
//! - **`not(target_os = "espidf")`** — uptime from `std::time::Instant`.

use core::time::Duration;

use crate::app::ports::Delay;

/// Delay port backed by the async-io-mini reactor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactorDelay;

impl ReactorDelay {
    pub fn new() -> Self {
        Self
    }
}

impl Delay for ReactorDelay {
    async fn sleep(&self, duration: Duration) {
        async_io_mini::Timer::after(duration).await;
    }
}

/// Milliseconds since boot (monotonic).
#[cfg(target_os = "espidf")]
pub fn uptime_ms() -> u64 {
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
}

/// Milliseconds since the first call (monotonic).
#[cfg(not(target_os = "espidf"))]
pub fn uptime_ms() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_millis() as u64
}
