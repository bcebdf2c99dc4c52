//! Role runtimes.
//!
//! ```text
//!  ┌───────────────────────────────────────────────────────┐
//!  │  futures_lite::block_on (caller, async-io-mini timers) │
//!  │  ┌─────────────────────────────────────────────────┐  │
//!  │  │ edge_executor::LocalExecutor                    │  │
//!  │  │   ├─ TelemetryLink::run   (or Transmitter::run) │  │
//!  │  │   └─ ResetDebouncer::run  (receiver only)       │  │
//!  │  └──────────────── runs until Shutdown ────────────┘  │
//!  └───────────────────────────────────────────────────────┘
//! ```
//!
//! Both receiver tasks share the trip cell by reference; nothing here owns
//! it.  On shutdown the tasks are cancelled at their next suspension point
//! and the valve keeps whatever level it was last commanded to.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::info;

use crate::app::ports::{
    Central, DangerIndicator, Delay, EventSink, Peripheral, ResetInput, TemperatureSource,
    ThresholdSource, ValvePort,
};
use crate::drivers::button::ResetDebouncer;
use crate::link::{TelemetryLink, Transmitter};

/// Process-level stop request.
pub struct Shutdown {
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl Shutdown {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Ask every runtime waiting on this to stop.  Idempotent.
    pub fn request(&self) {
        self.signal.signal(());
    }

    pub fn is_requested(&self) -> bool {
        self.signal.signaled()
    }

    /// Resolve once [`request`](Self::request) has been called.
    pub async fn wait(&self) {
        // `signaled()` check first: `wait()` consumes the signal and a
        // second runtime on the same handle must still see it.
        if self.signal.signaled() {
            return;
        }
        self.signal.wait().await;
        self.signal.signal(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the valve node: telemetry link and reset debouncer side by side.
pub async fn run_receiver<R, D, V, I, S1, S2>(
    link: &mut TelemetryLink<'_, R, D, V, S1>,
    debouncer: &mut ResetDebouncer<'_, V, I, S2>,
    delay: &D,
    shutdown: &Shutdown,
) where
    R: Central,
    D: Delay,
    V: ValvePort,
    I: ResetInput,
    S1: EventSink,
    S2: EventSink,
{
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();

    let _link_task = executor.spawn(link.run());
    let _reset_task = executor.spawn(debouncer.run(delay));

    info!("RUNTIME: receiver running");
    executor.run(shutdown.wait()).await;
    info!("RUNTIME: receiver stopped");
}

/// Run the sensing node until shutdown.
pub async fn run_transmitter<P, T, H, L, D, S>(
    transmitter: &mut Transmitter<'_, P, T, H, L, D, S>,
    shutdown: &Shutdown,
) where
    P: Peripheral,
    T: TemperatureSource,
    H: ThresholdSource,
    L: DangerIndicator,
    D: Delay,
    S: EventSink,
{
    let executor: edge_executor::LocalExecutor<'_, 2> = edge_executor::LocalExecutor::new();

    let _tx_task = executor.spawn(transmitter.run());

    info!("RUNTIME: transmitter running");
    executor.run(shutdown.wait()).await;
    info!("RUNTIME: transmitter stopped");
}
