//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements              | Connects to               |
//! |------------------|-------------------------|---------------------------|
//! | `ble_central`    | Central, GattConnection | Bluedroid GATT client     |
//! | `ble_peripheral` | Peripheral, NotifySession | Bluedroid GATT server   |
//! | `radio_events`   | —                       | GAP/GATT callbacks → async|
//! | `log_sink`       | EventSink               | Serial log output         |
//! | `time`           | Delay                   | async-io-mini timers      |

pub mod ble_central;
pub mod ble_peripheral;
pub mod log_sink;
pub mod radio_events;
pub mod time;
