//! Radio callback → async bridge.
//!
//! Bluedroid reports everything through C callbacks running on its own
//! task.  Those callbacks cannot capture Rust state, so they translate the
//! raw parameters into the small owned enums below and `try_send` them into
//! static `embassy-sync` channels.  The async adapters (`ble_central`,
//! `ble_peripheral`) await the channels.
//!
//! ```text
//! ┌────────────────┐  CentralEvent     ┌──────────────────────┐
//! │ GAP / GATTC cb │──────────────────▶│ GattcCentral (async) │
//! └────────────────┘                   └──────────────────────┘
//! ┌────────────────┐  PeripheralEvent  ┌──────────────────────┐
//! │ GAP / GATTS cb │──────────────────▶│ GattsPeripheral      │
//! └────────────────┘                   └──────────────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;
use log::warn;

use crate::app::ports::PeerAddress;
use crate::protocol::MAX_NOTIFICATION_LEN;

/// Advertising packet plus scan response, as delivered in one scan result.
pub const SCAN_RECORD_LEN: usize = 62;

/// Depth of each event channel.  A scan in a busy RF environment is the
/// worst producer; anything beyond this is dropped with a warning.
pub const EVENT_DEPTH: usize = 16;

pub type ScanRecord = Vec<u8, SCAN_RECORD_LEN>;

/// Inclusive attribute-handle range of a discovered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleRange {
    pub start: u16,
    pub end: u16,
}

/// Events consumed by the central (valve node).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CentralEvent {
    /// One advertising report.
    AdvReport { peer: PeerAddress, record: ScanRecord },
    /// The scan duration elapsed.
    ScanComplete,
    /// Result of a connection attempt.
    Opened { addr: [u8; 6], conn_id: u16, ok: bool },
    /// One matching service from a discovery.
    ServiceFound { conn_id: u16, range: HandleRange },
    /// Service discovery finished.
    SearchComplete { conn_id: u16, ok: bool },
    /// Local notification registration finished.
    NotifyRegistered { handle: u16, ok: bool },
    /// The CCCD write was acknowledged.
    DescriptorWritten { conn_id: u16, ok: bool },
    /// Notification body, truncated to the buffer; `len` is the true size.
    Notification {
        conn_id: u16,
        handle: u16,
        len: usize,
        data: Vec<u8, MAX_NOTIFICATION_LEN>,
    },
    /// Link lost or closed.
    Disconnected { conn_id: u16, reason: u16 },
}

/// Events consumed by the peripheral (sensing node).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralEvent {
    Connected { conn_id: u16 },
    Disconnected { conn_id: u16, reason: u16 },
    /// The central wrote our CCCD.
    NotifyEnabled { conn_id: u16, enabled: bool },
    /// Confirmation for a sent notification.
    NotifySent { conn_id: u16, ok: bool },
}

pub type CentralChannel = Channel<CriticalSectionRawMutex, CentralEvent, EVENT_DEPTH>;
pub type PeripheralChannel = Channel<CriticalSectionRawMutex, PeripheralEvent, EVENT_DEPTH>;

/// Central events: GAP/GATTC callbacks → `GattcCentral`.
pub static CENTRAL_EVENTS: CentralChannel = Channel::new();

/// Peripheral events: GAP/GATTS callbacks → `GattsPeripheral`.
pub static PERIPHERAL_EVENTS: PeripheralChannel = Channel::new();

/// Non-blocking publish from callback context.
pub fn publish_central(channel: &CentralChannel, event: CentralEvent) {
    if let Err(embassy_sync::channel::TrySendError::Full(dropped)) = channel.try_send(event) {
        warn!("BLE: central event queue full, dropped {:?}", dropped);
    }
}

/// Non-blocking publish from callback context.
pub fn publish_peripheral(channel: &PeripheralChannel, event: PeripheralEvent) {
    if let Err(embassy_sync::channel::TrySendError::Full(dropped)) = channel.try_send(event) {
        warn!("BLE: peripheral event queue full, dropped {:?}", dropped);
    }
}

/// Copy a notification body into an owned event, keeping its true length.
pub fn notification(conn_id: u16, handle: u16, body: &[u8]) -> CentralEvent {
    let keep = body.len().min(MAX_NOTIFICATION_LEN);
    let mut data = Vec::new();
    // `keep` never exceeds capacity.
    let _ = data.extend_from_slice(&body[..keep]);
    CentralEvent::Notification {
        conn_id,
        handle,
        len: body.len(),
        data,
    }
}

/// Concatenate advertising data and scan response the way the scanner sees
/// them.
pub fn scan_record(raw: &[u8]) -> ScanRecord {
    let keep = raw.len().min(SCAN_RECORD_LEN);
    let mut record = Vec::new();
    let _ = record.extend_from_slice(&raw[..keep]);
    record
}

// ── ESP-IDF: shared Bluedroid bring-up ───────────────────────────

#[cfg(target_os = "espidf")]
pub(crate) fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    t.uuid.uuid128 = uuid.to_le_bytes();
    t
}

#[cfg(target_os = "espidf")]
pub(crate) fn uuid16_to_esp(uuid: u16) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 2;
    t.uuid.uuid16 = uuid;
    t
}

/// Bring up the controller in BLE-only mode and enable Bluedroid.
#[cfg(target_os = "espidf")]
pub(crate) fn bluedroid_start() -> Result<(), crate::error::Error> {
    use crate::error::Error;
    use esp_idf_svc::sys::*;

    unsafe {
        // Release classic BT memory (BLE-only mode saves ~30 KB).
        esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

        let mut bt_cfg = esp_bt_controller_config_t::default();
        if esp_bt_controller_init(&mut bt_cfg) != ESP_OK as i32 {
            return Err(Error::Init("bt_controller_init"));
        }
        if esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE) != ESP_OK as i32 {
            return Err(Error::Init("bt_controller_enable"));
        }
        if esp_bluedroid_init() != ESP_OK as i32 {
            return Err(Error::Init("bluedroid_init"));
        }
        if esp_bluedroid_enable() != ESP_OK as i32 {
            return Err(Error::Init("bluedroid_enable"));
        }
    }
    log::info!("BLE: Bluedroid enabled (BLE only)");
    Ok(())
}
