//! BLE peripheral adapter (sensing node).
//!
//! Implements [`Peripheral`] / [`NotifySession`] on top of a [`GattsDriver`].
//!
//! ## GATT Service Layout
//!
//! | Attribute  | UUID                                   | Perms        |
//! |------------|----------------------------------------|--------------|
//! | Service    | `af65f22f-0b5c-4ac5-a2a1-76606258c2b0` | —            |
//! | Telemetry  | `19b10001-e8f2-537e-4f6c-d104768a1214` | Read+Notify  |
//! | CCCD       | `0x2902`                               | Read+Write   |
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: [`BluedroidGatts`] — Bluedroid GATT server
//!   via raw `esp_idf_svc::sys` calls.
//! - **all other targets**: generic adapter only; tests script the driver.

use log::{debug, info, warn};

use crate::app::ports::{NotifySession, Peripheral};
use crate::error::LinkError;
use crate::protocol::advert::AdvertisingData;

use super::radio_events::{PeripheralChannel, PeripheralEvent};

/// Command half of the GATT server.
pub trait GattsDriver: Clone {
    /// Load the raw advertising data and start connectable advertising.
    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), LinkError>;
    fn stop_advertising(&mut self);
    /// Update the readable characteristic value.
    fn set_value(&mut self, value: &[u8]) -> Result<(), LinkError>;
    /// Send a notification (no confirmation requested).
    fn notify(&mut self, conn_id: u16, value: &[u8]) -> Result<(), LinkError>;
    fn disconnect(&mut self, conn_id: u16);
}

pub struct GattsPeripheral<'a, D> {
    driver: D,
    events: &'a PeripheralChannel,
}

impl<'a, D: GattsDriver> GattsPeripheral<'a, D> {
    pub fn new(driver: D, events: &'a PeripheralChannel) -> Self {
        Self { driver, events }
    }
}

impl<'a, D: GattsDriver> Peripheral for GattsPeripheral<'a, D> {
    type Session = GattsSession<'a, D>;

    async fn advertise(&mut self, data: &AdvertisingData) -> Result<GattsSession<'a, D>, LinkError> {
        // Leftovers belong to a session that no longer exists.
        while self.events.try_receive().is_ok() {}

        self.driver.start_advertising(data)?;
        info!("BLE: advertising");

        loop {
            if let PeripheralEvent::Connected { conn_id } = self.events.receive().await {
                // Single-connection server: stop offering the slot.
                self.driver.stop_advertising();
                info!("BLE: central connected (conn_id={})", conn_id);
                return Ok(GattsSession {
                    conn_id,
                    subscribed: false,
                    closed: false,
                    driver: self.driver.clone(),
                    events: self.events,
                });
            }
        }
    }
}

/// The one connected central.  Dropping the session disconnects it.
pub struct GattsSession<'a, D: GattsDriver> {
    conn_id: u16,
    subscribed: bool,
    closed: bool,
    driver: D,
    events: &'a PeripheralChannel,
}

impl<D: GattsDriver> GattsSession<'_, D> {
    pub fn conn_id(&self) -> u16 {
        self.conn_id
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Fold one event into the session; a disconnect of this link is an
    /// error.
    fn absorb(&mut self, event: PeripheralEvent) -> Result<Option<bool>, LinkError> {
        match event {
            PeripheralEvent::Disconnected { conn_id, reason } if conn_id == self.conn_id => {
                self.closed = true;
                info!("BLE: central disconnected (reason 0x{:02x})", reason);
                Err(LinkError::UnexpectedDisconnect)
            }
            PeripheralEvent::NotifyEnabled { conn_id, enabled } if conn_id == self.conn_id => {
                debug!("BLE: notifications {}", if enabled { "on" } else { "off" });
                self.subscribed = enabled;
                Ok(None)
            }
            PeripheralEvent::NotifySent { conn_id, ok } if conn_id == self.conn_id => Ok(Some(ok)),
            _ => Ok(None),
        }
    }
}

impl<D: GattsDriver> NotifySession for GattsSession<'_, D> {
    async fn notify(&mut self, value: &[u8]) -> Result<(), LinkError> {
        self.check_link()?;

        self.driver.set_value(value)?;
        if !self.subscribed {
            return Ok(());
        }

        self.driver.notify(self.conn_id, value)?;
        loop {
            let event = self.events.receive().await;
            if let Some(ok) = self.absorb(event)? {
                return if ok {
                    Ok(())
                } else {
                    warn!("BLE: notification not delivered");
                    Err(LinkError::RadioTransientError)
                };
            }
        }
    }

    fn check_link(&mut self) -> Result<(), LinkError> {
        if self.closed {
            return Err(LinkError::UnexpectedDisconnect);
        }
        while let Ok(event) = self.events.try_receive() {
            self.absorb(event)?;
        }
        Ok(())
    }
}

impl<D: GattsDriver> Drop for GattsSession<'_, D> {
    fn drop(&mut self) {
        if !self.closed {
            self.driver.disconnect(self.conn_id);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF: Bluedroid GATT server
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use bluedroid::BluedroidGatts;

#[cfg(target_os = "espidf")]
mod bluedroid {
    use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};

    use esp_idf_svc::sys::*;
    use log::{info, warn};

    use super::GattsDriver;
    use crate::adapters::radio_events::{
        PERIPHERAL_EVENTS, PeripheralEvent, bluedroid_start, publish_peripheral, uuid16_to_esp,
        uuid128_to_esp,
    };
    use crate::error::{Error, LinkError};
    use crate::protocol::{CCCD_UUID16, CHAR_TELEMETRY, MAX_NOTIFICATION_LEN, SERVICE_UUID};

    // ── Bluedroid static state (callbacks cannot capture) ─────────
    static GATTS_IF: AtomicU8 = AtomicU8::new(ESP_GATT_IF_NONE as u8);
    static SVC_HANDLE: AtomicU16 = AtomicU16::new(0);
    static VALUE_HANDLE: AtomicU16 = AtomicU16::new(0);
    static CCCD_HANDLE: AtomicU16 = AtomicU16::new(0);
    /// Scan response configured; advertising may start.
    static ADV_PENDING: AtomicBool = AtomicBool::new(false);

    fn adv_params() -> esp_ble_adv_params_t {
        esp_ble_adv_params_t {
            adv_int_min: 0x20,
            adv_int_max: 0x40,
            adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
            own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
            adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
            ..unsafe { core::mem::zeroed() }
        }
    }

    fn check(what: &str, ret: esp_err_t) -> Result<(), LinkError> {
        if ret == ESP_OK as i32 {
            Ok(())
        } else {
            warn!("BLE: {} failed ({})", what, ret);
            Err(LinkError::RadioTransientError)
        }
    }

    fn gatts_if() -> Result<esp_gatt_if_t, LinkError> {
        match GATTS_IF.load(Ordering::Acquire) {
            v if v == ESP_GATT_IF_NONE as u8 => Err(LinkError::RadioTransientError),
            v => Ok(v),
        }
    }

    /// Bluedroid GATT server with the telemetry service registered.
    #[derive(Debug, Clone, Copy)]
    pub struct BluedroidGatts {
        _private: (),
    }

    impl BluedroidGatts {
        /// Bring up Bluedroid and register the telemetry service.  Returns
        /// once the CCCD is in place.
        pub fn start(device_name: &str) -> Result<Self, Error> {
            bluedroid_start()?;
            unsafe {
                if esp_ble_gap_register_callback(Some(gap_event_handler)) != ESP_OK as i32 {
                    return Err(Error::Init("gap_register_callback"));
                }
                if esp_ble_gatts_register_callback(Some(gatts_event_handler)) != ESP_OK as i32 {
                    return Err(Error::Init("gatts_register_callback"));
                }
                if esp_ble_gatts_app_register(0) != ESP_OK as i32 {
                    return Err(Error::Init("gatts_app_register"));
                }

                let mut name: heapless::Vec<u8, 32> = heapless::Vec::new();
                let _ = name.extend_from_slice(&device_name.as_bytes()[..device_name.len().min(31)]);
                let _ = name.push(0);
                esp_ble_gap_set_device_name(name.as_ptr() as *const _);
            }

            for _ in 0..100 {
                if CCCD_HANDLE.load(Ordering::Acquire) != 0 {
                    info!("BLE: telemetry service registered");
                    return Ok(Self { _private: () });
                }
                esp_idf_hal::delay::FreeRtos::delay_ms(10);
            }
            Err(Error::Init("gatts service registration timed out"))
        }
    }

    impl GattsDriver for BluedroidGatts {
        fn start_advertising(&mut self, data: &crate::protocol::advert::AdvertisingData) -> Result<(), LinkError> {
            let mut adv = data.adv.clone();
            let mut rsp = data.scan_response.clone();
            ADV_PENDING.store(true, Ordering::Release);
            unsafe {
                check(
                    "config_adv_data_raw",
                    esp_ble_gap_config_adv_data_raw(adv.as_mut_ptr(), adv.len() as u32),
                )?;
                // Advertising starts from the GAP callback once the scan
                // response is in place.
                check(
                    "config_scan_rsp_data_raw",
                    esp_ble_gap_config_scan_rsp_data_raw(rsp.as_mut_ptr(), rsp.len() as u32),
                )
            }
        }

        fn stop_advertising(&mut self) {
            ADV_PENDING.store(false, Ordering::Release);
            unsafe {
                esp_ble_gap_stop_advertising();
            }
        }

        fn set_value(&mut self, value: &[u8]) -> Result<(), LinkError> {
            let handle = VALUE_HANDLE.load(Ordering::Acquire);
            check("set_attr_value", unsafe {
                esp_ble_gatts_set_attr_value(handle, value.len() as u16, value.as_ptr())
            })
        }

        fn notify(&mut self, conn_id: u16, value: &[u8]) -> Result<(), LinkError> {
            let gatts_if = gatts_if()?;
            let handle = VALUE_HANDLE.load(Ordering::Acquire);
            let mut buf: heapless::Vec<u8, MAX_NOTIFICATION_LEN> = heapless::Vec::new();
            buf.extend_from_slice(value)
                .map_err(|_| LinkError::RadioTransientError)?;
            check("send_indicate", unsafe {
                esp_ble_gatts_send_indicate(
                    gatts_if,
                    conn_id,
                    handle,
                    buf.len() as u16,
                    buf.as_mut_ptr(),
                    false,
                )
            })
        }

        fn disconnect(&mut self, conn_id: u16) {
            if let Ok(gatts_if) = gatts_if() {
                unsafe {
                    esp_ble_gatts_close(gatts_if, conn_id);
                }
            }
        }
    }

    unsafe extern "C" fn gap_event_handler(
        event: esp_gap_ble_cb_event_t,
        param: *mut esp_ble_gap_cb_param_t,
    ) {
        match event {
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RSP_DATA_RAW_SET_COMPLETE_EVT => {
                if ADV_PENDING.swap(false, Ordering::AcqRel) {
                    let mut params = adv_params();
                    unsafe {
                        esp_ble_gap_start_advertising(&mut params);
                    }
                }
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
                let status = unsafe { (*param).adv_start_cmpl.status };
                if status == esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
                    log::info!("BLE GAP: advertising started");
                } else {
                    log::warn!("BLE GAP: advertising start failed ({})", status);
                }
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
                log::info!("BLE GAP: advertising stopped");
            }
            _ => {}
        }
    }

    unsafe extern "C" fn gatts_event_handler(
        event: esp_gatts_cb_event_t,
        gatts_if: esp_gatt_if_t,
        param: *mut esp_ble_gatts_cb_param_t,
    ) {
        let p = unsafe { &*param };

        match event {
            esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
                GATTS_IF.store(gatts_if, Ordering::Release);
                log::info!("BLE GATTS: app registered (if={})", gatts_if);
                let mut svc_id = esp_gatt_srvc_id_t {
                    id: esp_gatt_id_t {
                        uuid: uuid128_to_esp(SERVICE_UUID),
                        inst_id: 0,
                    },
                    is_primary: true,
                };
                // service + characteristic declaration + value + CCCD
                unsafe {
                    esp_ble_gatts_create_service(gatts_if, &mut svc_id, 4);
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
                let svc_handle = unsafe { p.create.service_handle };
                SVC_HANDLE.store(svc_handle, Ordering::Release);
                log::info!("BLE GATTS: service created (handle={})", svc_handle);
                let mut char_uuid = uuid128_to_esp(CHAR_TELEMETRY);
                let mut initial = [0u8; MAX_NOTIFICATION_LEN];
                let mut value = esp_attr_value_t {
                    attr_max_len: MAX_NOTIFICATION_LEN as u16,
                    attr_len: 0,
                    attr_value: initial.as_mut_ptr(),
                };
                let mut control = esp_attr_control_t {
                    auto_rsp: ESP_GATT_AUTO_RSP as u8,
                };
                unsafe {
                    esp_ble_gatts_start_service(svc_handle);
                    esp_ble_gatts_add_char(
                        svc_handle,
                        &mut char_uuid,
                        ESP_GATT_PERM_READ as esp_gatt_perm_t,
                        (ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_NOTIFY) as esp_gatt_char_prop_t,
                        &mut value,
                        &mut control,
                    );
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
                let handle = unsafe { p.add_char.attr_handle };
                VALUE_HANDLE.store(handle, Ordering::Release);
                log::info!("BLE GATTS: telemetry char (handle={})", handle);
                let mut descr_uuid = uuid16_to_esp(CCCD_UUID16);
                let mut initial = [0u8; 2];
                let mut value = esp_attr_value_t {
                    attr_max_len: 2,
                    attr_len: 2,
                    attr_value: initial.as_mut_ptr(),
                };
                let mut control = esp_attr_control_t {
                    auto_rsp: ESP_GATT_AUTO_RSP as u8,
                };
                unsafe {
                    esp_ble_gatts_add_char_descr(
                        SVC_HANDLE.load(Ordering::Acquire),
                        &mut descr_uuid,
                        (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                        &mut value,
                        &mut control,
                    );
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
                let handle = unsafe { p.add_char_descr.attr_handle };
                CCCD_HANDLE.store(handle, Ordering::Release);
                log::info!("BLE GATTS: CCCD (handle={})", handle);
            }
            esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
                let conn_id = unsafe { p.connect.conn_id };
                publish_peripheral(&PERIPHERAL_EVENTS, PeripheralEvent::Connected { conn_id });
            }
            esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
                let d = unsafe { &p.disconnect };
                publish_peripheral(
                    &PERIPHERAL_EVENTS,
                    PeripheralEvent::Disconnected {
                        conn_id: d.conn_id,
                        reason: d.reason as u16,
                    },
                );
            }
            esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
                let w = unsafe { &p.write };
                if w.handle == CCCD_HANDLE.load(Ordering::Acquire) && w.len >= 1 && !w.value.is_null() {
                    let first = unsafe { *w.value };
                    publish_peripheral(
                        &PERIPHERAL_EVENTS,
                        PeripheralEvent::NotifyEnabled {
                            conn_id: w.conn_id,
                            enabled: first & 0x01 != 0,
                        },
                    );
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_CONF_EVT => {
                let c = unsafe { &p.conf };
                publish_peripheral(
                    &PERIPHERAL_EVENTS,
                    PeripheralEvent::NotifySent {
                        conn_id: c.conn_id,
                        ok: c.status == esp_gatt_status_t_ESP_GATT_OK,
                    },
                );
            }
            _ => {}
        }
    }
}
