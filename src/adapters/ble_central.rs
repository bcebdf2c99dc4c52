//! BLE central adapter (valve node).
//!
//! Implements [`Central`] / [`GattConnection`] on top of a [`GattcDriver`]
//! that issues GAP/GATTC commands, with every result arriving as a
//! [`CentralEvent`] on the bridge channel.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: [`BluedroidGattc`] drives the Bluedroid
//!   GATT client through raw `esp_idf_svc::sys` calls.
//! - **all other targets**: only the generic adapter exists; tests drive it
//!   with a scripted driver.

use core::time::Duration;

use log::{debug, info, warn};

use crate::app::ports::{Central, GattConnection, PeerAddress};
use crate::error::LinkError;
use crate::protocol::advert::{advertises_service, local_name};

use super::radio_events::{CentralChannel, CentralEvent, HandleRange};

/// Attribute handles of a resolved characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharHandles {
    pub value: u16,
    pub cccd: u16,
}

/// Command half of the GATT client.  Every call returns as soon as the
/// command is queued; completion is reported on the event channel.
///
/// `Clone` so an open connection can keep issuing commands while the
/// central itself stays usable.
pub trait GattcDriver: Clone {
    fn start_scan(&mut self, window: Duration) -> Result<(), LinkError>;
    fn stop_scan(&mut self);
    fn open(&mut self, peer: &PeerAddress) -> Result<(), LinkError>;
    fn search_service(&mut self, conn_id: u16, service: u128) -> Result<(), LinkError>;
    /// Look up a characteristic and its CCCD in the discovered attribute
    /// cache.  Synchronous on Bluedroid.
    fn find_characteristic(
        &mut self,
        conn_id: u16,
        range: HandleRange,
        characteristic: u128,
    ) -> Result<CharHandles, LinkError>;
    fn register_notify(&mut self, peer: &PeerAddress, value_handle: u16) -> Result<(), LinkError>;
    fn write_cccd(&mut self, conn_id: u16, cccd_handle: u16, value: [u8; 2]) -> Result<(), LinkError>;
    fn close(&mut self, conn_id: u16);
}

/// CCCD value enabling notifications.
const CCCD_NOTIFY: [u8; 2] = [0x01, 0x00];

enum Discovery {
    Found(HandleRange),
    Done(bool),
}

pub struct GattcCentral<'a, D> {
    driver: D,
    events: &'a CentralChannel,
}

impl<'a, D: GattcDriver> GattcCentral<'a, D> {
    pub fn new(driver: D, events: &'a CentralChannel) -> Self {
        Self { driver, events }
    }

    /// Discard events left over from an abandoned operation.  A late
    /// successful open is closed so the peer does not stay connected.
    fn drain_stale(&mut self) {
        while let Ok(event) = self.events.try_receive() {
            if let CentralEvent::Opened {
                conn_id, ok: true, ..
            } = event
            {
                warn!("BLE: closing orphaned connection {}", conn_id);
                self.driver.close(conn_id);
            }
        }
    }
}

impl<'a, D: GattcDriver> Central for GattcCentral<'a, D> {
    type Connection = GattcConnection<'a, D>;

    async fn scan(&mut self, service: u128, window: Duration) -> Result<PeerAddress, LinkError> {
        self.drain_stale();
        self.driver.start_scan(window)?;

        loop {
            match self.events.receive().await {
                CentralEvent::AdvReport { peer, record } if advertises_service(&record, service) => {
                    self.driver.stop_scan();
                    info!(
                        "BLE: match {} ({})",
                        peer,
                        local_name(&record).unwrap_or("unnamed")
                    );
                    return Ok(peer);
                }
                CentralEvent::ScanComplete => return Err(LinkError::ScanTimeout),
                _ => {}
            }
        }
    }

    async fn connect(
        &mut self,
        peer: &PeerAddress,
        _timeout: Duration,
    ) -> Result<GattcConnection<'a, D>, LinkError> {
        self.driver.open(peer)?;

        loop {
            match self.events.receive().await {
                CentralEvent::Opened { addr, conn_id, ok } if addr == peer.addr => {
                    if !ok {
                        return Err(LinkError::ConnectTimeout);
                    }
                    debug!("BLE: open complete conn_id={}", conn_id);
                    return Ok(GattcConnection {
                        peer: *peer,
                        conn_id,
                        value_handle: None,
                        driver: self.driver.clone(),
                        events: self.events,
                    });
                }
                _ => {}
            }
        }
    }
}

/// One open GATT client link.
pub struct GattcConnection<'a, D> {
    peer: PeerAddress,
    conn_id: u16,
    value_handle: Option<u16>,
    driver: D,
    events: &'a CentralChannel,
}

impl<D: GattcDriver> GattcConnection<'_, D> {
    pub fn conn_id(&self) -> u16 {
        self.conn_id
    }

    /// Wait for the first event `pick` accepts, failing on a disconnect of
    /// this link.
    async fn expect<T>(
        &mut self,
        mut pick: impl FnMut(&CentralEvent) -> Option<T>,
    ) -> Result<T, LinkError> {
        loop {
            let event = self.events.receive().await;
            if let CentralEvent::Disconnected { conn_id, reason } = event {
                if conn_id == self.conn_id {
                    warn!("BLE: link {} dropped (reason 0x{:02x})", conn_id, reason);
                    return Err(LinkError::UnexpectedDisconnect);
                }
            }
            if let Some(value) = pick(&event) {
                return Ok(value);
            }
        }
    }
}

impl<D: GattcDriver> GattConnection for GattcConnection<'_, D> {
    fn peer(&self) -> PeerAddress {
        self.peer
    }

    async fn subscribe(&mut self, service: u128, characteristic: u128) -> Result<(), LinkError> {
        let conn = self.conn_id;
        self.driver.search_service(conn, service)?;

        let mut range = None;
        loop {
            let step = self
                .expect(|e| match *e {
                    CentralEvent::ServiceFound { conn_id, range } if conn_id == conn => {
                        Some(Discovery::Found(range))
                    }
                    CentralEvent::SearchComplete { conn_id, ok } if conn_id == conn => {
                        Some(Discovery::Done(ok))
                    }
                    _ => None,
                })
                .await?;
            match step {
                // First instance wins; the UUID is unique on our peer.
                Discovery::Found(found) => {
                    range.get_or_insert(found);
                }
                Discovery::Done(true) => break,
                Discovery::Done(false) => return Err(LinkError::SubscriptionFailure),
            }
        }
        let range = range.ok_or(LinkError::SubscriptionFailure)?;

        let handles = self.driver.find_characteristic(conn, range, characteristic)?;
        let peer = self.peer;
        self.driver.register_notify(&peer, handles.value)?;
        let registered = self
            .expect(|e| match *e {
                CentralEvent::NotifyRegistered { handle, ok } if handle == handles.value => Some(ok),
                _ => None,
            })
            .await?;
        if !registered {
            return Err(LinkError::SubscriptionFailure);
        }

        self.driver.write_cccd(conn, handles.cccd, CCCD_NOTIFY)?;
        let written = self
            .expect(|e| match *e {
                CentralEvent::DescriptorWritten { conn_id, ok } if conn_id == conn => Some(ok),
                _ => None,
            })
            .await?;
        if !written {
            return Err(LinkError::SubscriptionFailure);
        }

        self.value_handle = Some(handles.value);
        Ok(())
    }

    async fn next_notification(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        let conn = self.conn_id;
        let value_handle = self.value_handle.ok_or(LinkError::SubscriptionFailure)?;
        let (len, data) = self
            .expect(|e| match e {
                CentralEvent::Notification {
                    conn_id,
                    handle,
                    len,
                    data,
                } if *conn_id == conn && *handle == value_handle => Some((*len, data.clone())),
                _ => None,
            })
            .await?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(len)
    }

    async fn disconnect(mut self) {
        self.driver.close(self.conn_id);
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF: Bluedroid GATT client
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use bluedroid::BluedroidGattc;

#[cfg(target_os = "espidf")]
mod bluedroid {
    use core::sync::atomic::{AtomicU8, Ordering};
    use core::time::Duration;

    use esp_idf_svc::sys::*;
    use log::{info, warn};

    use super::{CharHandles, GattcDriver};
    use crate::adapters::radio_events::{
        CENTRAL_EVENTS, CentralEvent, HandleRange, bluedroid_start, notification,
        publish_central, scan_record, uuid16_to_esp, uuid128_to_esp,
    };
    use crate::app::ports::{AddrKind, PeerAddress};
    use crate::error::{Error, LinkError};
    use crate::protocol::CCCD_UUID16;

    // Bluedroid callbacks are C function pointers that cannot capture Rust
    // closures; the interface id is bridged through this atomic.
    static GATTC_IF: AtomicU8 = AtomicU8::new(ESP_GATT_IF_NONE as u8);

    /// Bluedroid GATT client.  Stateless handle; all state lives in the
    /// stack and in [`GATTC_IF`].
    #[derive(Debug, Clone, Copy)]
    pub struct BluedroidGattc {
        _private: (),
    }

    impl BluedroidGattc {
        /// Bring up Bluedroid, register callbacks and scan parameters, and
        /// wait for the GATT client interface.
        pub fn start() -> Result<Self, Error> {
            bluedroid_start()?;
            unsafe {
                if esp_ble_gap_register_callback(Some(gap_event_handler)) != ESP_OK as i32 {
                    return Err(Error::Init("gap_register_callback"));
                }
                if esp_ble_gattc_register_callback(Some(gattc_event_handler)) != ESP_OK as i32 {
                    return Err(Error::Init("gattc_register_callback"));
                }
                if esp_ble_gattc_app_register(0) != ESP_OK as i32 {
                    return Err(Error::Init("gattc_app_register"));
                }

                let mut params = esp_ble_scan_params_t {
                    scan_type: esp_ble_scan_type_t_BLE_SCAN_TYPE_ACTIVE,
                    own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
                    scan_filter_policy: esp_ble_scan_filter_t_BLE_SCAN_FILTER_ALLOW_ALL,
                    scan_interval: 0x50,
                    scan_window: 0x30,
                    scan_duplicate: esp_ble_scan_duplicate_t_BLE_SCAN_DUPLICATE_DISABLE,
                };
                if esp_ble_gap_set_scan_params(&mut params) != ESP_OK as i32 {
                    return Err(Error::Init("gap_set_scan_params"));
                }
            }

            for _ in 0..100 {
                if GATTC_IF.load(Ordering::Acquire) != ESP_GATT_IF_NONE as u8 {
                    info!("BLE: GATT client ready");
                    return Ok(Self { _private: () });
                }
                esp_idf_hal::delay::FreeRtos::delay_ms(10);
            }
            Err(Error::Init("gattc app registration timed out"))
        }
    }

    fn gattc_if() -> Result<esp_gatt_if_t, LinkError> {
        match GATTC_IF.load(Ordering::Acquire) {
            v if v == ESP_GATT_IF_NONE as u8 => Err(LinkError::RadioTransientError),
            v => Ok(v),
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

    fn addr_type(kind: AddrKind) -> esp_ble_addr_type_t {
        match kind {
            AddrKind::Public => esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            AddrKind::Random => esp_ble_addr_type_t_BLE_ADDR_TYPE_RANDOM,
        }
    }

    impl GattcDriver for BluedroidGattc {
        fn start_scan(&mut self, window: Duration) -> Result<(), LinkError> {
            let secs = window.as_millis().div_ceil(1000).max(1) as u32;
            check("start_scanning", unsafe { esp_ble_gap_start_scanning(secs) })
        }

        fn stop_scan(&mut self) {
            unsafe {
                esp_ble_gap_stop_scanning();
            }
        }

        fn open(&mut self, peer: &PeerAddress) -> Result<(), LinkError> {
            let gattc_if = gattc_if()?;
            let mut bda = peer.addr;
            check("gattc_open", unsafe {
                esp_ble_gattc_open(gattc_if, bda.as_mut_ptr(), addr_type(peer.kind), true)
            })
        }

        fn search_service(&mut self, conn_id: u16, service: u128) -> Result<(), LinkError> {
            let gattc_if = gattc_if()?;
            let mut uuid = uuid128_to_esp(service);
            check("search_service", unsafe {
                esp_ble_gattc_search_service(gattc_if, conn_id, &mut uuid)
            })
        }

        fn find_characteristic(
            &mut self,
            conn_id: u16,
            range: HandleRange,
            characteristic: u128,
        ) -> Result<CharHandles, LinkError> {
            let gattc_if = gattc_if()?;
            unsafe {
                let mut chr: esp_gattc_char_elem_t = core::mem::zeroed();
                let mut count: u16 = 1;
                let status = esp_ble_gattc_get_char_by_uuid(
                    gattc_if,
                    conn_id,
                    range.start,
                    range.end,
                    uuid128_to_esp(characteristic),
                    &mut chr,
                    &mut count,
                );
                if status != esp_gatt_status_t_ESP_GATT_OK || count == 0 {
                    warn!("BLE: characteristic not found (status {})", status);
                    return Err(LinkError::SubscriptionFailure);
                }
                if chr.properties & (ESP_GATT_CHAR_PROP_BIT_NOTIFY as u8) == 0 {
                    warn!("BLE: characteristic does not notify");
                    return Err(LinkError::SubscriptionFailure);
                }

                let mut descr: esp_gattc_descr_elem_t = core::mem::zeroed();
                let mut count: u16 = 1;
                let status = esp_ble_gattc_get_descr_by_char_handle(
                    gattc_if,
                    conn_id,
                    chr.char_handle,
                    uuid16_to_esp(CCCD_UUID16),
                    &mut descr,
                    &mut count,
                );
                if status != esp_gatt_status_t_ESP_GATT_OK || count == 0 {
                    warn!("BLE: CCCD not found (status {})", status);
                    return Err(LinkError::SubscriptionFailure);
                }

                Ok(CharHandles {
                    value: chr.char_handle,
                    cccd: descr.handle,
                })
            }
        }

        fn register_notify(&mut self, peer: &PeerAddress, value_handle: u16) -> Result<(), LinkError> {
            let gattc_if = gattc_if()?;
            let mut bda = peer.addr;
            check("register_for_notify", unsafe {
                esp_ble_gattc_register_for_notify(gattc_if, bda.as_mut_ptr(), value_handle)
            })
        }

        fn write_cccd(&mut self, conn_id: u16, cccd_handle: u16, value: [u8; 2]) -> Result<(), LinkError> {
            let gattc_if = gattc_if()?;
            let mut value = value;
            check("write_char_descr", unsafe {
                esp_ble_gattc_write_char_descr(
                    gattc_if,
                    conn_id,
                    cccd_handle,
                    value.len() as u16,
                    value.as_mut_ptr(),
                    esp_gatt_write_type_t_ESP_GATT_WRITE_TYPE_RSP,
                    esp_gatt_auth_req_t_ESP_GATT_AUTH_REQ_NONE,
                )
            })
        }

        fn close(&mut self, conn_id: u16) {
            if let Ok(gattc_if) = gattc_if() {
                unsafe {
                    esp_ble_gattc_close(gattc_if, conn_id);
                }
            }
        }
    }

    unsafe extern "C" fn gap_event_handler(
        event: esp_gap_ble_cb_event_t,
        param: *mut esp_ble_gap_cb_param_t,
    ) {
        match event {
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RESULT_EVT => {
                let r = unsafe { &(*param).scan_rst };
                match r.search_evt {
                    esp_gap_search_evt_t_ESP_GAP_SEARCH_INQ_RES_EVT => {
                        let len = (r.adv_data_len as usize + r.scan_rsp_len as usize)
                            .min(r.ble_adv.len());
                        let kind = if r.ble_addr_type == esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC {
                            AddrKind::Public
                        } else {
                            AddrKind::Random
                        };
                        publish_central(
                            &CENTRAL_EVENTS,
                            CentralEvent::AdvReport {
                                peer: PeerAddress { addr: r.bda, kind },
                                record: scan_record(&r.ble_adv[..len]),
                            },
                        );
                    }
                    esp_gap_search_evt_t_ESP_GAP_SEARCH_INQ_CMPL_EVT => {
                        publish_central(&CENTRAL_EVENTS, CentralEvent::ScanComplete);
                    }
                    _ => {}
                }
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_START_COMPLETE_EVT => {
                let status = unsafe { (*param).scan_start_cmpl.status };
                if status != esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
                    log::warn!("BLE GAP: scan start failed ({})", status);
                    publish_central(&CENTRAL_EVENTS, CentralEvent::ScanComplete);
                }
            }
            _ => {}
        }
    }

    unsafe extern "C" fn gattc_event_handler(
        event: esp_gattc_cb_event_t,
        gattc_if: esp_gatt_if_t,
        param: *mut esp_ble_gattc_cb_param_t,
    ) {
        let p = unsafe { &*param };
        let ok = |status: esp_gatt_status_t| status == esp_gatt_status_t_ESP_GATT_OK;

        let event = match event {
            esp_gattc_cb_event_t_ESP_GATTC_REG_EVT => {
                if ok(unsafe { p.reg.status }) {
                    GATTC_IF.store(gattc_if, Ordering::Release);
                    log::info!("BLE GATTC: app registered (if={})", gattc_if);
                }
                return;
            }
            esp_gattc_cb_event_t_ESP_GATTC_OPEN_EVT => {
                let o = unsafe { &p.open };
                CentralEvent::Opened {
                    addr: o.remote_bda,
                    conn_id: o.conn_id,
                    ok: ok(o.status),
                }
            }
            esp_gattc_cb_event_t_ESP_GATTC_SEARCH_RES_EVT => {
                let s = unsafe { &p.search_res };
                CentralEvent::ServiceFound {
                    conn_id: s.conn_id,
                    range: HandleRange {
                        start: s.start_handle,
                        end: s.end_handle,
                    },
                }
            }
            esp_gattc_cb_event_t_ESP_GATTC_SEARCH_CMPL_EVT => {
                let s = unsafe { &p.search_cmpl };
                CentralEvent::SearchComplete {
                    conn_id: s.conn_id,
                    ok: ok(s.status),
                }
            }
            esp_gattc_cb_event_t_ESP_GATTC_REG_FOR_NOTIFY_EVT => {
                let r = unsafe { &p.reg_for_notify };
                CentralEvent::NotifyRegistered {
                    handle: r.handle,
                    ok: ok(r.status),
                }
            }
            esp_gattc_cb_event_t_ESP_GATTC_WRITE_DESCR_EVT => {
                let w = unsafe { &p.write };
                CentralEvent::DescriptorWritten {
                    conn_id: w.conn_id,
                    ok: ok(w.status),
                }
            }
            esp_gattc_cb_event_t_ESP_GATTC_NOTIFY_EVT => {
                let n = unsafe { &p.notify };
                let body: &[u8] = if n.value.is_null() || n.value_len == 0 {
                    &[]
                } else {
                    unsafe { core::slice::from_raw_parts(n.value, n.value_len as usize) }
                };
                notification(n.conn_id, n.handle, body)
            }
            esp_gattc_cb_event_t_ESP_GATTC_DISCONNECT_EVT => {
                let d = unsafe { &p.disconnect };
                CentralEvent::Disconnected {
                    conn_id: d.conn_id,
                    reason: d.reason as u16,
                }
            }
            _ => return,
        };
        publish_central(&CENTRAL_EVENTS, event);
    }
}
