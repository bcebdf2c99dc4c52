//! Wire protocol shared by both roles.
//!
//! | Item           | UUID                                   | Perms        |
//! |----------------|----------------------------------------|--------------|
//! | Service        | `af65f22f-0b5c-4ac5-a2a1-76606258c2b0` | —            |
//! | Telemetry      | `19b10001-e8f2-537e-4f6c-d104768a1214` | Read+Notify  |
//!
//! Both identifiers are part of the wire contract: changing either breaks
//! every deployed peer.

pub mod advert;
pub mod payload;

pub use payload::{TelemetryPayload, PAYLOAD_LEN};

pub const SERVICE_UUID: u128 = 0xaf65f22f_0b5c_4ac5_a2a1_76606258c2b0;
pub const CHAR_TELEMETRY: u128 = 0x19b10001_e8f2_537e_4f6c_d104768a1214;

/// Client Characteristic Configuration descriptor (Bluetooth SIG, 16-bit).
pub const CCCD_UUID16: u16 = 0x2902;

/// Largest notification body the receiver buffers.  Anything longer is
/// reported with its true length and rejected as malformed.
pub const MAX_NOTIFICATION_LEN: usize = 32;
