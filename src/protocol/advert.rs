//! Advertising-data (AD structure) codec.
//!
//! Each AD structure is `[len][type][data; len - 1]`.  The sensing node puts
//! the 128-bit service UUID into the advertising packet itself, so a scanner
//! can match it before connecting; the local name rides in the scan
//! response.
//!
//! ```text
//! adv:       02 01 06 | 11 07 <uuid128 LE>
//! scan rsp:  08 09 "TempMon"
//! ```

/// Legacy advertising payload limit.
pub const ADV_MAX_LEN: usize = 31;

pub const AD_TYPE_FLAGS: u8 = 0x01;
pub const AD_TYPE_UUID128_INCOMPLETE: u8 = 0x06;
pub const AD_TYPE_UUID128_COMPLETE: u8 = 0x07;
pub const AD_TYPE_NAME_SHORT: u8 = 0x08;
pub const AD_TYPE_NAME_COMPLETE: u8 = 0x09;

/// LE General Discoverable | BR/EDR not supported.
pub const FLAGS_GENERAL_DISC_LE_ONLY: u8 = 0x02 | 0x04;

pub type AdBuffer = heapless::Vec<u8, ADV_MAX_LEN>;

/// Advertising packet and scan response, ready to hand to the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingData {
    pub adv: AdBuffer,
    pub scan_response: AdBuffer,
}

impl AdvertisingData {
    /// Build the sensing node's advertisement for `service`.
    ///
    /// The name is shortened (and tagged as such) when it does not fit.
    pub fn build(name: &str, service: u128) -> Self {
        let mut adv = AdBuffer::new();
        push_structure(&mut adv, AD_TYPE_FLAGS, &[FLAGS_GENERAL_DISC_LE_ONLY]);
        push_structure(&mut adv, AD_TYPE_UUID128_COMPLETE, &service.to_le_bytes());

        let mut scan_response = AdBuffer::new();
        let room = ADV_MAX_LEN - 2;
        if name.len() <= room {
            push_structure(&mut scan_response, AD_TYPE_NAME_COMPLETE, name.as_bytes());
        } else {
            let mut cut = room;
            while !name.is_char_boundary(cut) {
                cut -= 1;
            }
            push_structure(&mut scan_response, AD_TYPE_NAME_SHORT, &name.as_bytes()[..cut]);
        }

        Self { adv, scan_response }
    }
}

/// Append one AD structure; returns `false` (buffer untouched) if it does
/// not fit.
fn push_structure(buf: &mut AdBuffer, ad_type: u8, data: &[u8]) -> bool {
    if buf.len() + 2 + data.len() > ADV_MAX_LEN {
        return false;
    }
    // Capacity checked above.
    let _ = buf.push((data.len() + 1) as u8);
    let _ = buf.push(ad_type);
    let _ = buf.extend_from_slice(data);
    true
}

/// Iterator over `(type, data)` pairs.  Stops at the first zero-length or
/// truncated structure.
pub struct AdStructures<'a> {
    rest: &'a [u8],
}

impl<'a> AdStructures<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { rest: data }
    }
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, tail) = self.rest.split_first()?;
        let len = len as usize;
        if len == 0 || len > tail.len() {
            self.rest = &[];
            return None;
        }
        let (structure, rest) = tail.split_at(len);
        self.rest = rest;
        Some((structure[0], &structure[1..]))
    }
}

/// Does this advertisement list `service` among its 128-bit UUIDs?
pub fn advertises_service(data: &[u8], service: u128) -> bool {
    let wanted = service.to_le_bytes();
    AdStructures::new(data)
        .filter(|(ty, _)| matches!(*ty, AD_TYPE_UUID128_COMPLETE | AD_TYPE_UUID128_INCOMPLETE))
        .any(|(_, body)| body.chunks_exact(16).any(|uuid| uuid == wanted))
}

/// Complete or shortened local name, if present and valid UTF-8.
pub fn local_name(data: &[u8]) -> Option<&str> {
    AdStructures::new(data)
        .find(|(ty, _)| matches!(*ty, AD_TYPE_NAME_COMPLETE | AD_TYPE_NAME_SHORT))
        .and_then(|(_, body)| core::str::from_utf8(body).ok())
}
