//! Universal (non-realtime) identity request/reply.

use crate::id::DeviceId;

/// `F0 7E 7F 06 01 F7`: identity request addressed to every device.
pub const IDENTITY_REQUEST: [u8; 6] = [0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7];

/// Length of an identity reply.
pub const REPLY_LEN: usize = 14;

const UNIVERSAL_NON_REALTIME: u8 = 0x7E;
const GENERAL_INFO: u8 = 0x06;
const IDENTITY_REPLY: u8 = 0x02;

/// Identity reply (14 bytes).
///
/// `F0 7E 06 02 MAN EQUIP DEV ...`. The Microwave puts its own device id at
/// offset 6 rather than in the usual channel slot after `7E`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityReply {
    pub manufacturer_id: u8,
    pub equipment_id: u8,
    /// Raw device byte at offset 6.
    pub device: u8,
    /// Firmware/version bytes 7..=12.
    pub version: [u8; 6],
}

impl IdentityReply {
    /// Decode a full identity reply, checking every header byte.
    pub fn decode(msg: &[u8]) -> Option<Self> {
        if msg.len() != REPLY_LEN {
            return None;
        }
        if msg[0] != 0xF0 || msg[1] != UNIVERSAL_NON_REALTIME {
            return None;
        }
        if !is_reply_header(msg) {
            return None;
        }
        let mut version = [0u8; 6];
        version.copy_from_slice(&msg[7..13]);
        Some(Self {
            manufacturer_id: msg[4],
            equipment_id: msg[5],
            device: msg[6],
            version,
        })
    }

    /// Whether this reply came from a device of the given make and model.
    pub fn matches(&self, manufacturer_id: u8, equipment_id: u8) -> bool {
        self.manufacturer_id == manufacturer_id && self.equipment_id == equipment_id
    }

    /// The responder's device id, if it is in range.
    pub fn device_id(&self) -> Option<DeviceId> {
        DeviceId::from_byte(self.device).ok()
    }
}

/// Looser check used when reading a device id back from an already chosen
/// port: only the length and the sub-ids at offsets 2 and 3 are checked.
pub fn suggested_device_byte(msg: &[u8]) -> Option<u8> {
    if msg.len() == REPLY_LEN && is_reply_header(msg) {
        Some(msg[6])
    } else {
        None
    }
}

fn is_reply_header(msg: &[u8]) -> bool {
    msg[2] == GENERAL_INFO && msg[3] == IDENTITY_REPLY
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(man: u8, equip: u8, dev: u8) -> Vec<u8> {
        vec![0xF0, 0x7E, 0x06, 0x02, man, equip, dev, 0x00, 0x00, 0x00, 0x02, 0x05, 0x00, 0xF7]
    }

    #[test]
    fn decode_microwave_reply() {
        let r = IdentityReply::decode(&reply(0x3E, 0x0E, 0x03)).unwrap();
        assert!(r.matches(0x3E, 0x0E));
        assert!(!r.matches(0x3E, 0x0F));
        assert_eq!(r.device_id(), Some(DeviceId::new(3).unwrap()));
        assert_eq!(r.version, [0x00, 0x00, 0x00, 0x02, 0x05, 0x00]);
    }

    #[test]
    fn decode_rejects_wrong_length_or_header() {
        let mut short = reply(0x3E, 0x0E, 0x03);
        short.pop();
        assert!(IdentityReply::decode(&short).is_none());

        let mut request_echo = reply(0x3E, 0x0E, 0x03);
        request_echo[3] = 0x01;
        assert!(IdentityReply::decode(&request_echo).is_none());

        let mut realtime = reply(0x3E, 0x0E, 0x03);
        realtime[1] = 0x7F;
        assert!(IdentityReply::decode(&realtime).is_none());
    }

    #[test]
    fn suggested_byte_ignores_manufacturer() {
        assert_eq!(suggested_device_byte(&reply(0x41, 0x10, 0x11)), Some(0x11));
        assert_eq!(suggested_device_byte(&IDENTITY_REQUEST), None);
    }
}
