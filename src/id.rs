use std::fmt;

use crate::error::{Error, Result};

/// Addressable unit selector on a shared MIDI link (0-127).
///
/// 127 is the broadcast id every Microwave answers to regardless of its
/// configured device number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u16", into = "u16"))]
pub struct DeviceId(u8);

impl DeviceId {
    /// Broadcast id.
    pub const GLOBAL: DeviceId = DeviceId(0x7F);

    pub fn from_byte(b: u8) -> Result<Self> {
        Self::new(u16::from(b))
    }

    /// Validate an operator- or config-supplied id.
    pub fn new(id: u16) -> Result<Self> {
        if id > 0x7F {
            return Err(Error::InvalidDeviceId { id });
        }
        Ok(Self(id as u8))
    }

    pub fn as_byte(self) -> u8 {
        self.0
    }

    pub fn is_global(self) -> bool {
        self == Self::GLOBAL
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::GLOBAL
    }
}

impl TryFrom<u16> for DeviceId {
    type Error = Error;

    fn try_from(id: u16) -> Result<Self> {
        Self::new(id)
    }
}

impl From<DeviceId> for u16 {
    fn from(id: DeviceId) -> u16 {
        u16::from(id.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_global() {
            write!(f, "{} (global)", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}
