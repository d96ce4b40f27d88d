//! Channel voice messages shown in direct mode.

/// Controller change `Bn CC VV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlChange {
    pub channel: u8,
    pub controller: u8,
    pub value: u8,
}

impl ControlChange {
    pub fn decode(msg: &[u8]) -> Option<Self> {
        match msg {
            [status, controller, value] if status & 0xF0 == 0xB0 => Some(Self {
                channel: status & 0x0F,
                controller: *controller,
                value: *value,
            }),
            _ => None,
        }
    }
}

/// Program change `Cn PP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramChange {
    pub channel: u8,
    pub program: u8,
}

impl ProgramChange {
    pub fn decode(msg: &[u8]) -> Option<Self> {
        match msg {
            [status, program, ..] if status & 0xF0 == 0xC0 => Some(Self {
                channel: status & 0x0F,
                program: *program,
            }),
            _ => None,
        }
    }
}
