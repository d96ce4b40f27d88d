//! Message types and decode dispatch.
//!
//! - [`Message`]: what the Microwave (or anything else on the link) sends us.
//! - Requests we send are fixed byte strings: the display request built by
//!   [`display::build_request`] and [`identity::IDENTITY_REQUEST`].
//!
//! Decoding never fails. Anything unrecognised is kept as
//! [`Message::Other`] with its raw bytes, so the mirror engine can still
//! deduplicate and show it.

pub mod channel;
pub mod display;
pub mod dump;
pub mod identity;

use std::fmt;

use crate::sysex;

use self::channel::{ControlChange, ProgramChange};
use self::dump::{DumpCatalog, DumpType};
use self::identity::IdentityReply;

/// A decoded inbound message.
#[derive(Debug, Clone)]
pub enum Message {
    /// Display dump (screen contents).
    Display(Vec<u8>),
    /// Universal identity reply.
    Identity(IdentityReply),
    /// Catalogued dump (sound, multi, wave, ...).
    Dump { kind: DumpType, raw: Vec<u8> },
    ControlChange(ControlChange),
    ProgramChange(ProgramChange),
    /// Anything else, including SysEx with an unknown command byte.
    Other(Vec<u8>),
}

impl Message {
    /// Classify a raw message against the instrument's catalog.
    pub fn decode(msg: &[u8], catalog: &DumpCatalog, display_dump_cmd: u8) -> Self {
        if let Some(reply) = IdentityReply::decode(msg) {
            return Message::Identity(reply);
        }
        if sysex::is_sysex(msg) {
            return match catalog.classify(msg) {
                Some(kind) if kind.command_id == display_dump_cmd => Message::Display(msg.to_vec()),
                Some(kind) => Message::Dump { kind: kind.clone(), raw: msg.to_vec() },
                None => Message::Other(msg.to_vec()),
            };
        }
        if let Some(cc) = ControlChange::decode(msg) {
            return Message::ControlChange(cc);
        }
        if let Some(pc) = ProgramChange::decode(msg) {
            return Message::ProgramChange(pc);
        }
        Message::Other(msg.to_vec())
    }
}

impl fmt::Display for Message {
    /// One-line description as shown in direct mode.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Display(_) => write!(f, "Display dump"),
            Message::Identity(r) => write!(
                f,
                "Identity reply: manufacturer 0x{:02X} equipment 0x{:02X} device {}",
                r.manufacturer_id, r.equipment_id, r.device
            ),
            Message::Dump { kind, .. } => match kind.command_id {
                dump::CMD_WAVE_CTRL_TABLE => write!(f, "WaveTable dump"),
                dump::CMD_GLOBAL => write!(f, "Global parameter dump"),
                _ => write!(f, "{} dump", capitalize(kind.name)),
            },
            Message::ControlChange(cc) => write!(f, "Controller {}: {}", cc.controller, cc.value),
            Message::ProgramChange(pc) => write!(f, "Program change: {}", pc.program),
            Message::Other(raw) => f.write_str(&sysex::hex(raw, 24)),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
