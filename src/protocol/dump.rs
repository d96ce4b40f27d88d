//! Dump catalog for the Microwave II/XT.
//!
//! Maps the command byte at offset 4 of a SysEx dump to its type and the
//! positions of its bank, patch, and name fields.

use std::collections::BTreeSet;
use std::fmt;

use crate::codec;

pub const CMD_SOUND: u8 = 0x10;
pub const CMD_MULTI: u8 = 0x11;
pub const CMD_WAVE: u8 = 0x12;
pub const CMD_WAVE_CTRL_TABLE: u8 = 0x13;
pub const CMD_GLOBAL: u8 = 0x14;
pub const CMD_DISPLAY: u8 = 0x15;
pub const CMD_REMOTE: u8 = 0x16;
pub const CMD_MODE: u8 = 0x17;

/// Bank byte value the Microwave uses for edit-buffer dumps.
pub const BANK_EDIT_BUFFER: u8 = 0x20;

/// How a single-item dump turns its bank/patch bytes into a file name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Numbering {
    /// No numbering (global, display, remote, mode).
    None,
    /// Banks 0 and 1 become `A`/`B` before the padded patch number; other
    /// banks are edit-buffer dumps and get no number.
    BankLetter { width: usize },
    /// Bank 0 gives a plain padded number; other banks get no number.
    FirstBankOnly { width: usize },
    /// `bank * 128 + patch`, always numbered.
    Scaled128 { width: usize },
}

/// One entry of the catalog. Immutable once the catalog is built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DumpType {
    pub command_id: u8,
    pub name: &'static str,
    pub bank_offset: Option<usize>,
    pub patch_offset: Option<usize>,
    pub name_field_offset: Option<usize>,
    pub name_field_length: Option<usize>,
    /// Length of a one-item dump. Any other length is a bulk dump.
    pub single_length: Option<usize>,
    pub numbering: Numbering,
}

impl DumpType {
    const fn plain(command_id: u8, name: &'static str) -> Self {
        Self {
            command_id,
            name,
            bank_offset: None,
            patch_offset: None,
            name_field_offset: None,
            name_field_length: None,
            single_length: None,
            numbering: Numbering::None,
        }
    }

    /// Whether this type has per-item fields at all.
    pub fn is_numbered(&self) -> bool {
        self.numbering != Numbering::None
    }

    /// Whether a dump of `len` bytes is a single item (as opposed to a bulk
    /// dump of the whole bank).
    pub fn is_single(&self, len: usize) -> bool {
        self.single_length == Some(len)
    }

    /// Whether operators save dumps of this type to disk.
    ///
    /// Display, mode, and remote dumps describe transient panel state.
    pub fn is_savable(&self) -> bool {
        !matches!(self.command_id, CMD_DISPLAY | CMD_MODE | CMD_REMOTE)
    }

    /// Plural used for bulk dumps ("sounds", "wave control tables").
    pub fn plural(&self) -> String {
        format!("{}s", self.name)
    }

    /// File name stem for a dump of this type, without timestamp or
    /// extension.
    ///
    /// Returns `None` if the message is too short for a declared field.
    pub fn stem(&self, msg: &[u8]) -> Option<String> {
        if !self.is_numbered() {
            return Some(self.name.to_string());
        }
        if !self.is_single(msg.len()) {
            return Some(self.plural());
        }

        let number = self.number_prefix(msg)?;
        let name = match (self.name_field_offset, self.name_field_length) {
            (Some(offset), Some(len)) => Some(codec::read_name(msg, offset, len)?),
            _ => None,
        };

        let stem = match (number, name) {
            (Some(n), Some(name)) if !name.is_empty() => format!("{n}-{name}"),
            (Some(n), _) => n,
            (None, Some(name)) if !name.is_empty() => name,
            (None, _) => self.name.to_string(),
        };
        Some(stem)
    }

    /// `Some(None)` means the bank selects an edit buffer and the item has no
    /// number.
    fn number_prefix(&self, msg: &[u8]) -> Option<Option<String>> {
        let bank = match self.bank_offset {
            Some(offset) => codec::read_u7(msg, offset)?,
            None => 0,
        };
        let patch = codec::read_u7(msg, self.patch_offset?)?;

        let prefix = match self.numbering {
            Numbering::None => None,
            Numbering::BankLetter { width } => match bank {
                0 => Some(format!("A{patch:0width$}")),
                1 => Some(format!("B{patch:0width$}")),
                _ => None,
            },
            Numbering::FirstBankOnly { width } => match bank {
                0 => Some(format!("{patch:0width$}")),
                _ => None,
            },
            Numbering::Scaled128 { width } => {
                let n = codec::read_u14(msg, self.bank_offset?, self.patch_offset?)?;
                Some(format!("{n:0width$}"))
            }
        };
        Some(prefix)
    }
}

impl fmt::Display for DumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Table of dump types keyed by command byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpCatalog {
    entries: Vec<DumpType>,
}

impl DumpCatalog {
    /// The Microwave II/XT table.
    pub fn microwave() -> Self {
        let entries = vec![
            DumpType {
                command_id: CMD_SOUND,
                name: "sound",
                bank_offset: Some(5),
                patch_offset: Some(6),
                name_field_offset: Some(247),
                name_field_length: Some(16),
                single_length: Some(265),
                numbering: Numbering::BankLetter { width: 3 },
            },
            DumpType {
                command_id: CMD_MULTI,
                name: "multi",
                bank_offset: Some(5),
                patch_offset: Some(6),
                name_field_offset: Some(7),
                name_field_length: Some(16),
                single_length: Some(265),
                numbering: Numbering::FirstBankOnly { width: 2 },
            },
            DumpType {
                command_id: CMD_WAVE,
                name: "wave",
                bank_offset: Some(5),
                patch_offset: Some(6),
                name_field_offset: None,
                name_field_length: None,
                single_length: Some(137),
                numbering: Numbering::Scaled128 { width: 3 },
            },
            DumpType {
                command_id: CMD_WAVE_CTRL_TABLE,
                name: "wave control table",
                bank_offset: Some(5),
                patch_offset: Some(6),
                name_field_offset: None,
                name_field_length: None,
                single_length: Some(265),
                numbering: Numbering::Scaled128 { width: 3 },
            },
            DumpType::plain(CMD_GLOBAL, "global"),
            DumpType::plain(CMD_DISPLAY, "display"),
            DumpType::plain(CMD_REMOTE, "remote"),
            DumpType::plain(CMD_MODE, "mode"),
        ];
        Self { entries }
    }

    /// Look up a dump type by command byte.
    pub fn lookup(&self, command_id: u8) -> Option<&DumpType> {
        self.entries.iter().find(|t| t.command_id == command_id)
    }

    /// Look up the dump type of a whole message (SysEx with a command byte).
    pub fn classify(&self, msg: &[u8]) -> Option<&DumpType> {
        if !crate::sysex::is_sysex(msg) {
            return None;
        }
        self.lookup(crate::sysex::command_byte(msg)?)
    }

    /// Names of all dump types.
    pub fn all_names(&self) -> BTreeSet<&'static str> {
        self.entries.iter().map(|t| t.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DumpType> {
        self.entries.iter()
    }
}

impl Default for DumpCatalog {
    fn default() -> Self {
        Self::microwave()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
