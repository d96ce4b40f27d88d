//! Suggested file names for saved dumps.

use chrono::{Local, NaiveDateTime};

use crate::error::{Error, Result};
use crate::protocol::dump::DumpCatalog;
use crate::sysex;

/// Extension of saved dump files.
pub const EXTENSION: &str = "syx";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Suggest a file name for `msg`, stamped with the current local time.
pub fn suggest(msg: &[u8], catalog: &DumpCatalog) -> Result<String> {
    suggest_at(msg, catalog, Local::now().naive_local())
}

/// Suggest a file name for `msg`, stamped with `at`.
///
/// `A005-LEAD 1-2026-10-16-12-30-00.syx` for a single sound, `sounds-...`
/// for a bulk sound dump, `global-...` for types without item numbers. A
/// SysEx message with an unknown command byte gets the timestamp alone.
pub fn suggest_at(msg: &[u8], catalog: &DumpCatalog, at: NaiveDateTime) -> Result<String> {
    if !sysex::is_sysex(msg) {
        return Err(Error::NoDump);
    }
    let cmd = sysex::command_byte(msg).ok_or(Error::NoDump)?;

    let stem = match catalog.lookup(cmd) {
        Some(kind) => kind.stem(msg).ok_or(Error::NoDump)?,
        None => String::new(),
    };

    let stamp = at.format(TIMESTAMP_FORMAT);
    if stem.is_empty() {
        Ok(format!("{stamp}.{EXTENSION}"))
    } else {
        Ok(format!("{stem}-{stamp}.{EXTENSION}"))
    }
}
