//! Field readers for Microwave dump messages.
//!
//! Offsets are absolute positions in the whole message, counting the leading
//! `F0`. Readers return `None` when the message is too short instead of
//! substituting zero, so a truncated dump is never mistaken for bank 0 /
//! patch 0.

/// Read one 7-bit data byte.
pub fn read_u7(msg: &[u8], offset: usize) -> Option<u8> {
    msg.get(offset).map(|&b| b & 0x7F)
}

/// Read a two-byte item number as `hi * 128 + lo`.
pub fn read_u14(msg: &[u8], hi: usize, lo: usize) -> Option<u16> {
    let hi = read_u7(msg, hi)?;
    let lo = read_u7(msg, lo)?;
    Some(u16::from(hi) * 128 + u16::from(lo))
}

/// Read a fixed-width ASCII name field and trim surrounding spaces.
///
/// Control bytes become spaces and path separators become `_`, so the result
/// is always safe to use inside a file name.
pub fn read_name(msg: &[u8], offset: usize, len: usize) -> Option<String> {
    let raw = msg.get(offset..offset.checked_add(len)?)?;
    let name: String = raw
        .iter()
        .map(|&b| match b {
            b'/' | b'\\' => '_',
            0x20..=0x7E => char::from(b),
            _ => ' ',
        })
        .collect();
    Some(name.trim_matches(' ').to_string())
}

/// Render printable display bytes (>= 32) as a string, dropping the rest.
pub fn printable(bytes: &[u8]) -> String {
    bytes.iter().filter(|&&b| b >= 32).map(|&b| char::from(b)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
