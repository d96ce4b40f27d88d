//! SysEx framing and MIDI byte-stream splitting.
//!
//! Wire format of a manufacturer message:
//! ```text
//! F0 MAN EQUIP DEV CMD DATA... F7
//! ```

use std::fmt::Write as _;

use thiserror::Error;

pub const START: u8 = 0xF0;
pub const END: u8 = 0xF7;

/// Offset of the command byte in a Waldorf SysEx message.
pub const CMD_OFFSET: usize = 4;

/// Errors from framing a raw message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("message too short ({len} bytes, minimum {min})")]
    TooShort { len: usize, min: usize },

    #[error("missing start marker (expected 0xF0, got 0x{got:02X})")]
    MissingStart { got: u8 },

    #[error("missing end marker (expected 0xF7, got 0x{got:02X})")]
    MissingEnd { got: u8 },

    #[error("data byte 0x{byte:02X} at offset {offset} is not 7-bit")]
    NotSevenBit { byte: u8, offset: usize },
}

/// A borrowed view of one complete `F0 ... F7` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Validate framing of a complete message (markers and 7-bit body).
    pub fn parse(bytes: &'a [u8]) -> Result<Self, FrameError> {
        if bytes.len() < 2 {
            return Err(FrameError::TooShort { len: bytes.len(), min: 2 });
        }
        if bytes[0] != START {
            return Err(FrameError::MissingStart { got: bytes[0] });
        }
        let last = bytes[bytes.len() - 1];
        if last != END {
            return Err(FrameError::MissingEnd { got: last });
        }
        if let Some(offset) = bytes[1..bytes.len() - 1].iter().position(|&b| b & 0x80 != 0) {
            return Err(FrameError::NotSevenBit { byte: bytes[offset + 1], offset: offset + 1 });
        }
        Ok(Self { bytes })
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Byte at `offset`, if present.
    pub fn get(&self, offset: usize) -> Option<u8> {
        self.bytes.get(offset).copied()
    }

    /// Body between the markers.
    pub fn body(&self) -> &'a [u8] {
        &self.bytes[1..self.bytes.len() - 1]
    }
}

/// Whether `msg` begins with the SysEx start marker.
pub fn is_sysex(msg: &[u8]) -> bool {
    msg.first() == Some(&START)
}

/// The command byte at offset 4, if the message is long enough to carry one.
pub fn command_byte(msg: &[u8]) -> Option<u8> {
    msg.get(CMD_OFFSET).copied()
}

/// Format bytes as space-separated hex ("F0 3E 0E ..."), truncated after
/// `limit` bytes.
pub fn hex(bytes: &[u8], limit: usize) -> String {
    let mut s = String::with_capacity(bytes.len().min(limit) * 3 + 3);
    for (i, b) in bytes.iter().take(limit).enumerate() {
        if i > 0 {
            s.push(' ');
        }
        let _ = write!(s, "{b:02X}");
    }
    if bytes.len() > limit {
        s.push_str("...");
    }
    s
}

/// Splits a raw MIDI byte stream into whole messages. Buffers partial data
/// across calls, so it can be fed arbitrary read boundaries.
///
/// Handles SysEx (`F0 .. F7`), channel voice messages with running status,
/// and single-byte system real-time messages, which may interleave anywhere.
pub struct MessageSplitter {
    buf: Vec<u8>,
    in_sysex: bool,
    running_status: Option<u8>,
    expected: usize,
}

impl MessageSplitter {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(512),
            in_sysex: false,
            running_status: None,
            expected: 0,
        }
    }

    /// Feed new data and extract any complete messages, in arrival order.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        for &b in data {
            if b >= 0xF8 {
                // Real-time: never interrupts the message in progress.
                if b != 0xFE {
                    out.push(vec![b]);
                }
                continue;
            }
            if b == START {
                self.buf.clear();
                self.buf.push(b);
                self.in_sysex = true;
                self.running_status = None;
                continue;
            }
            if self.in_sysex {
                if b == END {
                    self.buf.push(b);
                    out.push(std::mem::take(&mut self.buf));
                    self.in_sysex = false;
                    continue;
                }
                if b & 0x80 == 0 {
                    self.buf.push(b);
                    continue;
                }
                // Any other status byte aborts the unterminated SysEx.
                self.in_sysex = false;
                self.buf.clear();
            }
            if b & 0x80 != 0 {
                self.buf.clear();
                match b {
                    0x80..=0xEF => {
                        self.running_status = Some(b);
                        self.expected = channel_data_len(b);
                        self.buf.push(b);
                    }
                    0xF1 | 0xF3 => {
                        self.running_status = None;
                        self.expected = 1;
                        self.buf.push(b);
                    }
                    0xF2 => {
                        self.running_status = None;
                        self.expected = 2;
                        self.buf.push(b);
                    }
                    0xF6 => {
                        self.running_status = None;
                        out.push(vec![b]);
                    }
                    // Stray F7, undefined F4/F5.
                    _ => self.running_status = None,
                }
                continue;
            }
            // Data byte outside SysEx.
            if self.buf.is_empty() {
                match self.running_status {
                    Some(status) => self.buf.push(status),
                    None => continue,
                }
            }
            self.buf.push(b);
            if self.buf.len() == self.expected + 1 {
                out.push(std::mem::take(&mut self.buf));
            }
        }
        out
    }
}

impl Default for MessageSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn channel_data_len(status: u8) -> usize {
    match status & 0xF0 {
        0xC0 | 0xD0 => 1,
        _ => 2,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DISPLAY_REQ: [u8; 7] = [0xF0, 0x3E, 0x0E, 0x7F, 0x05, 0x00, 0xF7];

    #[test]
    fn parse_display_request() {
        let frame = Frame::parse(&DISPLAY_REQ).unwrap();
        assert_eq!(frame.len(), 7);
        assert_eq!(frame.get(CMD_OFFSET), Some(0x05));
        assert_eq!(frame.body(), &[0x3E, 0x0E, 0x7F, 0x05, 0x00]);
    }

    #[test]
    fn parse_rejects_bad_markers() {
        assert_eq!(Frame::parse(&[0xF0]), Err(FrameError::TooShort { len: 1, min: 2 }));
        assert_eq!(Frame::parse(&[0xB0, 0x07, 0x64]), Err(FrameError::MissingStart { got: 0xB0 }));
        assert_eq!(Frame::parse(&[0xF0, 0x3E, 0x0E]), Err(FrameError::MissingEnd { got: 0x0E }));
    }

    #[test]
    fn parse_rejects_high_data_byte() {
        assert_eq!(
            Frame::parse(&[0xF0, 0x3E, 0x90, 0xF7]),
            Err(FrameError::NotSevenBit { byte: 0x90, offset: 2 })
        );
    }

    #[test]
    fn command_byte_needs_five_bytes() {
        assert_eq!(command_byte(&DISPLAY_REQ), Some(0x05));
        assert_eq!(command_byte(&[0xF0, 0x3E, 0x0E, 0x7F]), None);
        assert!(is_sysex(&DISPLAY_REQ));
        assert!(!is_sysex(&[0xB0, 0x07, 0x64]));
        assert!(!is_sysex(&[]));
    }

    #[test]
    fn hex_truncates() {
        assert_eq!(hex(&DISPLAY_REQ, 16), "F0 3E 0E 7F 05 00 F7");
        assert_eq!(hex(&DISPLAY_REQ, 3), "F0 3E 0E...");
        assert_eq!(hex(&[], 3), "");
    }

    #[test]
    fn splitter_whole_sysex() {
        let mut splitter = MessageSplitter::new();
        let msgs = splitter.feed(&DISPLAY_REQ);
        assert_eq!(msgs, vec![DISPLAY_REQ.to_vec()]);
    }

    #[test]
    fn splitter_partial_sysex() {
        let mut splitter = MessageSplitter::new();
        assert!(splitter.feed(&DISPLAY_REQ[..4]).is_empty());
        let msgs = splitter.feed(&DISPLAY_REQ[4..]);
        assert_eq!(msgs, vec![DISPLAY_REQ.to_vec()]);
    }

    #[test]
    fn splitter_running_status() {
        let mut splitter = MessageSplitter::new();
        let msgs = splitter.feed(&[0xB0, 0x07, 0x64, 0x0A, 0x40, 0xC1, 0x05, 0x06]);
        assert_eq!(
            msgs,
            vec![
                vec![0xB0, 0x07, 0x64],
                vec![0xB0, 0x0A, 0x40],
                vec![0xC1, 0x05],
                vec![0xC1, 0x06],
            ]
        );
    }

    #[test]
    fn splitter_realtime_inside_sysex() {
        let mut splitter = MessageSplitter::new();
        let mut data = DISPLAY_REQ.to_vec();
        data.insert(3, 0xF8);
        data.insert(5, 0xFE);
        let msgs = splitter.feed(&data);
        assert_eq!(msgs, vec![vec![0xF8], DISPLAY_REQ.to_vec()]);
    }

    #[test]
    fn splitter_drops_garbage_and_aborted_sysex() {
        let mut splitter = MessageSplitter::new();
        let mut data = vec![0x12, 0x34, 0xF0, 0x3E, 0x90, 0x3C, 0x7F];
        data.extend_from_slice(&DISPLAY_REQ);
        let msgs = splitter.feed(&data);
        assert_eq!(msgs, vec![vec![0x90, 0x3C, 0x7F], DISPLAY_REQ.to_vec()]);
    }
}
