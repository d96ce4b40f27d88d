//! Display request and display dump.

use crate::codec;

/// First content byte of a display dump.
pub const CONTENT_OFFSET: usize = 5;

/// Build the 7-byte display request `F0 MAN EQUIP DEV CMD 00 F7`.
pub fn build_request(manufacturer_id: u8, equipment_id: u8, device_id: u8, request_cmd: u8) -> [u8; 7] {
    [0xF0, manufacturer_id, equipment_id, device_id, request_cmd, 0x00, 0xF7]
}

/// Decode a display dump into `rows` lines of `cols` characters.
///
/// The content region runs from offset 5 up to, but excluding, the trailing
/// terminator. Control bytes are dropped before the text is cut into rows,
/// so rows are always taken at fixed width from the filtered text. Rows past
/// the end of the text come back empty or short.
pub fn decode_lines(msg: &[u8], cols: usize, rows: usize) -> Vec<String> {
    let content: &[u8] = if msg.len() > CONTENT_OFFSET + 1 {
        &msg[CONTENT_OFFSET..msg.len() - 1]
    } else {
        &[]
    };
    let text: Vec<char> = codec::printable(content).chars().collect();

    (0..rows)
        .map(|row| {
            let start = (row * cols).min(text.len());
            let end = (start + cols).min(text.len());
            text[start..end].iter().collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display_dump(text: &[u8]) -> Vec<u8> {
        let mut msg = vec![0xF0, 0x3E, 0x0E, 0x00, 0x15];
        msg.extend_from_slice(text);
        msg.push(0xF7);
        msg
    }

    #[test]
    fn request_layout() {
        assert_eq!(build_request(0x3E, 0x0E, 0x7F, 0x05), [0xF0, 0x3E, 0x0E, 0x7F, 0x05, 0x00, 0xF7]);
    }

    #[test]
    fn two_rows_of_forty() {
        let top = format!("{:<40}", "SOUND A001  Init Sound");
        let bottom = format!("{:<40}", "OSC1 Wave 1   Octave 0   Semitone 0");
        let msg = display_dump(format!("{top}{bottom}").as_bytes());
        let lines = decode_lines(&msg, 40, 2);
        assert_eq!(lines, vec![top, bottom]);
    }

    #[test]
    fn control_bytes_do_not_shift_rows() {
        let mut text = Vec::new();
        text.extend_from_slice(b"ABCD");
        text.push(0x01);
        text.extend_from_slice(b"EFGH");
        let lines = decode_lines(&display_dump(&text), 4, 2);
        assert_eq!(lines, vec!["ABCD", "EFGH"]);
    }

    #[test]
    fn short_text_gives_short_rows() {
        let lines = decode_lines(&display_dump(b"HELLO"), 4, 3);
        assert_eq!(lines, vec!["HELL", "O", ""]);
    }

    #[test]
    fn degenerate_messages() {
        assert_eq!(decode_lines(&[0xF0, 0x3E, 0x0E, 0x00, 0x15, 0xF7], 40, 2), vec!["", ""]);
        assert_eq!(decode_lines(&[0xF0], 40, 2), vec!["", ""]);
    }
}
