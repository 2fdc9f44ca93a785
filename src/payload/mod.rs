//! Payload encodings attached to postings.
//!
//! Two layouts are understood by the scoring context:
//!
//! - a 4-byte big-endian integer holding a line number OR'ed with flag bits,
//!   see [`encode_int`] / [`decode_int`];
//! - a serialized compressed bitmap of line numbers, see [`LineBitmap`].
//!
//! [`PayloadProducer`] turns raw text into tokens carrying one of these layouts.

pub mod bitmap;
pub mod producer;

pub use self::bitmap::LineBitmap;
pub use self::producer::{PayloadProducer, ProducedToken};

use byteorder::{BigEndian, ByteOrder};

/// Flag marking a token on a structurally important line.
pub const IMPORTANT_LINE: u32 = 1 << 29;

/// Flag marking a token that occurs in the document path.
pub const IN_PATH: u32 = 1 << 30;

/// Bits of an int payload that hold the line number.
pub const LINE_MASK: u32 = IMPORTANT_LINE - 1;

/// Encode an int payload.
pub fn encode_int(value: u32) -> [u8; 4] {
    let mut bytes = [0u8; 4];
    BigEndian::write_u32(&mut bytes, value);
    bytes
}

/// Decode an int payload. A missing payload decodes as 0.
///
/// The value is read as a signed integer, so a payload with the top bit set
/// comes back negative; `as u32` restores the encoded bit pattern. Payloads
/// shorter than four bytes are read as a big-endian integer of their length.
pub fn decode_int(payload: Option<&[u8]>) -> i32 {
    match payload {
        None => 0,
        Some(bytes) if bytes.len() >= 4 => BigEndian::read_i32(bytes),
        Some(bytes) => decode_long(bytes, 0, bytes.len()) as i32,
    }
}

/// Decode a big-endian integer of `len` bytes starting at `offset`.
///
/// The range is clamped to the payload and to eight bytes; an empty range
/// decodes as 0.
pub fn decode_long(payload: &[u8], offset: usize, len: usize) -> i64 {
    let start = offset.min(payload.len());
    let end = start.saturating_add(len.min(8)).min(payload.len());
    if end == start {
        return 0;
    }
    BigEndian::read_uint(&payload[start..end], end - start) as i64
}

/// Line number stored in an int payload.
pub fn line_of(value: u32) -> u32 {
    value & LINE_MASK
}

/// Whether an int payload carries the important line flag.
pub fn is_important_line(value: u32) -> bool {
    value & IMPORTANT_LINE != 0
}

/// Whether an int payload carries the in-path flag.
pub fn is_in_path(value: u32) -> bool {
    value & IN_PATH != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_round_trip() {
        for value in [0u32, 1, 42, 65_535, LINE_MASK, IMPORTANT_LINE | 17, u32::MAX, 1 << 31] {
            let bytes = encode_int(value);
            assert_eq!(decode_int(Some(&bytes)) as u32, value);
        }
    }

    #[test]
    fn test_top_bit_decodes_negative() {
        let bytes = encode_int(0x8000_0001);
        assert_eq!(decode_int(Some(&bytes)), i32::MIN + 1);
    }

    #[test]
    fn test_missing_and_short_payloads() {
        assert_eq!(decode_int(None), 0);
        assert_eq!(decode_int(Some(&[])), 0);
        assert_eq!(decode_int(Some(&[0x01, 0x02])), 0x0102);
        // trailing bytes are ignored
        assert_eq!(decode_int(Some(&[0, 0, 0, 7, 0xff])), 7);
    }

    #[test]
    fn test_decode_long_clamps() {
        let payload = [0x00, 0x01, 0x02, 0x03, 0x04];
        assert_eq!(decode_long(&payload, 1, 2), 0x0102);
        assert_eq!(decode_long(&payload, 3, 10), 0x0304);
        assert_eq!(decode_long(&payload, 9, 2), 0);
        assert_eq!(decode_long(&payload, 0, 0), 0);
        assert_eq!(decode_long(&[0xff; 12], 0, 12), -1);
    }

    #[test]
    fn test_flags() {
        let value = 120 | IMPORTANT_LINE | IN_PATH;
        assert_eq!(line_of(value), 120);
        assert!(is_important_line(value));
        assert!(is_in_path(value));
        assert!(!is_important_line(120));
    }
}
