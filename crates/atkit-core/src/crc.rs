//! CRC-16 integrity suffix for AT command lines.
//!
//! Some satellite modems protect each line with a trailing `*HHHH` token:
//! a literal separator byte followed by exactly four uppercase hex digits,
//! a CRC-16 (polynomial 0x1021, initial value 0xFFFF, no reflection)
//! computed over every byte of the line before the separator.
//!
//! The lookup table is generated at compile time.

use crate::text::{hex_to_int, int_to_hex};
use crate::{CRC_LEN, CRC_SEP};

/// CRC-16 polynomial.
const POLY: u16 = 0x1021;

/// Initial value for CRC calculation.
const INIT: u16 = 0xFFFF;

const CRC_TABLE: [u16; 256] = {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Calculate the CRC-16 checksum of `data`.
#[inline]
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = INIT;
    for &byte in data {
        let index = ((crc >> 8) ^ u16::from(byte)) as usize;
        crc = (crc << 8) ^ CRC_TABLE[index];
    }
    crc
}

/// Position of the last CRC separator in `line`, if any.
fn sep_position(line: &str) -> Option<usize> {
    line.as_bytes().iter().rposition(|&b| b == CRC_SEP)
}

/// Append a CRC suffix to a command line.
///
/// The checksum covers every byte before any separator already present
/// (or the whole line if none is); the suffix is rendered as the separator
/// followed by four uppercase hex digits.
///
/// ```
/// assert_eq!(atkit_core::crc::apply_crc("AT%CRC=1"), "AT%CRC=1*ABCA");
/// ```
#[must_use]
pub fn apply_crc(line: &str) -> String {
    let covered = match sep_position(line) {
        Some(pos) => &line.as_bytes()[..pos],
        None => line.as_bytes(),
    };
    let crc = crc16(covered);
    let mut out = String::with_capacity(line.len() + 1 + CRC_LEN);
    out.push_str(line);
    out.push(CRC_SEP as char);
    out.push_str(&int_to_hex(u32::from(crc), CRC_LEN));
    out
}

/// Validate the CRC suffix of a received line.
///
/// Locates the last separator, recomputes the checksum over the preceding
/// bytes, and compares it with the four hex digits that follow. Returns
/// false if no separator is present, if fewer than four digits follow it,
/// or if the values disagree. Bytes after the four digits (a trailing
/// terminator) are ignored.
#[must_use]
pub fn validate_crc(line: &str) -> bool {
    let Some(pos) = sep_position(line) else {
        return false;
    };
    let digits = &line[pos + 1..];
    if digits.len() < CRC_LEN {
        return false;
    }
    let Some(received) = hex_to_int(&digits[..CRC_LEN]) else {
        return false;
    };
    u32::from(crc16(&line.as_bytes()[..pos])) == received
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_known_vectors() {
        // Catalog vector for poly 0x1021 / init 0xFFFF / no reflection.
        assert_eq!(crc16(b"123456789"), 0x29B1);
        // Vectors from the protocol's reference devices.
        assert_eq!(crc16(b"AT%CRC=0"), 0xBBEB);
        assert_eq!(crc16(b"\r\nOK\r\n"), 0x86C5);
    }

    #[test]
    fn crc16_empty_is_init() {
        assert_eq!(crc16(b""), 0xFFFF);
    }

    #[test]
    fn apply_crc_appends_separator_and_hex() {
        assert_eq!(apply_crc("AT%CRC=0"), "AT%CRC=0*BBEB");
    }

    #[test]
    fn apply_crc_covers_only_bytes_before_existing_separator() {
        // A line already carrying a separator: the checksum covers the
        // original body, not the stale suffix.
        let framed = apply_crc("AT*old");
        assert!(framed.starts_with("AT*old*"));
        let expected = int_to_hex(u32::from(crc16(b"AT")), CRC_LEN);
        assert!(framed.ends_with(&expected));
    }

    #[test]
    fn validate_accepts_applied_crc() {
        for line in ["AT", "AT+GSN", "ATS0=1", "\r\nOK\r\n", ""] {
            assert!(validate_crc(&apply_crc(line)), "round trip failed: {line:?}");
        }
    }

    #[test]
    fn validate_accepts_trailing_terminator() {
        assert!(validate_crc("\r\nOK\r\n*86C5\r\n"));
    }

    #[test]
    fn validate_rejects_corrupt_digit() {
        let framed = apply_crc("AT+GSN");
        // Corrupting any single hex digit must break validation.
        for i in framed.len() - CRC_LEN..framed.len() {
            let mut corrupt = framed.clone().into_bytes();
            corrupt[i] = if corrupt[i] == b'0' { b'1' } else { b'0' };
            let corrupt = String::from_utf8(corrupt).expect("ascii");
            assert!(!validate_crc(&corrupt), "corruption at {i} not detected");
        }
    }

    #[test]
    fn validate_rejects_missing_or_short_suffix() {
        assert!(!validate_crc("AT+GSN"));
        assert!(!validate_crc("AT+GSN*"));
        assert!(!validate_crc("AT+GSN*AB"));
        assert!(!validate_crc("AT+GSN*WXYZ"));
    }
}
