//! Text and byte-string utilities used by the protocol engines.
//!
//! Pure functions, no state. These cover the conversions the wire format
//! needs (hex rendering of CRC values, Base64 payload transport, parameter
//! splitting) plus the printable-byte policy and a CR/LF-visible renderer
//! for trace logging.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::{BS, CR, LF};

/// Byte-acceptance policy for the parsers: printable ASCII plus the
/// protocol's own control characters (CR, LF, backspace). Everything else
/// is line noise.
pub fn printable(b: u8) -> bool {
    (0x20..=0x7E).contains(&b) || b == CR || b == LF || b == BS
}

/// Render bytes for diagnostics with control characters made visible:
/// CR as `<cr>`, LF as `<lf>`, other unprintables as `[xx]`.
pub fn debug_str(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 8);
    for &b in bytes {
        match b {
            CR => out.push_str("<cr>"),
            LF => out.push_str("<lf>"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("[{b:02X}]")),
        }
    }
    out
}

/// Render a value as fixed-width uppercase hex, zero-padded.
///
/// ```
/// assert_eq!(atkit_core::text::int_to_hex(255, 4), "00FF");
/// ```
pub fn int_to_hex(value: u32, width: usize) -> String {
    format!("{value:0width$X}")
}

/// Parse an unsigned value from a hex string. Returns `None` on any
/// non-hex character or empty input.
///
/// ```
/// assert_eq!(atkit_core::text::hex_to_int("86C5"), Some(34501));
/// ```
pub fn hex_to_int(s: &str) -> Option<u32> {
    u32::from_str_radix(s.trim(), 16).ok()
}

/// True if the string is non-empty and entirely hex digits.
pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Encode bytes as standard Base64 with padding.
pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Decode standard Base64; `None` if the input is not valid Base64.
pub fn base64_decode(s: &str) -> Option<Vec<u8>> {
    BASE64.decode(s).ok()
}

/// Split a comma-separated parameter list, trimming whitespace around each
/// parameter. An empty input yields no parameters.
pub fn split_parameters(s: &str) -> Vec<&str> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split(',').map(str::trim).collect()
}
