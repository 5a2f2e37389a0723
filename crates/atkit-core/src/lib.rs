//! atkit-core: Core traits, types, and error definitions for atkit.
//!
//! This crate defines the transport-agnostic abstractions shared by the AT
//! client and AT server crates. Applications that only need the types (error
//! codes, session configuration, the [`Transport`] trait) can depend on this
//! crate without pulling in a protocol engine.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-polling communication channel
//! - [`SessionConfig`] -- echo/verbose/CRC flags and derived framing tokens
//! - [`LineBuffer`] -- capacity-bounded byte buffer with checked appends
//! - [`Error`] / [`Result`] -- error handling

pub mod buffer;
pub mod crc;
pub mod error;
pub mod session;
pub mod text;
pub mod transport;

// Re-export key types at crate root for ergonomic `use atkit_core::*`.
pub use buffer::LineBuffer;
pub use error::{Error, Result};
pub use session::{ParseState, SessionConfig};
pub use transport::Transport;

/// Carriage return -- terminates a command line on the wire.
pub const CR: u8 = b'\r';
/// Line feed -- formats verbose response lines.
pub const LF: u8 = b'\n';
/// Backspace -- edits a partially entered command (server side).
pub const BS: u8 = 0x08;
/// Separator between sub-commands on a single line (V.25 `;`).
pub const COMMAND_SEP: char = ';';
/// Separator between a line body and its CRC suffix.
pub const CRC_SEP: u8 = b'*';
/// Number of hex digits in a CRC suffix.
pub const CRC_LEN: usize = 4;
/// Prefix of the numeric-coded error variant used by cellular/satellite modems.
pub const CME_ERROR_PREFIX: &str = "+CME ERROR:";

/// Default receive buffer capacity for a client (32 KiB).
pub const CLIENT_RX_CAPACITY: usize = 32 * 1024;
/// Default transmit buffer capacity for a client (32 KiB).
pub const CLIENT_TX_CAPACITY: usize = 32 * 1024;
/// Default receive buffer capacity for a server command line.
pub const SERVER_RX_CAPACITY: usize = 256;
