//! atkit-transport: Physical transports for AT command links.
//!
//! Implementations of the [`Transport`](atkit_core::Transport) trait:
//!
//! - [`SerialTransport`]: USB virtual COM ports and RS-232 links, the usual
//!   way to reach a modem.
//! - [`TcpTransport`]: network-attached modems and serial-over-TCP bridges
//!   (e.g. `ser2net`).
//!
//! Both keep a small read-ahead queue so the byte-polling contract
//! (`available` / `peek_byte`) can be answered without blocking on the OS.

pub mod serial;
pub mod tcp;

pub use serial::SerialTransport;
pub use tcp::TcpTransport;
