//! Transport trait for AT command communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a modem or
//! modem-like device. Implementations exist for serial ports and TCP sockets
//! (in `atkit-transport`) and for a mock transport used in protocol tests
//! (`atkit-test-harness`).
//!
//! The contract is deliberately byte-polling rather than stream-reading: the
//! client's response parser consumes one byte at a time and needs to ask
//! "is anything there?" and "what is the next byte?" without blocking or
//! consuming, because a bare carriage return is ambiguous until the byte
//! behind it is known. Protocol engines operate on a `Transport` rather than
//! directly on a port, enabling both real hardware control and deterministic
//! unit testing with `MockSerial`.

use async_trait::async_trait;

use crate::error::Result;

/// Asynchronous byte-polling transport to an AT device.
///
/// Implementations handle buffering and error mapping at the physical layer.
/// Protocol-level concerns (echo suppression, result-code framing, CRC) are
/// handled by the client and server engines that consume this trait.
#[async_trait]
pub trait Transport: Send {
    /// Number of bytes ready to be read without waiting.
    ///
    /// Implementations should opportunistically pull any bytes the OS has
    /// buffered into their own read-ahead queue so the count is current.
    async fn available(&mut self) -> Result<usize>;

    /// Read and consume one byte, or `None` if nothing is pending.
    ///
    /// This never waits for data to arrive; callers poll [`available`]
    /// (or simply retry) on their own schedule.
    ///
    /// [`available`]: Transport::available
    async fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Look at the next byte without consuming it, or `None` if nothing is
    /// pending.
    async fn peek_byte(&mut self) -> Result<Option<u8>>;

    /// Write bytes to the device, returning the count actually written.
    async fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Block until all previously written bytes are on the wire.
    async fn flush(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
