//! Serial port transport for AT command links.
//!
//! This module provides [`SerialTransport`], which implements the
//! [`Transport`] trait for USB virtual COM ports and physical RS-232
//! connections. AT modems universally speak 8N1 with no flow control, so
//! only the baud rate is configurable.
//!
//! # Example
//!
//! ```no_run
//! use atkit_transport::SerialTransport;
//! use atkit_core::Transport;
//!
//! # async fn example() -> atkit_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 19200).await?;
//! transport.write(b"AT\r").await?;
//! transport.flush().await?;
//! while let Some(byte) = transport.read_byte().await? {
//!     println!("{byte:02X}");
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

use atkit_core::error::{Error, Result};
use atkit_core::transport::Transport;

/// How long a fill pass waits for the driver before concluding that no
/// bytes are pending. Short enough that polling stays responsive.
const POLL_GRACE: Duration = Duration::from_millis(1);

/// Serial port transport for AT command links.
///
/// Bytes the OS has buffered are pulled into a read-ahead queue on every
/// poll, which is what lets [`peek_byte`](Transport::peek_byte) answer
/// without consuming.
#[derive(Debug)]
pub struct SerialTransport {
    /// The underlying serial port stream, `None` after close or I/O failure.
    port: Option<SerialStream>,
    /// Port name for logging.
    port_name: String,
    /// Bytes read from the OS but not yet consumed by the caller.
    lookahead: VecDeque<u8>,
}

impl SerialTransport {
    /// Open a serial port at the given baud rate (8 data bits, 1 stop bit,
    /// no parity, no flow control).
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
    /// * `baud_rate` - Baud rate (e.g., 9600, 19200, 115200)
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        tracing::debug!(port = %port, baud_rate, "Opening serial port");

        let mut stream = tokio_serial::new(port, baud_rate)
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %port, error = %e, "Failed to open serial port");
                Error::Transport(format!("failed to open serial port {}: {}", port, e))
            })?;

        // De-assert DTR and RTS immediately after opening.
        //
        // Some modems route DTR to a reset or power-control input, and the
        // OS asserts DTR on open by default.
        if let Err(e) = stream.write_data_terminal_ready(false) {
            tracing::warn!(port = %port, error = %e, "Failed to de-assert DTR");
        }
        if let Err(e) = stream.write_request_to_send(false) {
            tracing::warn!(port = %port, error = %e, "Failed to de-assert RTS");
        }

        tracing::info!(port = %port, baud_rate, "Serial port opened");

        Ok(Self {
            port: Some(stream),
            port_name: port.to_string(),
            lookahead: VecDeque::new(),
        })
    }

    /// Get the name of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Close the port. Further I/O returns [`Error::NotConnected`].
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            tracing::debug!(port = %self.port_name, "Closing serial port");
            if let Err(e) = port.flush().await {
                tracing::warn!(port = %self.port_name, error = %e, "Flush before close failed");
            }
        }
        self.lookahead.clear();
        Ok(())
    }

    /// Pull any bytes the driver has buffered into the read-ahead queue.
    async fn fill(&mut self) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        let mut buf = [0u8; 256];
        let mut failure = None;
        loop {
            match tokio::time::timeout(POLL_GRACE, port.read(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    self.lookahead.extend(&buf[..n]);
                    if n < buf.len() {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    failure = Some(e);
                    break;
                }
                // Nothing pending within the grace period.
                Err(_) => break,
            }
        }
        if let Some(e) = failure {
            tracing::error!(port = %self.port_name, error = %e, "Serial read failed");
            self.port = None;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn available(&mut self) -> Result<usize> {
        self.fill().await?;
        Ok(self.lookahead.len())
    }

    async fn read_byte(&mut self) -> Result<Option<u8>> {
        if self.lookahead.is_empty() {
            self.fill().await?;
        }
        Ok(self.lookahead.pop_front())
    }

    async fn peek_byte(&mut self) -> Result<Option<u8>> {
        if self.lookahead.is_empty() {
            self.fill().await?;
        }
        Ok(self.lookahead.front().copied())
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        tracing::trace!(port = %self.port_name, bytes = data.len(), "Writing data");
        port.write_all(data).await?;
        Ok(data.len())
    }

    async fn flush(&mut self) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        port.flush().await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_nonexistent_port_errors() {
        let result = SerialTransport::open("/dev/atkit-no-such-port", 9600).await;
        match result {
            Err(Error::Transport(msg)) => assert!(msg.contains("atkit-no-such-port")),
            other => panic!("expected Transport error, got: {other:?}"),
        }
    }
}
