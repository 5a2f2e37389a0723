//! TCP transport for AT command links.
//!
//! This module provides [`TcpTransport`], which implements the [`Transport`]
//! trait for network-attached modems and serial-over-TCP bridges such as
//! `ser2net` or a terminal server in front of a rack of modems.
//!
//! # Example
//!
//! ```no_run
//! use atkit_transport::TcpTransport;
//! use atkit_core::Transport;
//!
//! # async fn example() -> atkit_core::Result<()> {
//! let mut transport = TcpTransport::connect("192.168.1.50:2001").await?;
//! transport.write(b"AT\r").await?;
//! transport.flush().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use atkit_core::error::{Error, Result};
use atkit_core::transport::Transport;

/// Default connection timeout (5 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a fill pass waits for the socket before concluding that no
/// bytes are pending.
const POLL_GRACE: Duration = Duration::from_millis(1);

/// TCP transport for AT command links.
///
/// The connection is established eagerly via [`connect`](TcpTransport::connect)
/// or [`connect_with_timeout`](TcpTransport::connect_with_timeout). A peer
/// close is detected during polling; already-buffered bytes remain readable,
/// after which calls return [`Error::NotConnected`].
#[derive(Debug)]
pub struct TcpTransport {
    /// The underlying TCP stream, `None` after close or peer disconnect.
    stream: Option<TcpStream>,
    /// The address string for logging.
    addr: String,
    /// Bytes read from the socket but not yet consumed by the caller.
    lookahead: VecDeque<u8>,
}

impl TcpTransport {
    /// Connect to a `host:port` endpoint using the default timeout.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to a `host:port` endpoint with a specified timeout.
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        tracing::debug!(addr = %addr, timeout_ms = timeout.as_millis(), "Connecting to TCP endpoint");

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                tracing::error!(addr = %addr, "TCP connection timed out");
                Error::Timeout
            })?
            .map_err(|e| {
                tracing::error!(addr = %addr, error = %e, "TCP connection failed");
                Error::Transport(format!("failed to connect to {}: {}", addr, e))
            })?;

        // AT exchanges are small and latency-sensitive.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        tracing::info!(addr = %addr, "TCP connection established");

        Ok(Self {
            stream: Some(stream),
            addr: addr.to_string(),
            lookahead: VecDeque::new(),
        })
    }

    /// Wrap an already-connected `TcpStream`, e.g. one accepted from a
    /// listener when serving the device side of the protocol.
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        tracing::debug!(addr = %addr, "Wrapping existing TCP stream");
        Self {
            stream: Some(stream),
            addr,
            lookahead: VecDeque::new(),
        }
    }

    /// Get the address string this transport was connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Shut the connection down. Further I/O returns [`Error::NotConnected`].
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(addr = %self.addr, "Closing TCP connection");
            if let Err(e) = stream.shutdown().await {
                tracing::warn!(addr = %self.addr, error = %e, "TCP shutdown failed");
            }
        }
        self.lookahead.clear();
        Ok(())
    }

    /// Pull any bytes the socket has pending into the read-ahead queue.
    /// Detects a peer close (0-byte read) and drops the stream.
    async fn fill(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        let mut buf = [0u8; 256];
        let mut failure = None;
        let mut eof = false;
        loop {
            match tokio::time::timeout(POLL_GRACE, stream.read(&mut buf)).await {
                Ok(Ok(0)) => {
                    eof = true;
                    break;
                }
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
            tracing::error!(addr = %self.addr, error = %e, "TCP read failed");
            self.stream = None;
            return Err(e.into());
        }
        if eof {
            tracing::warn!(addr = %self.addr, "Peer closed connection");
            self.stream = None;
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn available(&mut self) -> Result<usize> {
        if self.stream.is_some() {
            self.fill().await?;
        }
        if self.lookahead.is_empty() && self.stream.is_none() {
            return Err(Error::NotConnected);
        }
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
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        tracing::trace!(addr = %self.addr, bytes = data.len(), "Writing data");
        stream.write_all(data).await?;
        Ok(data.len())
    }

    async fn flush(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        stream.flush().await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Bind a listener on a random port and return it with its address.
    async fn test_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    /// Poll `n` bytes out of the transport, waiting up to two seconds.
    async fn poll_bytes(transport: &mut TcpTransport, n: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(2);
        while out.len() < n && Instant::now() < deadline {
            match transport.read_byte().await.unwrap() {
                Some(b) => out.push(b),
                None => tokio::time::sleep(Duration::from_millis(2)).await,
            }
        }
        out
    }

    #[tokio::test]
    async fn connect_write_and_poll_back() {
        let (listener, addr) = test_listener().await;

        // Echo server for one exchange.
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await.unwrap();
            stream.write_all(&buf[..n]).await.unwrap();
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(transport.addr(), addr);

        transport.write(b"AT\r").await.unwrap();
        transport.flush().await.unwrap();

        assert_eq!(poll_bytes(&mut transport, 3).await, b"AT\r");

        transport.close().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn peek_does_not_consume() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"OK").await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();

        // Wait for the bytes to land.
        let deadline = Instant::now() + Duration::from_secs(2);
        while transport.available().await.unwrap() < 2 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert_eq!(transport.peek_byte().await.unwrap(), Some(b'O'));
        assert_eq!(transport.peek_byte().await.unwrap(), Some(b'O'));
        assert_eq!(transport.read_byte().await.unwrap(), Some(b'O'));
        assert_eq!(transport.peek_byte().await.unwrap(), Some(b'K'));

        transport.close().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn empty_socket_polls_as_none() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        assert_eq!(transport.available().await.unwrap(), 0);
        assert_eq!(transport.read_byte().await.unwrap(), None);
        assert_eq!(transport.peek_byte().await.unwrap(), None);

        transport.close().await.unwrap();
        server.abort();
    }

    #[tokio::test]
    async fn peer_close_drains_then_disconnects() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"X").await.unwrap();
            // Dropping the stream sends FIN.
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        server.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The byte written before the close is still delivered.
        assert_eq!(poll_bytes(&mut transport, 1).await, b"X");
        // The next poll observes the FIN.
        assert_eq!(transport.read_byte().await.unwrap(), None);
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.read_byte().await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn connect_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        match TcpTransport::connect(&addr).await {
            Err(Error::Transport(msg)) => assert!(msg.contains("failed to connect")),
            other => panic!("expected Transport error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn write_after_close_returns_not_connected() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.write(b"AT\r").await,
            Err(Error::NotConnected)
        ));

        server.abort();
    }

    #[tokio::test]
    async fn from_stream_wraps_accepted_connection() {
        let (listener, addr) = test_listener().await;

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"ping").await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let (accepted, peer) = listener.accept().await.unwrap();
        let mut transport = TcpTransport::from_stream(accepted, peer.to_string());
        assert!(transport.is_connected());
        assert_eq!(poll_bytes(&mut transport, 4).await, b"ping");

        transport.close().await.unwrap();
        client.await.unwrap();
    }
}
