//! Mock transport for deterministic testing of protocol engines.
//!
//! [`MockSerial`] implements the [`Transport`] trait over an in-memory
//! receive queue. Tests drive it two ways:
//!
//! - **Exchange style** via [`expect`]: pre-load write/response pairs. When
//!   the engine writes bytes matching the next expectation, the paired
//!   response bytes are queued for it to poll back. A mismatched write is
//!   an error, so tests double as assertions on the exact wire bytes.
//! - **Injection style** via [`inject`] / [`inject_after_polls`]: push
//!   bytes into the receive queue directly, immediately or after a number
//!   of poll calls, to simulate unsolicited lines and slow devices.
//!
//! Writes are always recorded; a cloneable [`SentLog`] handle lets a test
//! inspect them after the mock has been boxed into an engine.
//!
//! [`expect`]: MockSerial::expect
//! [`inject`]: MockSerial::inject
//! [`inject_after_polls`]: MockSerial::inject_after_polls

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use atkit_core::error::{Error, Result};
use atkit_core::text::debug_str;
use atkit_core::transport::Transport;

/// A pre-loaded write/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be written.
    request: Vec<u8>,
    /// The bytes to queue for reading when the matching write arrives.
    response: Vec<u8>,
}

/// Cloneable view of everything written through a [`MockSerial`].
///
/// Each element is the byte vector from one `write()` call.
#[derive(Debug, Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<Vec<u8>>>>);

impl SentLog {
    /// Snapshot of all writes so far.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.0.lock().unwrap().clone()
    }

    /// All written bytes concatenated into one vector.
    pub fn concatenated(&self) -> Vec<u8> {
        self.0.lock().unwrap().iter().flatten().copied().collect()
    }

    fn record(&self, data: &[u8]) {
        self.0.lock().unwrap().push(data.to_vec());
    }
}

/// A mock [`Transport`] for testing protocol engines without hardware.
///
/// Expectations are consumed in order. When the queue is empty, writes are
/// only recorded, which is what server-side tests need (the server writes
/// responses the test inspects rather than answers).
#[derive(Debug)]
pub struct MockSerial {
    /// Ordered queue of expected write/response pairs.
    expectations: VecDeque<Expectation>,
    /// Bytes available for the engine to poll.
    rx: VecDeque<u8>,
    /// Bytes that become available after a countdown of poll calls.
    delayed: Vec<(u32, Vec<u8>)>,
    /// Whether the transport is "connected".
    connected: bool,
    /// Log of all bytes written through this transport.
    sent: SentLog,
}

impl MockSerial {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockSerial {
            expectations: VecDeque::new(),
            rx: VecDeque::new(),
            delayed: Vec::new(),
            connected: true,
            sent: SentLog::default(),
        }
    }

    /// Add an expected write/response pair.
    ///
    /// When `write()` is called with data matching `request`, `response` is
    /// appended to the receive queue.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Make `data` immediately available for reading.
    pub fn inject(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().copied());
    }

    /// Make `data` available only after `polls` further poll calls
    /// (`available`, `read_byte`, or `peek_byte`). Simulates bytes still in
    /// flight when the engine looks ahead.
    pub fn inject_after_polls(&mut self, data: &[u8], polls: u32) {
        if polls == 0 {
            self.inject(data);
        } else {
            self.delayed.push((polls, data.to_vec()));
        }
    }

    /// Handle for inspecting writes after the mock is boxed into an engine.
    pub fn sent_log(&self) -> SentLog {
        self.sent.clone()
    }

    /// Number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent calls return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Count down delayed injections and deliver any that are due.
    fn tick(&mut self) {
        let mut due = Vec::new();
        self.delayed.retain_mut(|(polls, data)| {
            *polls -= 1;
            if *polls == 0 {
                due.push(std::mem::take(data));
                false
            } else {
                true
            }
        });
        for data in due {
            self.rx.extend(data);
        }
    }

    fn check_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

impl Default for MockSerial {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockSerial {
    async fn available(&mut self) -> Result<usize> {
        self.check_connected()?;
        self.tick();
        Ok(self.rx.len())
    }

    async fn read_byte(&mut self) -> Result<Option<u8>> {
        self.check_connected()?;
        self.tick();
        Ok(self.rx.pop_front())
    }

    async fn peek_byte(&mut self) -> Result<Option<u8>> {
        self.check_connected()?;
        self.tick();
        Ok(self.rx.front().copied())
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.check_connected()?;
        self.sent.record(data);

        if let Some(expectation) = self.expectations.pop_front() {
            if data != expectation.request.as_slice() {
                return Err(Error::Transport(format!(
                    "unexpected write: expected \"{}\", got \"{}\"",
                    debug_str(&expectation.request),
                    debug_str(data)
                )));
            }
            self.rx.extend(expectation.response);
        }
        Ok(data.len())
    }

    async fn flush(&mut self) -> Result<()> {
        self.check_connected()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expected_write_queues_response() {
        let mut mock = MockSerial::new();
        mock.expect(b"AT\r", b"AT\r\r\nOK\r\n");

        mock.write(b"AT\r").await.unwrap();
        assert_eq!(mock.remaining_expectations(), 0);

        assert_eq!(mock.available().await.unwrap(), 9);
        assert_eq!(mock.read_byte().await.unwrap(), Some(b'A'));
        assert_eq!(mock.peek_byte().await.unwrap(), Some(b'T'));
        assert_eq!(mock.read_byte().await.unwrap(), Some(b'T'));
    }

    #[tokio::test]
    async fn mismatched_write_errors() {
        let mut mock = MockSerial::new();
        mock.expect(b"AT\r", b"\r\nOK\r\n");

        let err = mock.write(b"ATZ\r").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn write_without_expectation_is_recorded_only() {
        let mut mock = MockSerial::new();
        let log = mock.sent_log();

        mock.write(b"\r\nOK\r\n").await.unwrap();
        assert_eq!(mock.available().await.unwrap(), 0);
        assert_eq!(log.writes(), vec![b"\r\nOK\r\n".to_vec()]);
        assert_eq!(log.concatenated(), b"\r\nOK\r\n");
    }

    #[tokio::test]
    async fn read_on_empty_queue_is_none_not_error() {
        let mut mock = MockSerial::new();
        assert_eq!(mock.read_byte().await.unwrap(), None);
        assert_eq!(mock.peek_byte().await.unwrap(), None);
        assert_eq!(mock.available().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn injected_bytes_are_readable() {
        let mut mock = MockSerial::new();
        mock.inject(b"+RING\r\n");
        assert_eq!(mock.available().await.unwrap(), 7);
        assert_eq!(mock.read_byte().await.unwrap(), Some(b'+'));
    }

    #[tokio::test]
    async fn delayed_injection_arrives_after_countdown() {
        let mut mock = MockSerial::new();
        mock.inject_after_polls(b"X", 3);

        assert_eq!(mock.available().await.unwrap(), 0);
        assert_eq!(mock.peek_byte().await.unwrap(), None);
        // Third poll delivers.
        assert_eq!(mock.available().await.unwrap(), 1);
        assert_eq!(mock.read_byte().await.unwrap(), Some(b'X'));
    }

    #[tokio::test]
    async fn disconnected_mock_rejects_io() {
        let mut mock = MockSerial::new();
        mock.set_connected(false);
        assert!(!mock.is_connected());
        assert!(matches!(
            mock.write(b"AT\r").await.unwrap_err(),
            Error::NotConnected
        ));
        assert!(matches!(
            mock.read_byte().await.unwrap_err(),
            Error::NotConnected
        ));
    }
}
