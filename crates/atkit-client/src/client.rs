//! The AT command client state machine.
//!
//! One command is in flight at a time. The response is read byte by byte
//! and classified by a small state machine ([`ParseState`]) that handles
//! echo suppression, verbose (`\r\nOK\r\n`) and terse (`0\r`) result
//! framing, `+CME ERROR:` numeric errors, and an optional trailing CRC
//! token. The session flags (echo, verbose, CRC) are corrected in place
//! when the device's actual framing disagrees with the configured
//! expectation, so a misconfigured session heals itself over one exchange.

use std::time::{Duration, Instant};

use atkit_core::crc::{apply_crc, validate_crc};
use atkit_core::error::{Error, Result};
use atkit_core::text::{debug_str, printable};
use atkit_core::{
    LineBuffer, ParseState, SessionConfig, Transport, CLIENT_RX_CAPACITY, CLIENT_TX_CAPACITY,
    CME_ERROR_PREFIX, CR, CRC_LEN, CRC_SEP, LF,
};

/// How long the read loop sleeps between polls of the transport.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Inter-character debounce after a verbose ERROR token, giving a trailing
/// CRC suffix time to arrive before the cycle is finalized.
const DEFAULT_CHAR_DELAY: Duration = Duration::from_millis(10);

/// Builder for [`AtClient`].
///
/// # Example
///
/// ```no_run
/// use atkit_client::AtClient;
/// use atkit_core::Transport;
///
/// # fn example(transport: Box<dyn Transport>) {
/// let client = AtClient::builder()
///     .echo(true)
///     .crc(false)
///     .rx_capacity(8 * 1024)
///     .build(transport);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AtClientBuilder {
    session: SessionConfig,
    rx_capacity: usize,
    tx_capacity: usize,
    auto_verbose: bool,
    poll_interval: Duration,
    char_delay: Duration,
}

impl AtClientBuilder {
    /// Start from the default session (echo on, verbose on, CRC off,
    /// CR LF terminator, 32 KiB buffers).
    pub fn new() -> Self {
        AtClientBuilder {
            session: SessionConfig::default(),
            rx_capacity: CLIENT_RX_CAPACITY,
            tx_capacity: CLIENT_TX_CAPACITY,
            auto_verbose: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            char_delay: DEFAULT_CHAR_DELAY,
        }
    }

    /// Whether the device is expected to echo command characters.
    pub fn echo(mut self, on: bool) -> Self {
        self.session.echo = on;
        self
    }

    /// Whether the device is expected to use verbose result codes.
    pub fn verbose(mut self, on: bool) -> Self {
        self.session.verbose = on;
        self
    }

    /// Whether lines carry a CRC-16 suffix.
    pub fn crc(mut self, on: bool) -> Self {
        self.session.crc = on;
        self
    }

    /// The 2-byte line terminator (default CR LF).
    pub fn terminator(mut self, terminator: [u8; 2]) -> Self {
        let crc = self.session.crc;
        let echo = self.session.echo;
        let verbose = self.session.verbose;
        self.session = SessionConfig::new(terminator);
        self.session.crc = crc;
        self.session.echo = echo;
        self.session.verbose = verbose;
        self
    }

    /// Receive buffer capacity in bytes.
    pub fn rx_capacity(mut self, capacity: usize) -> Self {
        self.rx_capacity = capacity;
        self
    }

    /// Transmit buffer capacity in bytes, bounding the largest command.
    pub fn tx_capacity(mut self, capacity: usize) -> Self {
        self.tx_capacity = capacity;
        self
    }

    /// Whether the verbose flag follows the framing actually observed
    /// (clearing it when a terse short code arrives). On by default.
    pub fn auto_verbose(mut self, on: bool) -> Self {
        self.auto_verbose = on;
        self
    }

    /// How long the read loop sleeps between transport polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Debounce applied after a verbose ERROR token before finalizing.
    pub fn char_delay(mut self, delay: Duration) -> Self {
        self.char_delay = delay;
        self
    }

    /// Build the client around a transport.
    pub fn build(self, transport: Box<dyn Transport>) -> AtClient {
        AtClient {
            transport,
            session: self.session,
            pending: String::new(),
            rx: LineBuffer::new(self.rx_capacity),
            tx_capacity: self.tx_capacity,
            state: ParseState::None,
            busy: false,
            response_ready: false,
            result_ok: false,
            crc_found: false,
            crc_invalid: false,
            bad_byte: None,
            last_error: None,
            auto_verbose: self.auto_verbose,
            poll_interval: self.poll_interval,
            char_delay: self.char_delay,
        }
    }
}

impl Default for AtClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// AT command client over a byte-polling transport.
///
/// Not thread-safe: the busy guard is a plain flag serializing re-entrant
/// use of one instance, not a lock. Separate instances are fully
/// independent.
pub struct AtClient {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) session: SessionConfig,
    /// The most recently transmitted command line, CRC suffix and
    /// terminating CR included. Non-empty exactly while a command cycle is
    /// in flight.
    pub(crate) pending: String,
    pub(crate) rx: LineBuffer,
    tx_capacity: usize,
    pub(crate) state: ParseState,
    pub(crate) busy: bool,
    pub(crate) response_ready: bool,
    result_ok: bool,
    crc_found: bool,
    crc_invalid: bool,
    pub(crate) bad_byte: Option<u8>,
    pub(crate) last_error: Option<Error>,
    auto_verbose: bool,
    pub(crate) poll_interval: Duration,
    char_delay: Duration,
}

impl AtClient {
    /// Create a client with default settings around a transport.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        AtClientBuilder::new().build(transport)
    }

    /// Start building a client with custom settings.
    pub fn builder() -> AtClientBuilder {
        AtClientBuilder::new()
    }

    /// Whether the session currently expects echoed commands.
    pub fn echo(&self) -> bool {
        self.session.echo
    }

    /// Whether the session currently expects verbose result codes.
    pub fn verbose(&self) -> bool {
        self.session.verbose
    }

    /// Whether the session currently expects CRC suffixes.
    pub fn crc(&self) -> bool {
        self.session.crc
    }

    /// Whether a command or unsolicited scan is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// The outcome of the most recent command cycle: `None` after success,
    /// the error otherwise. [`Error::Unsolicited`] marks a captured
    /// unsolicited line rather than a failure.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Send one AT command and read its response.
    ///
    /// Stale bytes sitting in the receive queue are discarded (logged)
    /// before the command is written. The call returns once the device
    /// reports a result or `timeout` elapses; either way the client is left
    /// idle and ready for the next command. On success the cleaned response
    /// text is retrievable via [`response`](AtClient::response).
    ///
    /// Returns [`Error::Busy`] without touching any state if a cycle is
    /// already in flight.
    pub async fn send_command(&mut self, command: &str, timeout: Duration) -> Result<()> {
        if self.busy || !self.pending.is_empty() {
            tracing::warn!(command, "Command rejected, client busy");
            return Err(Error::Busy);
        }
        self.busy = true;
        let result = self.run_command(command, timeout).await;
        self.pending.clear();
        self.busy = false;
        self.last_error = result.as_ref().err().cloned();
        result
    }

    /// Retrieve and consume the response of the last successful cycle.
    ///
    /// Strips the trailing CRC token (when CRC mode is active), the
    /// OK/ERROR result token matching the current verbosity, and an
    /// optional caller-supplied prefix; trims surrounding whitespace and
    /// normalizes CR LF to LF, collapsing doubled line feeds. Returns
    /// `None` if no response is pending; a second call without a new
    /// command also yields `None`.
    pub fn response(&mut self, prefix: Option<&str>) -> Option<String> {
        if !self.response_ready {
            return None;
        }
        self.response_ready = false;
        let mut text = self.rx.as_str().to_string();
        self.rx.clear();
        if self.session.crc {
            let crc_suffix = 1 + CRC_LEN + self.session.terminator_str().len();
            if text.len() >= crc_suffix {
                text.truncate(text.len() - crc_suffix);
            }
        }
        let token = if self.session.verbose {
            self.session.verbose_ok()
        } else {
            self.session.terse_ok()
        };
        text = text.replace(token, "");
        if let Some(prefix) = prefix {
            text = text.replace(prefix, "");
        }
        let text = text.trim().replace("\r\n", "\n").replace("\n\n", "\n");
        Some(text)
    }

    async fn run_command(&mut self, command: &str, timeout: Duration) -> Result<()> {
        self.response_ready = false;
        self.result_ok = false;
        self.crc_found = false;
        self.crc_invalid = false;
        self.bad_byte = None;
        self.rx.clear();

        // CRC suffix (separator + 4 hex digits) plus the terminating CR,
        // against the capacity convention of leaving one spare byte.
        let encoded = command.len() + if self.session.crc { 1 + CRC_LEN } else { 0 } + 1;
        if encoded > self.tx_capacity.saturating_sub(1) {
            tracing::error!(
                size = encoded,
                capacity = self.tx_capacity,
                "Command exceeds transmit capacity"
            );
            return Err(Error::MessageTooLarge {
                size: encoded,
                capacity: self.tx_capacity,
            });
        }

        let mut discarded = 0usize;
        while self.transport.read_byte().await?.is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            tracing::warn!(discarded, "Stale receive data discarded before send");
        }

        // Let any prior outgoing data complete first.
        self.transport.flush().await?;

        let mut line = if self.session.crc {
            apply_crc(command)
        } else {
            command.to_string()
        };
        line.push(CR as char);
        self.pending = line;

        tracing::debug!(command = %debug_str(self.pending.as_bytes()), "Sending command");
        let written = self.transport.write(self.pending.as_bytes()).await?;
        if written != self.pending.len() {
            tracing::error!(written, expected = self.pending.len(), "Partial write");
            return Err(Error::Transport(format!(
                "partial write: {} of {} bytes",
                written,
                self.pending.len()
            )));
        }
        self.transport.flush().await?;

        self.read_response(timeout).await
    }

    /// The response read loop: one character at a time until a terminal
    /// state or the timeout, polling cooperatively.
    async fn read_response(&mut self, timeout: Duration) -> Result<()> {
        self.state = if self.session.echo {
            ParseState::Echo
        } else {
            ParseState::Response
        };
        let start = Instant::now();
        while start.elapsed() < timeout {
            while self.transport.available().await? > 0 && self.state < ParseState::Ok {
                let Some(byte) = self.read_char().await? else {
                    continue;
                };
                match byte {
                    LF => self.on_line_feed().await?,
                    CR => self.on_carriage_return().await?,
                    CRC_SEP if self.state == ParseState::Crc => self.crc_found = true,
                    _ => {}
                }
                if self.rx.overflowed() {
                    break;
                }
            }
            if self.state >= ParseState::Ok || self.rx.overflowed() {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        self.finalize()
    }

    /// Consume one byte into the receive buffer. Unprintable bytes are
    /// dropped and remembered; `None` means no byte was accumulated.
    pub(crate) async fn read_char(&mut self) -> Result<Option<u8>> {
        let Some(byte) = self.transport.read_byte().await? else {
            return Ok(None);
        };
        if !printable(byte) {
            tracing::warn!(byte, "Unprintable byte dropped");
            self.bad_byte = Some(byte);
            return Ok(None);
        }
        self.rx.push(byte);
        Ok(Some(byte))
    }

    /// A line feed arrived: either noise, a verbose result token, the end
    /// of a CRC token, or an intermediate multi-line separator.
    async fn on_line_feed(&mut self) -> Result<()> {
        if self.state == ParseState::Echo || !self.rx.starts_with(self.session.terminator_str()) {
            // A lone LF not preceded by CR is injected noise.
            if self.rx.last(2) != Some(CR) {
                tracing::warn!(
                    removed = %debug_str(self.rx.as_bytes()),
                    "Unexpected response data removed"
                );
                self.rx.clear();
            }
        }
        if self.rx.ends_with(self.session.verbose_ok()) {
            self.state = self.parsing_ok().await?;
            self.session.verbose = true;
        } else if self.rx.ends_with(self.session.verbose_error()) {
            self.state = self.parsing_error().await?;
            self.session.verbose = true;
        } else if self.rx.ends_with(self.session.terminator_str())
            && self.rx.contains(CME_ERROR_PREFIX)
        {
            self.state = self.parsing_error().await?;
            self.session.verbose = true;
        } else if self.state == ParseState::Crc {
            tracing::debug!("CRC parsing complete");
            if !self.result_ok {
                self.state = ParseState::Error;
            } else if validate_crc(self.rx.as_str()) {
                self.state = ParseState::Ok;
            } else {
                tracing::error!(response = %debug_str(self.rx.as_bytes()), "Invalid CRC");
                self.state = ParseState::Error;
                self.crc_invalid = true;
                self.result_ok = false;
            }
        }
        // Otherwise an intermediate line separator: keep accumulating.
        Ok(())
    }

    /// A carriage return arrived: either the end of the command echo or a
    /// candidate terse result code.
    async fn on_carriage_return(&mut self) -> Result<()> {
        if !self.pending.is_empty() && self.rx.ends_with(&self.pending) {
            if !self.rx.starts_with(&self.pending) {
                tracing::warn!(
                    removed = %debug_str(self.rx.as_bytes()),
                    "Unexpected pre-echo data removed"
                );
            }
            tracing::debug!("Echo received, clearing receive buffer");
            self.rx.clear();
            self.state = ParseState::Response;
        } else {
            // A bare CR with nothing (yet) behind it, or a CRC separator
            // next, may terminate a terse result code.
            let next = self.transport.peek_byte().await?;
            if next.is_none() || next == Some(CRC_SEP) {
                self.state = self.parsing_short().await?;
            }
        }
        Ok(())
    }

    /// The device reported success. The just-sent command may itself have
    /// toggled CRC mode, in which case this very response carries (or
    /// stops carrying) a CRC suffix.
    async fn parsing_ok(&mut self) -> Result<ParseState> {
        self.result_ok = true;
        tracing::debug!("Result OK");
        let lowered = self.pending.to_ascii_lowercase();
        let mut next = ParseState::Ok;
        if !self.session.crc {
            if lowered.contains("crc=1\r") {
                tracing::info!("CRC enabled by pending command");
                self.session.crc = true;
                next = ParseState::Crc;
            }
        } else if lowered.contains("crc=0\r")
            || (lowered.contains('z') && self.transport.available().await? == 0)
        {
            // A reset command with an idle line also clears CRC mode.
            tracing::info!("CRC disabled by pending command");
            self.session.crc = false;
        } else {
            next = ParseState::Crc;
        }
        Ok(next)
    }

    /// The device reported failure. Error responses may also carry a CRC
    /// suffix, so wait a debounce interval before concluding.
    async fn parsing_error(&mut self) -> Result<ParseState> {
        tracing::warn!("Result ERROR");
        tokio::time::sleep(self.char_delay).await;
        if self.session.crc || self.transport.available().await? > 0 {
            Ok(ParseState::Crc)
        } else {
            Ok(ParseState::Error)
        }
    }

    /// A bare digit-plus-CR terse code is suspected. Confirmed when the
    /// accumulated line does not start with the terminator.
    async fn parsing_short(&mut self) -> Result<ParseState> {
        tracing::debug!("Checking candidate short response code");
        if self.rx.starts_with(self.session.terminator_str()) {
            return Ok(self.state);
        }
        if self.session.verbose && self.auto_verbose {
            tracing::warn!("Short response code found, clearing verbose flag");
            self.session.verbose = false;
        }
        if self.rx.ends_with(self.session.terse_ok()) {
            self.parsing_ok().await
        } else {
            self.parsing_error().await
        }
    }

    /// Post-loop classification of the cycle's outcome, including the
    /// self-healing framing corrections.
    fn finalize(&mut self) -> Result<()> {
        if self.rx.overflowed() {
            tracing::error!(capacity = self.rx.capacity(), "Response overflowed buffer");
            return Err(Error::MessageTooLarge {
                size: self.rx.capacity(),
                capacity: self.rx.capacity(),
            });
        }
        if self.state < ParseState::Ok {
            // Timed out before reaching a terminal state.
            if self.result_ok {
                if self.session.verbose && self.rx.ends_with("\r") {
                    tracing::info!("Detected terse result framing");
                    if self.auto_verbose {
                        self.session.verbose = false;
                    }
                    self.response_ready = true;
                    return Ok(());
                }
                if self.session.crc && !self.crc_found {
                    tracing::info!("CRC expected but not found, clearing flag");
                    self.session.crc = false;
                    self.response_ready = true;
                    return Err(Error::CrcConfig);
                }
            }
            if let Some(byte) = self.bad_byte {
                return Err(Error::BadByte(byte));
            }
            tracing::warn!("Command timed out during parsing");
            return Err(Error::Timeout);
        }
        if self.state == ParseState::Error {
            if self.crc_invalid {
                return Err(Error::CrcMismatch);
            }
            if !self.session.crc && self.crc_found {
                tracing::warn!("CRC detected but not expected, setting flag");
                self.session.crc = true;
                return Err(Error::CrcConfig);
            }
            if let Some(code) = self.extract_cme_code() {
                self.rx.clear();
                return Err(Error::CmeError(code));
            }
            // The full error body remains retrievable.
            self.response_ready = true;
            return Err(Error::Command);
        }
        self.response_ready = true;
        Ok(())
    }

    fn extract_cme_code(&self) -> Option<u16> {
        let text = self.rx.as_str();
        let at = text.find(CME_ERROR_PREFIX)?;
        let rest = text[at + CME_ERROR_PREFIX.len()..].trim_start();
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atkit_test_harness::MockSerial;

    const TIMEOUT: Duration = Duration::from_millis(500);
    const SHORT_TIMEOUT: Duration = Duration::from_millis(80);

    fn fast_builder() -> AtClientBuilder {
        AtClient::builder()
            .poll_interval(Duration::from_millis(1))
            .char_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn echo_suppression_yields_empty_body() {
        let mut mock = MockSerial::new();
        mock.expect(b"AT\r", b"AT\r\r\nOK\r\n");
        let mut client = fast_builder().build(Box::new(mock));

        client.send_command("AT", TIMEOUT).await.unwrap();
        assert_eq!(client.last_error(), None);
        assert_eq!(client.response(None), Some(String::new()));
        // Consumed: a second retrieval yields nothing.
        assert_eq!(client.response(None), None);
    }

    #[tokio::test]
    async fn information_response_is_cleaned() {
        let mut mock = MockSerial::new();
        mock.expect(
            b"AT+GSN\r",
            b"AT+GSN\r\r\n+GSN: 00000000SKYEE3D\r\n\r\nOK\r\n",
        );
        let mut client = fast_builder().build(Box::new(mock));

        client.send_command("AT+GSN", TIMEOUT).await.unwrap();
        assert_eq!(
            client.response(None),
            Some("+GSN: 00000000SKYEE3D".to_string())
        );
    }

    #[tokio::test]
    async fn prefix_is_stripped_on_request() {
        let mut mock = MockSerial::new();
        mock.expect(
            b"AT+GSN\r",
            b"AT+GSN\r\r\n+GSN: 00000000SKYEE3D\r\n\r\nOK\r\n",
        );
        let mut client = fast_builder().build(Box::new(mock));

        client.send_command("AT+GSN", TIMEOUT).await.unwrap();
        assert_eq!(
            client.response(Some("+GSN:")),
            Some("00000000SKYEE3D".to_string())
        );
    }

    #[tokio::test]
    async fn busy_client_rejects_second_command() {
        let mock = MockSerial::new();
        let mut client = fast_builder().build(Box::new(mock));
        client.busy = true;

        let err = client.send_command("AT", TIMEOUT).await.unwrap_err();
        assert_eq!(err, Error::Busy);
        // The in-flight cycle's bookkeeping is untouched.
        assert_eq!(client.last_error(), None);
        assert!(client.pending.is_empty());
    }

    #[tokio::test]
    async fn oversized_command_never_touches_the_wire() {
        let mock = MockSerial::new();
        let log = mock.sent_log();
        let mut client = fast_builder().tx_capacity(8).build(Box::new(mock));

        let err = client
            .send_command("AT+TOOLONG", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge { .. }));
        assert!(log.writes().is_empty());
    }

    #[tokio::test]
    async fn stale_bytes_are_drained_before_send() {
        let mut mock = MockSerial::new();
        mock.inject(b"noise from earlier");
        mock.expect(b"AT\r", b"AT\r\r\nOK\r\n");
        let mut client = fast_builder().build(Box::new(mock));

        client.send_command("AT", TIMEOUT).await.unwrap();
        assert_eq!(client.response(None), Some(String::new()));
    }

    #[tokio::test]
    async fn crc_mode_frames_command_and_validates_response() {
        let mut mock = MockSerial::new();
        // crc16("AT") == 0x3983, crc16("\r\nOK\r\n") == 0x86C5.
        mock.expect(b"AT*3983\r", b"AT*3983\r\r\nOK\r\n*86C5\r\n");
        let mut client = fast_builder().crc(true).build(Box::new(mock));

        client.send_command("AT", TIMEOUT).await.unwrap();
        assert!(client.crc());
        assert_eq!(client.response(None), Some(String::new()));
    }

    #[tokio::test]
    async fn corrupted_crc_is_a_mismatch() {
        let mut mock = MockSerial::new();
        mock.expect(b"AT*3983\r", b"AT*3983\r\r\nOK\r\n*0000\r\n");
        let mut client = fast_builder().crc(true).build(Box::new(mock));

        let err = client.send_command("AT", TIMEOUT).await.unwrap_err();
        assert_eq!(err, Error::CrcMismatch);
        assert_eq!(client.last_error(), Some(&Error::CrcMismatch));
    }

    #[tokio::test]
    async fn crc_enable_command_self_configures_session() {
        let mut mock = MockSerial::new();
        // The enabling command goes out without a CRC; the response to that
        // same command already carries one.
        mock.expect(b"AT%CRC=1\r", b"AT%CRC=1\r\r\nOK\r\n*86C5\r\n");
        let mut client = fast_builder().build(Box::new(mock));

        assert!(!client.crc());
        client.send_command("AT%CRC=1", TIMEOUT).await.unwrap();
        assert!(client.crc());
    }

    #[tokio::test]
    async fn missing_crc_heals_session_and_keeps_response() {
        let mut mock = MockSerial::new();
        // Device answers without the expected CRC suffix.
        mock.expect(b"AT*3983\r", b"AT*3983\r\r\nOK\r\n");
        let mut client = fast_builder().crc(true).build(Box::new(mock));

        let err = client.send_command("AT", SHORT_TIMEOUT).await.unwrap_err();
        assert_eq!(err, Error::CrcConfig);
        assert!(!client.crc());
        // The partial response is still retrievable.
        assert_eq!(client.response(None), Some(String::new()));
    }

    #[tokio::test]
    async fn unexpected_crc_on_error_heals_session() {
        let mut mock = MockSerial::new();
        mock.expect(b"AT+BAD\r", b"AT+BAD\r\r\nERROR\r\n*ABCD\r\n");
        let mut client = fast_builder().build(Box::new(mock));

        let err = client.send_command("AT+BAD", TIMEOUT).await.unwrap_err();
        assert_eq!(err, Error::CrcConfig);
        assert!(client.crc());
    }

    #[tokio::test]
    async fn plain_error_keeps_body_available() {
        let mut mock = MockSerial::new();
        mock.expect(b"AT+BAD\r", b"AT+BAD\r\r\nERROR\r\n");
        let mut client = fast_builder().build(Box::new(mock));

        let err = client.send_command("AT+BAD", TIMEOUT).await.unwrap_err();
        assert_eq!(err, Error::Command);
        assert_eq!(client.last_error(), Some(&Error::Command));
    }

    #[tokio::test]
    async fn cme_error_code_is_extracted() {
        let mut mock = MockSerial::new();
        mock.expect(b"AT+CPIN?\r", b"AT+CPIN?\r\r\n+CME ERROR: 10\r\n");
        let mut client = fast_builder().build(Box::new(mock));

        let err = client.send_command("AT+CPIN?", TIMEOUT).await.unwrap_err();
        assert_eq!(err, Error::CmeError(10));
        // The error body is discarded.
        assert_eq!(client.response(None), None);
    }

    #[tokio::test]
    async fn terse_result_clears_verbose_flag() {
        let mut mock = MockSerial::new();
        mock.expect(b"ATV0\r", b"ATV0\r0\r");
        let mut client = fast_builder().build(Box::new(mock));

        assert!(client.verbose());
        client.send_command("ATV0", TIMEOUT).await.unwrap();
        assert!(!client.verbose());
        assert_eq!(client.response(None), Some(String::new()));
    }

    #[tokio::test]
    async fn terse_error_code_is_classified() {
        let mut mock = MockSerial::new();
        mock.expect(b"AT+BAD\r", b"AT+BAD\r4\r");
        let mut client = fast_builder().build(Box::new(mock));

        let err = client.send_command("AT+BAD", TIMEOUT).await.unwrap_err();
        assert_eq!(err, Error::Command);
        assert!(!client.verbose());
    }

    #[tokio::test]
    async fn short_code_detection_with_drip_fed_bytes() {
        // The terse-code heuristic peeks one byte behind a bare CR. Feed
        // the code in two deliveries so the CR genuinely has nothing
        // behind it when it is inspected.
        let mut mock = MockSerial::new();
        mock.expect(b"AT\r", b"0");
        mock.inject_after_polls(b"\r", 4);
        let mut client = fast_builder().echo(false).build(Box::new(mock));

        client.send_command("AT", TIMEOUT).await.unwrap();
        assert!(!client.verbose());
        assert_eq!(client.response(None), Some(String::new()));
    }

    #[tokio::test]
    async fn noise_line_is_discarded_mid_response() {
        let mut mock = MockSerial::new();
        // A lone LF not preceded by CR marks the accumulated bytes as noise.
        mock.expect(b"AT\r", b"AT\rgarbage\n\r\nOK\r\n");
        let mut client = fast_builder().build(Box::new(mock));

        client.send_command("AT", TIMEOUT).await.unwrap();
        assert_eq!(client.response(None), Some(String::new()));
    }

    #[tokio::test]
    async fn unprintable_bytes_surface_as_bad_byte() {
        let mut mock = MockSerial::new();
        mock.expect(b"AT\r", b"AT\r\x01\x02\x03");
        let mut client = fast_builder().build(Box::new(mock));

        let err = client.send_command("AT", SHORT_TIMEOUT).await.unwrap_err();
        assert_eq!(err, Error::BadByte(0x03));
    }

    #[tokio::test]
    async fn silent_device_times_out() {
        let mock = MockSerial::new();
        let mut client = fast_builder().build(Box::new(mock));

        let err = client.send_command("AT", SHORT_TIMEOUT).await.unwrap_err();
        assert_eq!(err, Error::Timeout);
        assert_eq!(client.response(None), None);
        // The failed cycle leaves the client reusable.
        assert!(!client.is_busy());
        assert!(client.pending.is_empty());
    }

    #[tokio::test]
    async fn response_overflow_is_message_too_large() {
        let mut mock = MockSerial::new();
        mock.expect(b"AT\r", b"AT\rmore than sixteen bytes of body\r\nOK\r\n");
        let mut client = fast_builder().rx_capacity(16).build(Box::new(mock));

        let err = client.send_command("AT", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge { .. }));
    }
}
