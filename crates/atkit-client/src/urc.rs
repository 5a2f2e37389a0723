//! Unsolicited result code (URC) detection.
//!
//! Devices emit some lines without being prompted (ring indications,
//! network registration changes, incoming message notifications). When no
//! command is in flight, [`AtClient::check_urc`] scans the receive queue
//! for a line starting with a configurable prefix, discarding any noise in
//! front of it.

use std::time::{Duration, Instant};

use atkit_core::error::{Error, Result};
use atkit_core::text::debug_str;

use crate::client::AtClient;

/// Default scan budget once data has started arriving.
const DEFAULT_URC_TIMEOUT: Duration = Duration::from_millis(250);

/// Parameters of an unsolicited-line scan.
///
/// # Example
///
/// ```
/// use atkit_client::UrcConfig;
/// use std::time::Duration;
///
/// let config = UrcConfig::new()
///     .prefix('%')
///     .wait(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct UrcConfig {
    pub(crate) prefix: char,
    pub(crate) read_until: Option<String>,
    pub(crate) timeout: Duration,
    pub(crate) wait: Duration,
}

impl UrcConfig {
    /// Defaults: prefix `+`, terminated by the session terminator, 250 ms
    /// scan budget, no initial wait.
    pub fn new() -> Self {
        UrcConfig {
            prefix: '+',
            read_until: None,
            timeout: DEFAULT_URC_TIMEOUT,
            wait: Duration::ZERO,
        }
    }

    /// The character an unsolicited line is expected to start with.
    pub fn prefix(mut self, prefix: char) -> Self {
        self.prefix = prefix;
        self
    }

    /// The sequence that ends an unsolicited line. Defaults to the
    /// session's line terminator.
    pub fn read_until(mut self, until: impl Into<String>) -> Self {
        self.read_until = Some(until.into());
        self
    }

    /// Scan budget once the scan is underway.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How long to wait for a first byte. With a zero wait the scan
    /// returns immediately when the receive queue is empty.
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }
}

impl Default for UrcConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AtClient {
    /// Scan for an unsolicited line.
    ///
    /// Returns `Ok(true)` with the line held for retrieval via
    /// [`response`](AtClient::response) when one is captured, `Ok(false)`
    /// when nothing relevant arrives within the configured budget, and
    /// [`Error::Busy`] when a command cycle is in flight.
    pub async fn check_urc(&mut self, config: &UrcConfig) -> Result<bool> {
        if self.busy || !self.pending.is_empty() {
            tracing::trace!("Unsolicited scan rejected, command in flight");
            return Err(Error::Busy);
        }
        self.busy = true;
        let result = self.scan_urc(config).await;
        self.busy = false;
        if let Ok(true) = result {
            self.last_error = Some(Error::Unsolicited);
        }
        result
    }

    async fn scan_urc(&mut self, config: &UrcConfig) -> Result<bool> {
        if config.wait.is_zero() && self.transport.available().await? == 0 {
            return Ok(false);
        }
        let read_until = config
            .read_until
            .clone()
            .unwrap_or_else(|| self.session.terminator_str().to_string());
        tracing::debug!(until = %debug_str(read_until.as_bytes()), "Scanning for unsolicited line");
        self.rx.clear();
        self.response_ready = false;
        self.bad_byte = None;

        let budget = config.wait + config.timeout;
        let start = Instant::now();
        let mut aligned = false;
        while start.elapsed() < budget {
            if self.read_char().await?.is_none() {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }
            if !aligned {
                // Lock onto the prefix, dropping line noise in front of it.
                let dropped = self.rx.discard_to(config.prefix as u8);
                if dropped > 0 {
                    tracing::warn!(dropped, "Noise before unsolicited prefix discarded");
                }
                aligned = !self.rx.is_empty();
            }
            if aligned && self.rx.len() > read_until.len() && self.rx.ends_with(&read_until) {
                tracing::trace!(line = %debug_str(self.rx.as_bytes()), "Unsolicited line captured");
                self.response_ready = true;
                return Ok(true);
            }
        }
        tracing::warn!("Timed out waiting for unsolicited terminator");
        Ok(false)
    }
}
