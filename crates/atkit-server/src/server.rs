//! The AT server dispatch loop.
//!
//! [`AtServer::service`] is a cooperative poll pass: it consumes every byte
//! currently pending on the transport, echoes it back when echo is on,
//! edits the line on backspace, and dispatches on carriage return. One line
//! is in flight at a time; the instance is not thread-safe.

use atkit_core::crc::{apply_crc, validate_crc};
use atkit_core::error::{Error, Result};
use atkit_core::text::{debug_str, printable};
use atkit_core::{
    LineBuffer, ParseState, SessionConfig, Transport, BS, COMMAND_SEP, CR, LF,
    SERVER_RX_CAPACITY,
};

use crate::command::Command;

/// Builder for [`AtServer`].
#[derive(Debug, Clone)]
pub struct AtServerBuilder {
    session: SessionConfig,
    rx_capacity: usize,
}

impl AtServerBuilder {
    /// Start from the default session (echo on, verbose on, CRC off,
    /// CR LF terminator, 256-byte line buffer).
    pub fn new() -> Self {
        AtServerBuilder {
            session: SessionConfig::default(),
            rx_capacity: SERVER_RX_CAPACITY,
        }
    }

    /// Whether received characters are echoed back (`E1` behavior).
    pub fn echo(mut self, on: bool) -> Self {
        self.session.echo = on;
        self
    }

    /// Whether result codes are verbose (`V1`) or terse (`V0`).
    pub fn verbose(mut self, on: bool) -> Self {
        self.session.verbose = on;
        self
    }

    /// Whether lines carry a CRC-16 suffix, inbound and outbound.
    pub fn crc(mut self, on: bool) -> Self {
        self.session.crc = on;
        self
    }

    /// Command line buffer capacity in bytes.
    pub fn rx_capacity(mut self, capacity: usize) -> Self {
        self.rx_capacity = capacity;
        self
    }

    /// Build the server around a transport.
    pub fn build(self, transport: Box<dyn Transport>) -> AtServer {
        AtServer {
            transport,
            session: self.session,
            commands: Vec::new(),
            rx: LineBuffer::new(self.rx_capacity),
            state: ParseState::None,
            last_error: None,
        }
    }
}

impl Default for AtServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// AT command server over a byte-polling transport.
pub struct AtServer {
    transport: Box<dyn Transport>,
    session: SessionConfig,
    commands: Vec<Command>,
    rx: LineBuffer,
    state: ParseState,
    last_error: Option<Error>,
}

impl AtServer {
    /// Create a server with default settings around a transport.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        AtServerBuilder::new().build(transport)
    }

    /// Start building a server with custom settings.
    pub fn builder() -> AtServerBuilder {
        AtServerBuilder::new()
    }

    /// Whether received characters are currently echoed back.
    pub fn echo(&self) -> bool {
        self.session.echo
    }

    /// Whether result codes are currently verbose.
    pub fn verbose(&self) -> bool {
        self.session.verbose
    }

    /// Whether CRC mode is currently active.
    pub fn crc(&self) -> bool {
        self.session.crc
    }

    /// The outcome of the most recently dispatched line: `None` after an
    /// `OK`, the error behind the last `ERROR` otherwise.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Register a command descriptor. Rejects a duplicate name.
    pub fn register(&mut self, command: Command) -> Result<()> {
        if self
            .commands
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&command.name))
        {
            return Err(Error::CommandInvalid(command.name));
        }
        tracing::debug!(command = ?command, "Command registered");
        self.commands.push(command);
        Ok(())
    }

    /// Register a command descriptor, replacing any existing command with
    /// the same name.
    pub fn register_or_replace(&mut self, command: Command) {
        self.commands
            .retain(|c| !c.name.eq_ignore_ascii_case(&command.name));
        tracing::debug!(command = ?command, "Command registered");
        self.commands.push(command);
    }

    /// One poll pass: consume every pending byte, dispatching completed
    /// lines. Returns the number of lines dispatched. Call this from the
    /// application's control loop.
    pub async fn service(&mut self) -> Result<usize> {
        let mut dispatched = 0;
        while let Some(byte) = self.transport.read_byte().await? {
            match byte {
                BS => {
                    // Backspace edits the line in place.
                    if self.rx.pop().is_some() && self.session.echo {
                        self.transport.write(&[BS]).await?;
                    }
                }
                CR => {
                    if self.session.echo {
                        self.transport.write(&[CR]).await?;
                    }
                    if self.dispatch_line().await? {
                        dispatched += 1;
                    }
                    self.state = ParseState::None;
                }
                // A trailing LF from a CR LF terminal belongs to the
                // previous line.
                LF => {}
                b if !printable(b) => {
                    tracing::trace!(byte = b, "Unprintable byte dropped");
                }
                b => {
                    self.state = ParseState::Command;
                    if self.rx.push(b) && self.session.echo {
                        self.transport.write(&[b]).await?;
                    }
                }
            }
        }
        Ok(dispatched)
    }

    /// Dispatch the accumulated line and emit the response. Returns false
    /// for an empty line, which is ignored without a response.
    async fn dispatch_line(&mut self) -> Result<bool> {
        let line = self.rx.as_str().to_string();
        let overflowed = self.rx.overflowed();
        self.rx.clear();
        if line.is_empty() && !overflowed {
            return Ok(false);
        }
        tracing::debug!(line = %debug_str(line.as_bytes()), "Dispatching command line");

        let outcome = if overflowed {
            Err(Error::MessageTooLarge {
                size: self.rx.capacity(),
                capacity: self.rx.capacity(),
            })
        } else {
            self.run_line(&line)
        };
        match outcome {
            Ok(info) => {
                self.last_error = None;
                self.respond(&info, true).await?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Command line failed");
                self.last_error = Some(e);
                self.respond(&[], false).await?;
            }
        }
        Ok(true)
    }

    /// Validate framing, strip the attention prefix, and run each
    /// sub-command. The first failure stops the line.
    fn run_line(&mut self, line: &str) -> Result<Vec<String>> {
        let mut line = line;
        let stripped;
        if self.session.crc {
            if !validate_crc(line) {
                return Err(Error::CrcMismatch);
            }
            if let Some(at) = line.rfind('*') {
                stripped = line[..at].to_string();
                line = &stripped;
            }
        }
        if line.len() < 2 || !line[..2].eq_ignore_ascii_case("AT") {
            return Err(Error::CommandInvalid(line.to_string()));
        }
        let body = &line[2..];

        let mut info = Vec::new();
        for sub in body.split(COMMAND_SEP).filter(|s| !s.is_empty()) {
            if self.apply_builtin(sub) {
                continue;
            }
            if let Some(text) = self.dispatch_registered(sub)? {
                info.push(text);
            }
        }
        Ok(info)
    }

    /// Session toggles that need no descriptor. Returns true if `sub` was
    /// one of them.
    fn apply_builtin(&mut self, sub: &str) -> bool {
        let upper = sub.to_ascii_uppercase();
        let toggle = upper.strip_prefix('%').unwrap_or(&upper);
        match toggle {
            "E0" => self.session.echo = false,
            "E1" => self.session.echo = true,
            "V0" => self.session.verbose = false,
            "V1" => self.session.verbose = true,
            "CRC=0" => self.session.crc = false,
            "CRC=1" => self.session.crc = true,
            // Reset restores the non-CRC default.
            "Z" => self.session.crc = false,
            _ => return false,
        }
        tracing::info!(toggle, "Session toggle applied");
        true
    }

    /// Linear scan of the registered descriptors; the first structural
    /// match wins.
    fn dispatch_registered(&mut self, sub: &str) -> Result<Option<String>> {
        for command in &mut self.commands {
            let name_len = command.name.len();
            if sub.len() < name_len || !sub[..name_len].eq_ignore_ascii_case(&command.name) {
                continue;
            }
            let rest = &sub[name_len..];
            let slot = match rest {
                "" => &mut command.run,
                "?" => &mut command.read,
                "=?" => &mut command.test,
                _ if rest.starts_with('=') => {
                    return match command.write.as_mut() {
                        Some(handler) => handler(&rest[1..]),
                        None => Err(Error::CommandInvalid(sub.to_string())),
                    };
                }
                // Name-prefix match but no recognizable form: keep scanning
                // for a longer name.
                _ => continue,
            };
            return match slot.as_mut() {
                Some(handler) => handler(),
                None => Err(Error::CommandInvalid(sub.to_string())),
            };
        }
        Err(Error::CommandUnknown(sub.to_string()))
    }

    /// Emit framed information text and the result code, CRC-protected
    /// when CRC mode is active, as a single write.
    async fn respond(&mut self, info: &[String], ok: bool) -> Result<()> {
        let term = self.session.terminator_str();
        let mut out = String::new();
        for text in info {
            out.push_str(term);
            out.push_str(text);
            out.push_str(term);
        }
        out.push_str(if ok {
            self.session.result_ok()
        } else {
            self.session.result_error()
        });
        let framed = if self.session.crc {
            let mut framed = apply_crc(&out);
            framed.push_str(self.session.terminator_str());
            framed
        } else {
            out
        };
        tracing::trace!(response = %debug_str(framed.as_bytes()), "Sending response");
        self.transport.write(framed.as_bytes()).await?;
        self.transport.flush().await
    }
}
