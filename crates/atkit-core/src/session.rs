//! Session configuration and parse-state tracking.
//!
//! A [`SessionConfig`] holds the negotiable flags of one AT connection
//! (echo, verbose, CRC) together with the line terminator and the result
//! tokens derived from it. Both the client and the server own one; the
//! client additionally mutates its copy during parsing when the device's
//! actual framing disagrees with the configured expectation.

use crate::{CR, LF};

/// Where in the response-framing grammar a parser currently is.
///
/// Transitions are driven one character at a time. `Ok` and `Error` are
/// terminal for a single command cycle; `Command` is only used by the
/// server-side dispatcher. The declaration order matters: states before
/// `Ok` are non-terminal, which the parsers rely on via [`is_terminal`].
///
/// [`is_terminal`]: ParseState::is_terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParseState {
    /// Nothing in flight.
    None,
    /// Awaiting the echo of the just-sent command.
    Echo,
    /// Accumulating response body text.
    Response,
    /// Awaiting a trailing CRC token.
    Crc,
    /// Terminal: the device reported success.
    Ok,
    /// Terminal: the device reported failure.
    Error,
    /// Server side: accumulating an inbound command line.
    Command,
}

impl ParseState {
    /// True once the response cycle has concluded, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, ParseState::Ok | ParseState::Error)
    }
}

/// Per-connection protocol flags and derived framing tokens.
///
/// The derived tokens are rebuilt whenever the terminator changes so the
/// parsers compare against ready-made strings instead of formatting on
/// every character.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether the device echoes command characters (`E1`).
    pub echo: bool,
    /// Whether result codes are verbose (`V1`: `OK`/`ERROR`) or terse
    /// (`V0`: `0`/`4`).
    pub verbose: bool,
    /// Whether lines carry a CRC-16 suffix.
    pub crc: bool,
    terminator: [u8; 2],
    terminator_str: String,
    verbose_ok: String,
    verbose_error: String,
    terse_ok: String,
    terse_error: String,
}

impl SessionConfig {
    /// Build a session with the given 2-byte line terminator.
    pub fn new(terminator: [u8; 2]) -> Self {
        let term = String::from_utf8_lossy(&terminator).into_owned();
        SessionConfig {
            echo: true,
            verbose: true,
            crc: false,
            terminator,
            verbose_ok: format!("{term}OK{term}"),
            verbose_error: format!("{term}ERROR{term}"),
            terse_ok: format!("0{}", terminator[0] as char),
            terse_error: format!("4{}", terminator[0] as char),
            terminator_str: term,
        }
    }

    /// The configured 2-byte terminator.
    pub fn terminator(&self) -> [u8; 2] {
        self.terminator
    }

    /// The terminator as a string slice (e.g. `"\r\n"`).
    pub fn terminator_str(&self) -> &str {
        &self.terminator_str
    }

    /// Verbose success token, e.g. `"\r\nOK\r\n"`.
    pub fn verbose_ok(&self) -> &str {
        &self.verbose_ok
    }

    /// Verbose failure token, e.g. `"\r\nERROR\r\n"`.
    pub fn verbose_error(&self) -> &str {
        &self.verbose_error
    }

    /// Terse success token, e.g. `"0\r"`.
    pub fn terse_ok(&self) -> &str {
        &self.terse_ok
    }

    /// Terse failure token, e.g. `"4\r"`.
    pub fn terse_error(&self) -> &str {
        &self.terse_error
    }

    /// The success token matching the current verbosity.
    pub fn result_ok(&self) -> &str {
        if self.verbose {
            &self.verbose_ok
        } else {
            &self.terse_ok
        }
    }

    /// The failure token matching the current verbosity.
    pub fn result_error(&self) -> &str {
        if self.verbose {
            &self.verbose_error
        } else {
            &self.terse_error
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig::new([CR, LF])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_tokens() {
        let s = SessionConfig::default();
        assert!(s.echo);
        assert!(s.verbose);
        assert!(!s.crc);
        assert_eq!(s.terminator_str(), "\r\n");
        assert_eq!(s.verbose_ok(), "\r\nOK\r\n");
        assert_eq!(s.verbose_error(), "\r\nERROR\r\n");
        assert_eq!(s.terse_ok(), "0\r");
        assert_eq!(s.terse_error(), "4\r");
    }

    #[test]
    fn result_tokens_follow_verbosity() {
        let mut s = SessionConfig::default();
        assert_eq!(s.result_ok(), "\r\nOK\r\n");
        assert_eq!(s.result_error(), "\r\nERROR\r\n");
        s.verbose = false;
        assert_eq!(s.result_ok(), "0\r");
        assert_eq!(s.result_error(), "4\r");
    }

    #[test]
    fn custom_terminator_derives_tokens() {
        let s = SessionConfig::new([b';', b'\n']);
        assert_eq!(s.terminator_str(), ";\n");
        assert_eq!(s.verbose_ok(), ";\nOK;\n");
        assert_eq!(s.terse_ok(), "0;");
    }

    #[test]
    fn parse_state_ordering_and_terminality() {
        assert!(ParseState::Echo < ParseState::Ok);
        assert!(ParseState::Response < ParseState::Crc);
        assert!(!ParseState::Crc.is_terminal());
        assert!(ParseState::Ok.is_terminal());
        assert!(ParseState::Error.is_terminal());
        assert!(!ParseState::Command.is_terminal());
    }
}
