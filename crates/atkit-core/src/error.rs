//! Error types for atkit.
//!
//! All fallible operations across the toolkit return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! dispatch-layer errors are all captured here.
//!
//! The enum is `Clone + PartialEq` so that a client can retain the result
//! code of its most recent command cycle; underlying I/O errors are folded
//! into [`Error::Transport`] at the boundary.

/// The error type for all atkit operations.
///
/// Variants cover the full range of failure modes of an AT command exchange:
/// physical transport failures, device-reported errors, framing/CRC
/// disagreements, and server-side dispatch failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port, TCP socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// No connection to the device has been established.
    #[error("not connected")]
    NotConnected,

    /// Timed out waiting for a response from the device.
    ///
    /// This typically indicates the device is powered off, the baud rate is
    /// wrong, or the command is not supported and produced no reply.
    #[error("timeout waiting for response")]
    Timeout,

    /// A command or URC check was attempted while another was in flight.
    ///
    /// Commands are strictly serialized per client instance; there is no
    /// pipelining or command queue.
    #[error("busy processing a prior request")]
    Busy,

    /// The device replied with its generic `ERROR` result code.
    #[error("device reported ERROR")]
    Command,

    /// The device replied with a numeric `+CME ERROR:` code.
    #[error("device reported +CME ERROR: {0}")]
    CmeError(u16),

    /// A CRC suffix was present but did not match the line it covered.
    #[error("response CRC mismatch")]
    CrcMismatch,

    /// CRC presence disagreed with the configured expectation.
    ///
    /// This is a soft error: the session flips its own CRC flag to match
    /// what the device actually sent, so the next command is expected to
    /// succeed without intervention.
    #[error("CRC configuration mismatch")]
    CrcConfig,

    /// An unprintable byte arrived where only printable ASCII is tolerated.
    #[error("invalid byte 0x{0:02X} on the line")]
    BadByte(u8),

    /// A command or response exceeded the bounded buffer that holds it.
    #[error("message of {size} bytes exceeds buffer capacity {capacity}")]
    MessageTooLarge { size: usize, capacity: usize },

    /// Server side: no registered command matched the received line.
    #[error("unknown command: {0}")]
    CommandUnknown(String),

    /// Server side: the line was malformed or the matched command does not
    /// support the requested form (read/run/test/write).
    #[error("invalid command: {0}")]
    CommandInvalid(String),

    /// Status marker: the most recent data was an unsolicited result code,
    /// not a command response. Not a failure.
    #[error("unsolicited result code received")]
    Unsolicited,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port busy".into());
        assert_eq!(e.to_string(), "transport error: port busy");
    }

    #[test]
    fn error_display_timeout() {
        let e = Error::Timeout;
        assert_eq!(e.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_cme() {
        let e = Error::CmeError(21);
        assert_eq!(e.to_string(), "device reported +CME ERROR: 21");
    }

    #[test]
    fn error_display_bad_byte() {
        let e = Error::BadByte(0xFE);
        assert_eq!(e.to_string(), "invalid byte 0xFE on the line");
    }

    #[test]
    fn error_display_message_too_large() {
        let e = Error::MessageTooLarge {
            size: 300,
            capacity: 256,
        };
        assert_eq!(
            e.to_string(),
            "message of 300 bytes exceeds buffer capacity 256"
        );
    }

    #[test]
    fn error_from_io_folds_into_transport() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Transport(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_cloneable_and_comparable() {
        let e = Error::CrcConfig;
        assert_eq!(e.clone(), Error::CrcConfig);
        assert_ne!(e, Error::CrcMismatch);
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
