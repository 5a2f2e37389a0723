//! Command descriptors for the server dispatcher.
//!
//! A [`Command`] couples a name (matched as a case-insensitive prefix of an
//! inbound sub-command) with up to four handler slots, one per syntactic
//! form:
//!
//! | wire form        | slot    |
//! |------------------|---------|
//! | `AT+NAME`        | `run`   |
//! | `AT+NAME?`       | `read`  |
//! | `AT+NAME=?`      | `test`  |
//! | `AT+NAME=params` | `write` |
//!
//! Any subset may be populated; an inbound form without a handler is
//! rejected as invalid rather than silently ignored.

use std::fmt;

use atkit_core::error::Result;

/// Handler for the parameterless forms. Returns optional information text
/// to be framed into the response body before the result code.
pub type InfoHandler = Box<dyn FnMut() -> Result<Option<String>> + Send>;

/// Handler for the `=params` write form.
pub type WriteHandler = Box<dyn FnMut(&str) -> Result<Option<String>> + Send>;

/// A named command with optional read/run/test/write capabilities.
///
/// # Example
///
/// ```
/// use atkit_server::Command;
///
/// let command = Command::new("+TEMP")
///     .on_read(|| Ok(Some("21.5".to_string())))
///     .on_write(|params| {
///         println!("set point: {params}");
///         Ok(None)
///     });
/// assert_eq!(command.name(), "+TEMP");
/// ```
pub struct Command {
    pub(crate) name: String,
    pub(crate) read: Option<InfoHandler>,
    pub(crate) run: Option<InfoHandler>,
    pub(crate) test: Option<InfoHandler>,
    pub(crate) write: Option<WriteHandler>,
}

impl Command {
    /// Create a descriptor with no capabilities.
    pub fn new(name: impl Into<String>) -> Self {
        Command {
            name: name.into(),
            read: None,
            run: None,
            test: None,
            write: None,
        }
    }

    /// The command name, e.g. `"+HELLO"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle the `?` query form.
    pub fn on_read(mut self, handler: impl FnMut() -> Result<Option<String>> + Send + 'static) -> Self {
        self.read = Some(Box::new(handler));
        self
    }

    /// Handle the bare execute form.
    pub fn on_run(mut self, handler: impl FnMut() -> Result<Option<String>> + Send + 'static) -> Self {
        self.run = Some(Box::new(handler));
        self
    }

    /// Handle the `=?` capability-test form.
    pub fn on_test(mut self, handler: impl FnMut() -> Result<Option<String>> + Send + 'static) -> Self {
        self.test = Some(Box::new(handler));
        self
    }

    /// Handle the `=params` write form.
    pub fn on_write(
        mut self,
        handler: impl FnMut(&str) -> Result<Option<String>> + Send + 'static,
    ) -> Self {
        self.write = Some(Box::new(handler));
        self
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("read", &self.read.is_some())
            .field("run", &self.run.is_some())
            .field("test", &self.test.is_some())
            .field("write", &self.write.is_some())
            .finish()
    }
}
