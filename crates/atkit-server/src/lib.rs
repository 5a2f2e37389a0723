//! atkit-server: AT command server dispatcher.
//!
//! An [`AtServer`] plays the device side of the protocol: it accumulates an
//! inbound command line from a byte-polling transport, matches it against
//! registered [`Command`] descriptors, invokes the matching read/run/test/
//! write handler, and emits correctly framed `OK`/`ERROR` responses with
//! optional CRC protection. Built-in toggles (`E0`/`E1`, `V0`/`V1`,
//! `CRC=0`/`CRC=1`) adjust the session without needing a descriptor.
//!
//! # Example
//!
//! ```no_run
//! use atkit_server::{AtServer, Command};
//! use atkit_core::Transport;
//!
//! # async fn example(transport: Box<dyn Transport>) -> atkit_core::Result<()> {
//! let mut server = AtServer::new(transport);
//! server.register(
//!     Command::new("+GSN").on_read(|| Ok(Some("00000000SKYEE3D".to_string()))),
//! )?;
//! loop {
//!     server.service().await?;
//!     tokio::time::sleep(std::time::Duration::from_millis(5)).await;
//! }
//! # }
//! ```

pub mod command;
pub mod server;

pub use command::Command;
pub use server::{AtServer, AtServerBuilder};
