//! atkit-client: AT command client state machine.
//!
//! An [`AtClient`] drives one command at a time over a byte-polling
//! [`Transport`](atkit_core::Transport): it sends the command line (with an
//! optional CRC suffix), suppresses the device's echo, classifies the reply
//! as verbose or terse, validates CRC-protected responses, and exposes the
//! cleaned response text. When no command is in flight it can also scan the
//! stream for unsolicited result codes ([`AtClient::check_urc`]).
//!
//! # Example
//!
//! ```no_run
//! use atkit_client::AtClient;
//! use atkit_core::Transport;
//! use std::time::Duration;
//!
//! # async fn example(transport: Box<dyn Transport>) -> atkit_core::Result<()> {
//! let mut client = AtClient::new(transport);
//! client.send_command("AT+GSN", Duration::from_secs(1)).await?;
//! if let Some(serial_number) = client.response(Some("+GSN:")) {
//!     println!("modem serial: {serial_number}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod urc;

pub use client::{AtClient, AtClientBuilder};
pub use urc::UrcConfig;
