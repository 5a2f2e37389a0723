//! # atkit -- Hayes AT Command Protocol Toolkit
//!
//! `atkit` is an asynchronous Rust library for speaking the Hayes "AT"
//! command protocol, as reused by satellite, cellular, and GNSS modems. It
//! covers both sides of the link: a client that issues commands and parses
//! echoed/verbose/terse responses (including the CRC-protected variant and
//! unsolicited result codes), and a server that dispatches received
//! commands to registered handlers.
//!
//! ## Quick Start
//!
//! Add `atkit` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! atkit = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Query a modem's serial number:
//!
//! ```no_run
//! use atkit::client::AtClient;
//! use atkit::transport::SerialTransport;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> atkit::Result<()> {
//!     let transport = SerialTransport::open("/dev/ttyUSB0", 9600).await?;
//!     let mut client = AtClient::new(Box::new(transport));
//!     client.send_command("AT+GSN", Duration::from_secs(1)).await?;
//!     if let Some(serial) = client.response(Some("+GSN:")) {
//!         println!("serial number: {serial}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                | Purpose                                        |
//! |----------------------|------------------------------------------------|
//! | `atkit-core`         | [`Transport`] trait, session config, CRC, errors |
//! | `atkit-client`       | Client state machine and URC detection         |
//! | `atkit-server`       | Command dispatcher and response framing        |
//! | `atkit-transport`    | Serial and TCP transport implementations       |
//! | `atkit-test-harness` | Mock transport for protocol tests              |
//! | **`atkit`**          | This facade crate -- re-exports everything     |
//!
//! Both engines operate on `Box<dyn Transport>`, so application code is
//! agnostic to the physical link.
//!
//! ## Feature Flags
//!
//! | Feature        | Enables                             | Default |
//! |----------------|-------------------------------------|---------|
//! | `client`       | [`client`] module                   | yes     |
//! | `server`       | [`server`] module                   | yes     |
//! | `transport`    | [`transport`] module (serial, TCP)  | yes     |
//! | `test-harness` | [`test_harness`] module (mocks)     | no      |
//! | `full`         | Everything                          | no      |

pub use atkit_core::*;

/// AT client: command/response state machine and URC detection.
///
/// Provides [`AtClient`](client::AtClient), its builder, and
/// [`UrcConfig`](client::UrcConfig) for unsolicited-line scanning.
#[cfg(feature = "client")]
pub mod client {
    pub use atkit_client::*;
}

/// AT server: command registration and dispatch.
///
/// Provides [`AtServer`](server::AtServer) and the [`Command`](server::Command)
/// descriptor with its read/run/test/write handler slots.
#[cfg(feature = "server")]
pub mod server {
    pub use atkit_server::*;
}

/// Physical transports: serial ports and TCP sockets.
#[cfg(feature = "transport")]
pub mod transport {
    pub use atkit_transport::*;
}

/// Mock transports for deterministic protocol tests.
#[cfg(feature = "test-harness")]
pub mod test_harness {
    pub use atkit_test_harness::*;
}
