//! atkit-test-harness: Mock transports for atkit.
//!
//! This crate provides [`MockSerial`] for deterministic unit testing of the
//! AT client and server engines without requiring a real modem, together
//! with [`SentLog`], a cloneable handle for inspecting writes after the
//! mock has been boxed into an engine.

pub mod mock_serial;

pub use mock_serial::{MockSerial, SentLog};
