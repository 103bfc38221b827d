//! Core
//!
//! Transport lifecycle for a single chat session, written as a pure state
//! machine. Methods take their inputs (identity, display time, transport
//! signals) as parameters and return [`ConnectionAction`]s for the driver to
//! execute. Nothing here performs I/O or reads a clock directly.
//!
//! # Components
//!
//! - [`Connection`]: Disconnected → Connecting → Open → Closing → Closed
//! - [`ConnectionError`]: misuse of the transport (send while not open, ...)
//! - [`Environment`]: source of display timestamps

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;

pub use connection::{Connection, ConnectionAction, ConnectionState};
pub use env::{Environment, FixedEnv, SystemEnv};
pub use error::ConnectionError;
