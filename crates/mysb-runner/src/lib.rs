//! Hosting shell for the MySensors OTA bridge.
//!
//! - [`line_server`]: a TCP transport speaking one `<topic> <payload>` message
//!   per line, for a bus adapter to connect to.
//! - [`commands`]: the `mysb` subcommands.
//! - [`logging`]: `tracing` subscriber setup.

pub mod cli;
pub mod commands;
pub mod error;
pub mod line_server;
pub mod logging;

pub use error::{Result, RunnerError};
