//! Chatter2 server CLI library
//!
//! Argument parsing, layered configuration and error types for the
//! `chatter-server` binary.

pub mod cli;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use config::{AppConfig, LoggingConfig};
pub use error::{CliError, Result};
