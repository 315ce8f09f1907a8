//! Beacon CLI library
//!
//! Argument parsing, layered configuration and command handlers behind the
//! `beacon` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{Cli, Commands};
pub use commands::{format_event, CommandDispatcher};
pub use config::{AppConfig, CliConfig};
pub use error::{CliError, Result};
