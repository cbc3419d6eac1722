//! Evidra CLI - runs and inspects the literature pipeline.

#![warn(clippy::all)]

pub mod cli;
pub mod config;

pub use cli::{Cli, Command, SearchArgs, SearchModeArg};
pub use config::{AppConfig, ConfigError};
