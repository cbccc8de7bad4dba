//! Configuration model, layered resolution, and wire types shared across `webtty` crates.

pub mod config;
pub mod error;
pub mod protocol;

pub use crate::config::{resolve, CliOptions, Config, ConfigDefaults, LogLevel};
pub use error::ConfigFileError;
