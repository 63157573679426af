//! Core configuration types shared across the Miga workspace.

pub mod config;

pub use config::{ConfigError, Transport};
