//! Configuration module for the relay.
//!
//! Handles loading and validating relay configuration from TOML files.

mod settings;

pub use settings::*;
