//! Error types for the relay.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
