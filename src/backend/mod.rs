//! Backend forwarding module.
//!
//! One short-lived TCP round trip per relayed request.

mod forwarder;

pub use forwarder::{BackendForwarder, BACKEND_HOST};
