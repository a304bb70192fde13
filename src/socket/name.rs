//! Socket filename parsing.
//!
//! Socket files follow the container runtime convention `<name>-<port>.sock`
//! (any extension): the trailing dash-delimited token of the file stem is
//! the TCP port the relay forwards to.

use crate::error::{RelayError, RelayResult};

/// Logical name and target port derived from a socket path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketName {
    /// File stem of the socket path, dashes included.
    pub name: String,
    /// Target TCP port, the final dash-delimited token of the stem.
    ///
    /// Carried as `u32` without range validation; an out-of-range value
    /// surfaces as a connect failure, not a parse failure.
    pub port: u32,
}

impl SocketName {
    /// Parse a socket path into its logical name and target port.
    ///
    /// Takes the final path segment, strips everything from the first `.`
    /// onward, and parses the last dash-delimited token as a base-10 port.
    pub fn parse(path: &str) -> RelayResult<Self> {
        let segment = path.rsplit('/').next().unwrap_or(path);
        let stem = segment.split('.').next().unwrap_or(segment);
        let token = stem.rsplit('-').next().unwrap_or(stem);

        let port = token.parse::<u32>().map_err(|_| RelayError::SocketName {
            name: stem.to_string(),
            message: format!("trailing token '{}' is not a port number", token),
        })?;

        Ok(Self {
            name: stem.to_string(),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_and_port() {
        let parsed = SocketName::parse("a/b/mysvc-8080.sock").expect("should parse");
        assert_eq!(parsed.name, "mysvc-8080");
        assert_eq!(parsed.port, 8080);
    }

    #[test]
    fn test_parse_without_numeric_suffix_fails() {
        let err = SocketName::parse("a/b/app.sock").expect_err("should fail");
        assert!(matches!(err, RelayError::SocketName { .. }));
    }

    #[test]
    fn test_parse_takes_final_dash_token() {
        let parsed = SocketName::parse("x-1-2-3.sock").expect("should parse");
        assert_eq!(parsed.name, "x-1-2-3");
        assert_eq!(parsed.port, 3);
    }

    #[test]
    fn test_parse_strips_from_first_dot() {
        let parsed = SocketName::parse("/run/web-80.backup.sock").expect("should parse");
        assert_eq!(parsed.name, "web-80");
        assert_eq!(parsed.port, 80);
    }

    #[test]
    fn test_parse_out_of_range_port_passes_through() {
        // Range checking is the backend connect's problem, not the parser's.
        let parsed = SocketName::parse("big-99999.sock").expect("should parse");
        assert_eq!(parsed.port, 99999);
    }
}
