// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types returned by the statistics backend.

use std::fmt;
use std::io;

/// Errors returned by statistics backend operations.
///
/// Lookup failures (`NotFound`, `BadParameter`) are recoverable: the
/// resolver logs them and drops the offending event. `Duplicate` signals
/// an invariant violation on insert and is always returned to the caller.
/// `Io` and `Serialization` are fatal persistence errors.
#[derive(Debug)]
pub enum Error {
    /// An identifier (entity id, GUID, locator name) did not resolve.
    NotFound(String),
    /// A lookup resolved to an unexpected shape, or a protocol payload
    /// failed to parse (e.g. a `command:pid` field without separator).
    BadParameter(String),
    /// An insert or link would violate a scope-uniqueness invariant.
    Duplicate(String),
    /// The queue rejected an operation after shutdown was signalled.
    Shutdown,
    /// I/O error while writing or reading a snapshot.
    Io(io::Error),
    /// Snapshot encoding or decoding failed.
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::BadParameter(msg) => write!(f, "Bad parameter: {}", msg),
            Error::Duplicate(msg) => write!(f, "Duplicate: {}", msg),
            Error::Shutdown => write!(f, "Queue is shut down"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::Io(io::Error::other(e))
        } else {
            Error::Serialization(e.to_string())
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = Error::NotFound("writer 01.02|0x00000001".to_string());
        assert_eq!(e.to_string(), "Not found: writer 01.02|0x00000001");

        let e = Error::Duplicate("host h1".to_string());
        assert_eq!(e.to_string(), "Duplicate: host h1");

        assert_eq!(Error::Shutdown.to_string(), "Queue is shut down");
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error as _;

        let e = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(e.source().is_some());
        assert!(Error::Shutdown.source().is_none());
    }

    #[test]
    fn test_serde_json_error_maps_to_serialization() {
        let parse_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        match Error::from(parse_err) {
            Error::Serialization(_) => {}
            other => panic!("expected Serialization, got {:?}", other),
        }
    }
}
