//! Error types for the trellis compiler

use thiserror::Error;

/// Main error type for intent compilation
///
/// The compiler performs no I/O, so every variant represents either a caller
/// mistake (validation), a typed-to-generic conversion failure
/// (serialization), or an unrecognized vendor/monitor kind. Components return
/// their first error synchronously; the pipeline drivers abort on it and the
/// partial intent is discarded.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration error: the caller supplied an invalid or incomplete input
    #[error("validation error: {0}")]
    Validation(String),

    /// Failure converting a typed object into the generic attributes map
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An unrecognized database vendor or monitor kind
    #[error("unsupported type: {0}")]
    Unsupported(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an unsupported-type error with the given message
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: validation catches caller mistakes before any resource exists
    ///
    /// Empty names, malformed security IPs, and missing regions are all
    /// caught at construction time with a message naming the bad field.
    #[test]
    fn story_validation_errors_name_the_bad_field() {
        let err = Error::validation("project name must not be empty");
        assert!(err.to_string().contains("validation error"));
        assert!(err.to_string().contains("project name"));

        let err = Error::validation("invalid security IP: 10.0.0.0/40");
        assert!(err.to_string().contains("10.0.0.0/40"));

        match Error::validation("any message") {
            Error::Validation(msg) => assert_eq!(msg, "any message"),
            _ => panic!("expected Validation variant"),
        }
    }

    /// Story: conversion failures are surfaced, never swallowed
    ///
    /// Converting a well-formed typed object into a generic attributes map
    /// should never fail, but when it does the error reaches the caller.
    #[test]
    fn story_serialization_errors_are_surfaced() {
        let err = Error::serialization("deployment attributes are not an object");
        assert!(err.to_string().contains("serialization error"));

        // serde_json errors convert into the same channel
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    /// Story: unknown vendors are hard errors, not silent no-ops
    #[test]
    fn story_unknown_kinds_are_hard_errors() {
        let err = Error::unsupported("database type: oracle");
        assert!(err.to_string().contains("unsupported type"));
        assert!(err.to_string().contains("oracle"));
    }

    /// Story: error constructors accept both String and &str
    #[test]
    fn story_error_construction_ergonomics() {
        let app = "web";
        let err = Error::validation(format!("app {} has no containers", app));
        assert!(err.to_string().contains("web"));

        let err = Error::unsupported("monitor type: trace");
        assert!(err.to_string().contains("trace"));
    }
}
