//! Error types for the core crate.

use thiserror::Error;

/// Core error type.
///
/// These indicate an upstream decoding bug rather than data variance: malformed
/// labels are reported through `Option`/`bool` returns instead.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid hex encoding.
    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    /// Composite resolver identifier did not have the `<address>-<node>` shape.
    #[error("Malformed resolver id: {0}")]
    MalformedResolverId(String),

    /// Event identifier did not have the `<block>-<logIndex>[-<seq>]` shape.
    #[error("Malformed event id: {0}")]
    MalformedEventId(String),
}

/// Result type alias for CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
