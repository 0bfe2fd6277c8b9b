//! Wire codec error types.

use thiserror::Error;

/// Errors that can occur when decoding a hex-string payload.
///
/// Both variants describe a malformed payload; they differ only in what was
/// wrong with it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The payload does not have exactly two hex digits per record byte.
    #[error("malformed payload: expected {expected} hex digits, got {actual}")]
    WrongLength {
        /// Expected number of hex digits.
        expected: usize,
        /// Actual number of characters received.
        actual: usize,
    },

    /// A character pair is not a valid base-16 byte.
    #[error("malformed payload: invalid hex at byte {offset}")]
    InvalidHex {
        /// Byte index of the offending digit pair.
        offset: usize,
    },
}

/// Result type alias for wire operations.
pub type WireResult<T> = Result<T, WireError>;
