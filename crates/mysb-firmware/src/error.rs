//! Error types for the firmware store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when resolving or loading firmware.
#[derive(Debug, Error)]
pub enum FirmwareError {
    /// I/O error reading a firmware file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The firmware file does not exist.
    #[error("Firmware file not found: {}", path.display())]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// No tier of the resolution policy produced an existing file.
    #[error("No firmware for node {node_id:?} (requested type {firmware_type} version {version})")]
    Unresolved {
        /// Node that asked.
        node_id: String,
        /// Type the node asserted.
        firmware_type: u16,
        /// Version the node asserted.
        version: u16,
    },

    /// A hex record line is malformed (strict mode only).
    #[error("Corrupt firmware at line {line}: {reason}")]
    CorruptRecord {
        /// One-based line number.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// The decoded image has more blocks than the wire format can address.
    #[error("Firmware image too large: {blocks} blocks (max {max})")]
    TooLarge {
        /// Number of blocks in the image.
        blocks: usize,
        /// Maximum addressable blocks.
        max: usize,
    },

    /// Cache lock was poisoned (a thread panicked while holding the lock).
    #[error("Image cache lock was poisoned")]
    CacheLockPoisoned,
}

impl FirmwareError {
    /// Whether this error means "no such firmware" rather than a failure reading it.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FirmwareError::NotFound { .. } | FirmwareError::Unresolved { .. }
        )
    }
}
