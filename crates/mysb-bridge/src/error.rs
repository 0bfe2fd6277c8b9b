//! Error types for request handling.

use mysb_firmware::FirmwareError;
use mysb_wire::WireError;
use thiserror::Error;

use crate::topics::TopicError;

/// Errors raised while handling one inbound message.
///
/// None of these are fatal to the bridge: the router turns each into a log
/// line and either no reply or an empty reply.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Payload is not a valid record.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Firmware could not be resolved or loaded.
    #[error(transparent)]
    Firmware(#[from] FirmwareError),

    /// Topic is structurally invalid.
    #[error("Rejected topic: {0}")]
    Topic(#[from] TopicError),

    /// A set-id bootloader command carried a payload that is not an id.
    #[error("Bootloader command {command} for node {node_id:?} needs a numeric id, got {payload:?}")]
    InvalidBootloaderPayload {
        /// Target node.
        node_id: String,
        /// Command code.
        command: u16,
        /// Offending payload.
        payload: String,
    },

    /// Every assignable node id has been handed out.
    #[error("Node ids exhausted (last assigned {last_id})")]
    IdsExhausted {
        /// Final id handed out.
        last_id: u16,
    },
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
