//! Configured node-to-firmware mappings.

use serde::{Deserialize, Serialize};

/// Node id of the mapping used as the last-resort fallback.
pub const DEFAULT_NODE_ID: &str = "default";

/// Associates a node id with the firmware it should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareMapping {
    /// Node id as it appears in topics, or [`DEFAULT_NODE_ID`].
    pub node_id: String,
    /// Firmware type.
    #[serde(rename = "type", alias = "firmware_type")]
    pub firmware_type: u16,
    /// Firmware version.
    pub version: u16,
}

impl FirmwareMapping {
    /// Create a mapping.
    pub fn new(node_id: impl Into<String>, firmware_type: u16, version: u16) -> Self {
        FirmwareMapping {
            node_id: node_id.into(),
            firmware_type,
            version,
        }
    }

    /// Create the fallback mapping.
    pub fn default_for(firmware_type: u16, version: u16) -> Self {
        Self::new(DEFAULT_NODE_ID, firmware_type, version)
    }

    /// Whether this is the fallback mapping.
    pub fn is_default(&self) -> bool {
        self.node_id == DEFAULT_NODE_ID
    }
}

impl std::fmt::Display for FirmwareMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} => type {} version {}",
            self.node_id, self.firmware_type, self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let mapping = FirmwareMapping::default_for(1, 2);
        assert!(mapping.is_default());
        assert!(!FirmwareMapping::new("12", 1, 2).is_default());
        assert_eq!(mapping.to_string(), "default => type 1 version 2");
    }
}
