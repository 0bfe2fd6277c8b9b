//! Three-tier firmware resolution.
//!
//! For a request from `node_id` asserting `(type, version)`, the first
//! candidate whose file exists wins:
//!
//! 1. the first mapping configured for `node_id`;
//! 2. the type and version the node asserted;
//! 3. the `"default"` mapping.

use std::path::{Path, PathBuf};

use mysb_metrics::{metric_defs, metrics};

use crate::mapping::{FirmwareMapping, DEFAULT_NODE_ID};
use crate::{FirmwareError, Result};

/// File name of every firmware image under the base path.
pub const FIRMWARE_FILE_NAME: &str = "firmware.hex";

/// Which resolution tier produced a firmware reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirmwareSource {
    /// A mapping configured for this node.
    UserDefined,
    /// The type and version the node asked for.
    NodeAsserted,
    /// The `"default"` mapping.
    Default,
}

impl FirmwareSource {
    /// Short label for logs and metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            FirmwareSource::UserDefined => "user_defined",
            FirmwareSource::NodeAsserted => "node_asserted",
            FirmwareSource::Default => "default",
        }
    }
}

impl std::fmt::Display for FirmwareSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFirmware {
    /// Firmware type to report to the node.
    pub firmware_type: u16,
    /// Firmware version to report to the node.
    pub version: u16,
    /// Image file on disk.
    pub path: PathBuf,
    /// Tier that produced this reference.
    pub source: FirmwareSource,
}

/// Maps requests to firmware files under a base directory.
#[derive(Debug, Clone)]
pub struct FirmwareResolver {
    base_path: PathBuf,
    mappings: Vec<FirmwareMapping>,
}

impl FirmwareResolver {
    /// Create a resolver over `base_path` with mappings in priority order.
    pub fn new(base_path: impl Into<PathBuf>, mappings: Vec<FirmwareMapping>) -> Self {
        FirmwareResolver {
            base_path: base_path.into(),
            mappings,
        }
    }

    /// Base directory of the firmware tree.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Configured mappings in priority order.
    pub fn mappings(&self) -> &[FirmwareMapping] {
        &self.mappings
    }

    /// `{base}/{type}/{version}/firmware.hex`
    pub fn firmware_path(&self, firmware_type: u16, version: u16) -> PathBuf {
        self.base_path
            .join(firmware_type.to_string())
            .join(version.to_string())
            .join(FIRMWARE_FILE_NAME)
    }

    fn mapping_for(&self, node_id: &str) -> Option<&FirmwareMapping> {
        self.mappings.iter().find(|m| m.node_id == node_id)
    }

    fn candidate(
        &self,
        firmware_type: u16,
        version: u16,
        source: FirmwareSource,
    ) -> Option<ResolvedFirmware> {
        let path = self.firmware_path(firmware_type, version);
        if path.is_file() {
            Some(ResolvedFirmware {
                firmware_type,
                version,
                path,
                source,
            })
        } else {
            log::debug!("No {} firmware at {}", source, path.display());
            None
        }
    }

    /// Resolve the firmware a node should receive.
    pub fn resolve(
        &self,
        node_id: &str,
        firmware_type: u16,
        version: u16,
    ) -> Result<ResolvedFirmware> {
        let user_defined = self
            .mapping_for(node_id)
            .filter(|m| !m.is_default())
            .and_then(|m| {
                self.candidate(m.firmware_type, m.version, FirmwareSource::UserDefined)
            });

        let resolved = user_defined
            .or_else(|| self.candidate(firmware_type, version, FirmwareSource::NodeAsserted))
            .or_else(|| {
                self.mapping_for(DEFAULT_NODE_ID).and_then(|m| {
                    self.candidate(m.firmware_type, m.version, FirmwareSource::Default)
                })
            });

        match resolved {
            Some(resolved) => {
                metrics::counter!(
                    metric_defs::RESOLUTIONS.name,
                    "source" => resolved.source.as_str()
                )
                .increment(1);
                Ok(resolved)
            }
            None => Err(FirmwareError::Unresolved {
                node_id: node_id.to_string(),
                firmware_type,
                version,
            }),
        }
    }
}
