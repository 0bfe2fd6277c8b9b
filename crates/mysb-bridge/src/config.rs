//! Bridge configuration.
//!
//! Loaded from YAML, then overridden from `MYSB_*` environment variables:
//!
//! ```yaml
//! auto_id_enabled: true
//! next_id: 20
//! firmware_base_path: /config/firmware
//! sub_topic: mysensors_rx
//! pub_topic: mysensors_tx
//! bootloader_topic: mysensors/bootloader
//! nodes:
//!   - { node_id: "12", type: 3, version: 2 }
//!   - { node_id: default, type: 1, version: 1 }
//! ```

use std::path::{Path, PathBuf};

use mysb_firmware::{FirmwareMapping, ParseMode, StoreOptions, DEFAULT_NODE_ID};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::session::MAX_ASSIGNABLE_ID;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "MYSB_";

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The YAML did not parse.
    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A setting holds an unusable value.
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Setting or environment variable name.
        key: String,
        /// Offending value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Everything the bridge needs to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Answer id requests.
    pub auto_id_enabled: bool,
    /// Last assigned id; the first id handed out is one higher.
    pub next_id: u16,
    /// Root of the `{type}/{version}/firmware.hex` tree.
    pub firmware_base_path: PathBuf,
    /// Prefix of inbound node topics.
    pub sub_topic: String,
    /// Prefix of outbound node topics.
    pub pub_topic: String,
    /// Prefix of bootloader command topics.
    pub bootloader_topic: String,
    /// Node overrides, first match wins.
    pub nodes: Vec<FirmwareMapping>,
    /// Keep decoded images between requests.
    pub cache_images: bool,
    /// Fail loads on malformed hex lines instead of skipping them.
    pub strict_hex: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            auto_id_enabled: false,
            next_id: 1,
            firmware_base_path: PathBuf::from("/config/firmware"),
            sub_topic: "mysensors_rx".to_string(),
            pub_topic: "mysensors_tx".to_string(),
            bootloader_topic: "mysensors/bootloader".to_string(),
            nodes: Vec::new(),
            cache_images: false,
            strict_hex: false,
        }
    }
}

impl BridgeConfig {
    /// Parse YAML. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Load from an optional file, apply process environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MYSB_*` overrides fetched through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(value) = var("AUTOID") {
            self.auto_id_enabled = parse_bool("MYSB_AUTOID", &value)?;
        }
        if let Some(value) = var("NEXTID") {
            self.next_id = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("MYSB_NEXTID", value.as_str(), "not an integer"))?;
        }
        if let Some(value) = var("FIRMWAREBASEPATH") {
            self.firmware_base_path = PathBuf::from(value);
        }
        if let Some(value) = var("SUBTOPIC") {
            self.sub_topic = value;
        }
        if let Some(value) = var("PUBTOPIC") {
            self.pub_topic = value;
        }
        if let Some(value) = var("BOOTLOADERTOPIC") {
            self.bootloader_topic = value;
        }
        if let Some(value) = var("NODES") {
            self.nodes = serde_yaml::from_str(&value).map_err(|e| {
                ConfigError::invalid("MYSB_NODES", value.as_str(), e.to_string())
            })?;
        }
        Ok(())
    }

    /// Reject settings the bridge cannot run with and warn about doubtful ones.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, prefix) in [
            ("sub_topic", &self.sub_topic),
            ("pub_topic", &self.pub_topic),
            ("bootloader_topic", &self.bootloader_topic),
        ] {
            if prefix.is_empty() {
                return Err(ConfigError::invalid(key, prefix.as_str(), "must not be empty"));
            }
            if prefix.ends_with('/') {
                return Err(ConfigError::invalid(key, prefix.as_str(), "must not end with '/'"));
            }
        }

        if self.next_id > MAX_ASSIGNABLE_ID {
            return Err(ConfigError::invalid(
                "next_id",
                self.next_id.to_string(),
                format!("must be at most {}", MAX_ASSIGNABLE_ID),
            ));
        }

        if !self.nodes.iter().any(FirmwareMapping::is_default) {
            warn!("No \"{}\" firmware mapping configured", DEFAULT_NODE_ID);
        }

        for (index, mapping) in self.nodes.iter().enumerate() {
            if self.nodes[..index]
                .iter()
                .any(|earlier| earlier.node_id == mapping.node_id)
            {
                warn!(
                    node_id = %mapping.node_id,
                    "Node mapped more than once; the first mapping wins"
                );
            }
        }

        Ok(())
    }

    /// Options for the firmware store.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            cache_images: self.cache_images,
            parse_mode: if self.strict_hex {
                ParseMode::Strict
            } else {
                ParseMode::Lenient
            },
        }
    }

    /// Log the effective settings.
    pub fn log_summary(&self) {
        info!(
            firmware_base_path = %self.firmware_base_path.display(),
            auto_id_enabled = self.auto_id_enabled,
            next_id = self.next_id,
            sub_topic = %self.sub_topic,
            pub_topic = %self.pub_topic,
            bootloader_topic = %self.bootloader_topic,
            cache_images = self.cache_images,
            strict_hex = self.strict_hex,
            "Bridge settings"
        );
        for mapping in &self.nodes {
            info!("Node mapping: {}", mapping);
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value, "not a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(!config.auto_id_enabled);
        assert_eq!(config.next_id, 1);
        assert_eq!(config.firmware_base_path, PathBuf::from("/config/firmware"));
        assert_eq!(config.sub_topic, "mysensors_rx");
        assert_eq!(config.pub_topic, "mysensors_tx");
        assert_eq!(config.bootloader_topic, "mysensors/bootloader");
        assert!(config.nodes.is_empty());
        assert_eq!(config.store_options(), StoreOptions::default());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(BridgeConfig::from_yaml_str("").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
auto_id_enabled: true
next_id: 20
nodes:
  - node_id: "12"
    type: 3
    version: 2
  - { node_id: default, type: 1, version: 1 }
"#;
        let config = BridgeConfig::from_yaml_str(yaml).unwrap();
        assert!(config.auto_id_enabled);
        assert_eq!(config.next_id, 20);
        assert_eq!(config.sub_topic, "mysensors_rx");
        assert_eq!(
            config.nodes,
            vec![
                FirmwareMapping::new("12", 3, 2),
                FirmwareMapping::default_for(1, 1),
            ]
        );
    }

    #[test]
    fn test_mapping_accepts_long_field_name() {
        let yaml = "nodes:\n  - { node_id: \"4\", firmware_type: 7, version: 1 }\n";
        let config = BridgeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.nodes[0].firmware_type, 7);
    }

    #[test]
    fn test_yaml_round_trip_uses_short_field_name() {
        let mut config = BridgeConfig::default();
        config.nodes.push(FirmwareMapping::new("1", 2, 3));
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("type: 2"));
        assert_eq!(BridgeConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_unknown_yaml_type_is_error() {
        assert!(matches!(
            BridgeConfig::from_yaml_str("next_id: lots"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = BridgeConfig::default();
        config
            .apply_overrides(lookup(&[
                ("MYSB_AUTOID", "true"),
                ("MYSB_NEXTID", "42"),
                ("MYSB_FIRMWAREBASEPATH", "/srv/fw"),
                ("MYSB_SUBTOPIC", "in"),
                ("MYSB_PUBTOPIC", "out"),
                ("MYSB_BOOTLOADERTOPIC", "boot"),
                ("MYSB_NODES", "[{node_id: default, type: 5, version: 6}]"),
            ]))
            .unwrap();

        assert!(config.auto_id_enabled);
        assert_eq!(config.next_id, 42);
        assert_eq!(config.firmware_base_path, PathBuf::from("/srv/fw"));
        assert_eq!(config.sub_topic, "in");
        assert_eq!(config.pub_topic, "out");
        assert_eq!(config.bootloader_topic, "boot");
        assert_eq!(config.nodes, vec![FirmwareMapping::default_for(5, 6)]);
    }

    #[test]
    fn test_env_absent_keeps_values() {
        let mut config = BridgeConfig::default();
        config.apply_overrides(lookup(&[])).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_env_invalid_values() {
        let mut config = BridgeConfig::default();
        let err = config
            .apply_overrides(lookup(&[("MYSB_AUTOID", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MYSB_AUTOID"));

        let err = config
            .apply_overrides(lookup(&[("MYSB_NEXTID", "-3")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MYSB_NEXTID"));

        let err = config
            .apply_overrides(lookup(&[("MYSB_NODES", "{not: a list}")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MYSB_NODES"));
    }

    #[test]
    fn test_validate_topics() {
        let mut config = BridgeConfig::default();
        assert!(config.validate().is_ok());

        config.pub_topic = "mysensors_tx/".to_string();
        assert!(config.validate().is_err());

        config.pub_topic = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_next_id() {
        let config = BridgeConfig {
            next_id: 255,
            ..BridgeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "next_id"
        ));
    }

    #[test]
    fn test_duplicate_mappings_only_warn() {
        let config = BridgeConfig {
            nodes: vec![
                FirmwareMapping::new("1", 1, 1),
                FirmwareMapping::new("1", 1, 2),
            ],
            ..BridgeConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_strict_hex_option() {
        let config = BridgeConfig {
            strict_hex: true,
            cache_images: true,
            ..BridgeConfig::default()
        };
        let options = config.store_options();
        assert!(options.cache_images);
        assert_eq!(options.parse_mode, ParseMode::Strict);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            BridgeConfig::from_file("/nonexistent/mysb.yaml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
