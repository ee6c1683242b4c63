use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use crate::ip::overlay::DEFAULT_SUBNETS_ROOT;
use crate::utils::ip_utils::DEFAULT_METADATA_FILE;
use crate::registry::store::DEFAULT_TIMEOUT;
use crate::registry::zones::DEFAULT_NODES_ROOT;

/// Top-level configuration structure that mirrors the YAML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shared store location and key layout
    pub store: StoreConfig,
    /// Address layout inside each zone
    pub network: NetworkConfig,
    /// Addresses of the local node
    pub node: NodeConfig,
}

/// Shared key-value store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory backing the file store
    pub path: PathBuf,
    /// Key prefix of node records
    pub root: String,
    /// Key prefix of overlay subnet reservations
    pub subnets_root: String,
    /// Bound on a single store round-trip (e.g. "1s", "500ms")
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// Host offsets and naming used inside every zone
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Addresses reserved after the gateway
    pub reserved_ips: u32,
    /// Host offset of the embedded automation endpoint
    pub service_offset: u32,
    /// Prefix of zone names ("z" gives z0, z1, ...)
    pub zone_prefix: String,
}

/// Local node addresses; looked up from host metadata when absent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<Ipv4Addr>,
    /// Environment file with cloud metadata
    pub metadata_file: PathBuf,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid store configuration: {0}")]
    InvalidStore(String),
    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.network.validate()
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, root) in [("root", &self.root), ("subnets_root", &self.subnets_root)] {
            if !root.starts_with('/') || root.trim_matches('/').is_empty() {
                return Err(ConfigError::InvalidStore(format!(
                    "{} must be an absolute key path, got '{}'",
                    name, root
                )));
            }
        }
        if self.root.trim_end_matches('/') == self.subnets_root.trim_end_matches('/') {
            return Err(ConfigError::InvalidStore(
                "root and subnets_root must differ".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidStore("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

impl NetworkConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.reserved_ips >= 254 {
            return Err(ConfigError::InvalidNetwork(format!(
                "reserved_ips {} leaves no room in a /24",
                self.reserved_ips
            )));
        }
        if !(1..=254).contains(&self.service_offset) {
            return Err(ConfigError::InvalidNetwork(format!(
                "service_offset {} is not a usable host offset",
                self.service_offset
            )));
        }
        if self.zone_prefix.is_empty() {
            return Err(ConfigError::InvalidNetwork(
                "zone_prefix cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default implementations
impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/zonectl/store"),
            root: DEFAULT_NODES_ROOT.to_string(),
            subnets_root: DEFAULT_SUBNETS_ROOT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            private_ip: None,
            public_ip: None,
            metadata_file: PathBuf::from(DEFAULT_METADATA_FILE),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            reserved_ips: 19,
            service_offset: 10,
            zone_prefix: "z".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.network.reserved_ips, 19);
        assert_eq!(config.store.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
store:
  path: "/tmp/zonectl"
  timeout: "250ms"
node:
  public_ip: "192.168.2.10"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.store.timeout, Duration::from_millis(250));
        assert_eq!(config.store.root, "/zonectl/nodes");
        assert_eq!(config.node.public_ip, Some(Ipv4Addr::new(192, 168, 2, 10)));
        assert_eq!(config.node.private_ip, None);
        assert_eq!(config.network.zone_prefix, "z");
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.store.root = "relative".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidStore(_))));

        let mut config = Config::default();
        config.store.subnets_root = config.store.root.clone();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.network.reserved_ips = 254;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidNetwork(_))));

        let mut config = Config::default();
        config.network.service_offset = 255;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.store.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
