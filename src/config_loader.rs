use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open config file '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse config file '{}'", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// Load the config file if given, otherwise fall back to defaults
pub fn load_or_default(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            info!("No configuration file given, using defaults");
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// CLI arguments that can override YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub store_path: Option<std::path::PathBuf>,
    pub private_ip: Option<std::net::Ipv4Addr>,
    pub public_ip: Option<std::net::Ipv4Addr>,
}

/// Apply CLI overrides to a loaded configuration
pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) -> Result<()> {
    if let Some(path) = &overrides.store_path {
        info!("Overriding store path with {:?}", path);
        config.store.path = path.clone();
    }
    if let Some(ip) = overrides.private_ip {
        config.node.private_ip = Some(ip);
    }
    if let Some(ip) = overrides.public_ip {
        config.node.public_ip = Some(ip);
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
store:
  path: "/tmp/zonectl-store"
  root: "/fleet/nodes"
network:
  zone_prefix: "az"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.store.root, "/fleet/nodes");
        assert_eq!(config.network.zone_prefix, "az");
        assert_eq!(config.network.service_offset, 10);
    }

    #[test]
    fn test_load_invalid_config() {
        let yaml = r#"
network:
  zone_prefix: ""
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        assert!(load_config(temp_file.path()).is_err());
        assert!(load_config(Path::new("/nonexistent/zonectl.yaml")).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = load_or_default(None).unwrap();

        let overrides = CliOverrides {
            store_path: Some("/tmp/other".into()),
            private_ip: Some("172.17.8.101".parse().unwrap()),
            public_ip: None,
        };

        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.store.path, std::path::PathBuf::from("/tmp/other"));
        assert_eq!(config.node.private_ip, Some("172.17.8.101".parse().unwrap()));
        assert_eq!(config.node.public_ip, None);
    }
}
