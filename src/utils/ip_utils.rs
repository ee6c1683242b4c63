use std::collections::HashMap;
use std::io;
use std::net::Ipv4Addr;
use std::path::Path;

/// Cloud metadata written by the host's provisioning agent
pub const DEFAULT_METADATA_FILE: &str = "/run/metadata/coreos";

/// Metadata variables holding the private IPv4 address, per provider
const PRIVATE_IPV4_VARS: &[&str] = &[
    "COREOS_AZURE_IPV4_DYNAMIC",
    "COREOS_DIGITALOCEAN_IPV4_PRIVATE_0",
    "COREOS_EC2_IPV4_LOCAL",
    "COREOS_GCE_IP_LOCAL_0",
    "COREOS_PACKET_IPV4_PRIVATE_0",
    "COREOS_OPENSTACK_IPV4_LOCAL",
    "COREOS_VAGRANT_VIRTUALBOX_PRIVATE_IPV4",
    "COREOS_CUSTOM_PRIVATE_IPV4",
];

/// Metadata variables holding the public IPv4 address, per provider
const PUBLIC_IPV4_VARS: &[&str] = &[
    "COREOS_AZURE_IPV4_VIRTUAL",
    "COREOS_DIGITALOCEAN_IPV4_PUBLIC_0",
    "COREOS_EC2_IPV4_PUBLIC",
    "COREOS_GCE_IP_EXTERNAL_0",
    "COREOS_PACKET_IPV4_PUBLIC_0",
    "COREOS_OPENSTACK_IPV4_PUBLIC",
    "COREOS_VAGRANT_VIRTUALBOX_PRIVATE_IPV4",
    "COREOS_CUSTOM_PUBLIC_IPV4",
];

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("No {0} IPv4 address found in host metadata")]
    NotFound(&'static str),

    #[error("Invalid IPv4 address '{value}' in {name}")]
    Invalid { name: String, value: String },

    #[error("Failed to read metadata file: {0}")]
    Io(#[from] io::Error),
}

/// Parse `KEY=VALUE` lines of an environment file. Blank lines, comments
/// and surrounding quotes are ignored.
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Pick the first non-empty provider variable. Process environment wins over
/// the metadata file.
pub fn lookup_in<F>(public: bool, env: F, file_vars: &HashMap<String, String>) -> Result<Ipv4Addr, LookupError>
where
    F: Fn(&str) -> Option<String>,
{
    let (names, kind) = if public {
        (PUBLIC_IPV4_VARS, "public")
    } else {
        (PRIVATE_IPV4_VARS, "private")
    };

    for name in names {
        let value = env(name)
            .filter(|v| !v.is_empty())
            .or_else(|| file_vars.get(*name).filter(|v| !v.is_empty()).cloned());
        if let Some(value) = value {
            return value.trim().parse().map_err(|_| LookupError::Invalid {
                name: name.to_string(),
                value,
            });
        }
    }
    Err(LookupError::NotFound(kind))
}

/// Look up this host's private or public IPv4 address from cloud metadata.
pub fn lookup_ipv4_address(public: bool, metadata_file: &Path) -> Result<Ipv4Addr, LookupError> {
    let file_vars = match std::fs::read_to_string(metadata_file) {
        Ok(content) => parse_env_file(&content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
        Err(e) => return Err(e.into()),
    };
    lookup_in(public, |name| std::env::var(name).ok(), &file_vars)
}
