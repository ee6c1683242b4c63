//! Node bootstrap orchestration.
//!
//! Ties configuration, the shared store, the overlay view and the zone
//! registry together into the flows the CLI exposes. Library errors are
//! wrapped with context here and surfaced unchanged otherwise.

use std::fs;
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::Path;

use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use log::{info, warn};
use tempfile::NamedTempFile;

use crate::config::Config;
use crate::ip::{overlay_status, FlannelAllocator, NodeNetwork, OverlayStatus, ZoneSubnet};
use crate::registry::{AssignmentReport, FileStore, NodeRecord, ZoneRegistry};
use crate::topology::{render_topology_config, render_zone_subnets, TopologyConfig};
use crate::utils::lookup_ipv4_address;

/// Registry over the configured file-backed store
pub type FileRegistry = ZoneRegistry<FileStore, FlannelAllocator<FileStore>>;

/// Open the zone registry described by `config`.
pub fn open_registry(config: &Config) -> FileRegistry {
    let store = FileStore::new(&config.store.path, config.store.timeout);
    let overlay = FlannelAllocator::new(store.clone(), config.store.subnets_root.clone());
    ZoneRegistry::new(store, overlay, config.store.root.clone())
}

/// Resolve `(private, public)` addresses of the local node: explicit
/// configuration first, host metadata otherwise.
pub fn resolve_node_addresses(config: &Config) -> Result<(Ipv4Addr, Ipv4Addr)> {
    let metadata = &config.node.metadata_file;
    let private_ip = match config.node.private_ip {
        Some(ip) => ip,
        None => lookup_ipv4_address(false, metadata).wrap_err("Failed to look up node private address")?,
    };
    let public_ip = match config.node.public_ip {
        Some(ip) => ip,
        None => lookup_ipv4_address(true, metadata).wrap_err("Failed to look up node public address")?,
    };
    Ok((private_ip, public_ip))
}

/// Register the local node in the zone registry.
pub fn register_node(config: &Config) -> Result<NodeRecord> {
    let (private_ip, public_ip) = resolve_node_addresses(config)?;
    let registry = open_registry(config);
    let record = registry
        .register(private_ip, public_ip)
        .wrap_err("Failed to register node")?;
    Ok(record)
}

/// Compare overlay reservations against the expected cluster size.
pub fn cluster_status(config: &Config, expected: usize) -> Result<OverlayStatus> {
    let registry = open_registry(config);
    let status = overlay_status(registry.overlay(), expected).wrap_err("Failed to read overlay reservations")?;
    Ok(status)
}

/// Assign zone indices from the local node.
///
/// With `expected` set, refuses to run until that many blocks are reserved
/// unless `force` is given.
pub fn assign_zones(config: &Config, expected: Option<usize>, force: bool) -> Result<AssignmentReport> {
    let (private_ip, _) = resolve_node_addresses(config)?;
    let registry = open_registry(config);

    if let Some(expected) = expected {
        let status = overlay_status(registry.overlay(), expected).wrap_err("Failed to read overlay reservations")?;
        if !status.is_ready() {
            if !force {
                bail!("Cluster not ready: {} subnets reserved", status.progress());
            }
            warn!("Assigning zones with only {} subnets reserved", status.progress());
        }
    }

    info!("Assigning zones to node records");
    let report = registry
        .assign_zone_indices(private_ip)
        .wrap_err("Failed to assign zones to node records")?;
    info!(
        "Assigned {} new zone indices ({} records unchanged)",
        report.assigned.len(),
        report.unchanged
    );
    Ok(report)
}

/// Render the topology document from the current registry snapshot.
pub fn build_topology(config: &Config) -> Result<TopologyConfig> {
    let registry = open_registry(config);
    let records = registry.load_all().wrap_err("Failed to load node records")?;
    let topology =
        render_topology_config(&records, &config.network.zone_prefix).wrap_err("Failed to render topology config")?;
    Ok(topology)
}

/// Render the topology document and write it to `output`, or return it for
/// printing when no output path is given.
pub fn publish_topology(config: &Config, output: Option<&Path>) -> Result<String> {
    let json = build_topology(config)?.to_json_pretty()?;
    if let Some(path) = output {
        write_atomically(path, &json)
            .wrap_err_with(|| format!("Failed to write topology config to '{}'", path.display()))?;
        info!("Wrote topology config to {:?}", path);
    }
    Ok(json)
}

/// Replace `path` with `contents` through a temporary sibling, so readers
/// see either the previous document or the complete new one.
fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create output directory '{}'", parent.display()))?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Per-zone subnet layout of the whole cluster.
pub fn zone_subnets(config: &Config) -> Result<Vec<ZoneSubnet>> {
    let registry = open_registry(config);
    let records = registry.load_all().wrap_err("Failed to load node records")?;
    let layout = render_zone_subnets(&records, &config.network).wrap_err("Failed to derive zone subnets")?;
    Ok(layout)
}

/// Addresses of the embedded automation endpoint on the local node.
pub fn node_network(config: &Config) -> Result<NodeNetwork> {
    let (private_ip, _) = resolve_node_addresses(config)?;
    let registry = open_registry(config);
    let record = match registry.get(private_ip).wrap_err("Failed to load node record")? {
        Some(record) => record,
        None => bail!("Node {} is not registered", private_ip),
    };
    let network = NodeNetwork::derive(&record.subnet, record.public_ip, &config.network)
        .wrap_err("Failed to derive node network")?;
    Ok(network)
}
