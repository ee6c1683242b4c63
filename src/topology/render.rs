//! Topology config rendering from registry records.

use std::collections::BTreeMap;

use log::info;

use super::scaling::generate;
use super::types::{TopologyConfig, TopologyError};
use crate::config::NetworkConfig;
use crate::ip::{AddressError, ZoneSubnet};
use crate::registry::NodeRecord;

/// Map each record to its zone name, rejecting unassigned or duplicate zones.
fn zones_by_name<'a>(
    records: &'a [NodeRecord],
    zone_prefix: &str,
) -> Result<BTreeMap<String, &'a NodeRecord>, TopologyError> {
    let mut zones = BTreeMap::new();
    for record in records {
        let zone = record.zone(zone_prefix).ok_or(TopologyError::UnassignedZone {
            private_ip: record.private_ip,
        })?;
        if zones.insert(zone.clone(), record).is_some() {
            return Err(TopologyError::DuplicateZone(zone));
        }
    }
    Ok(zones)
}

/// Render the published topology document from a full record snapshot.
///
/// All records must carry a zone index; the document is built completely or
/// not at all.
pub fn render_topology_config(
    records: &[NodeRecord],
    zone_prefix: &str,
) -> Result<TopologyConfig, TopologyError> {
    let zones = zones_by_name(records, zone_prefix)?;
    let public_ips: BTreeMap<String, _> = zones
        .iter()
        .map(|(name, record)| (name.clone(), record.public_ip))
        .collect();
    let names: Vec<String> = zones.into_keys().collect();

    let config = generate(&names, &public_ips)?;
    info!("Rendered topology config for {} zones", names.len());
    Ok(config)
}

#[derive(Debug, thiserror::Error)]
pub enum SubnetLayoutError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("Zone {zone}: {source}")]
    Address { zone: String, source: AddressError },
}

/// Per-zone subnet layout for every record, in zone-name order.
pub fn render_zone_subnets(
    records: &[NodeRecord],
    network: &NetworkConfig,
) -> Result<Vec<ZoneSubnet>, SubnetLayoutError> {
    zones_by_name(records, &network.zone_prefix)?
        .into_iter()
        .map(|(zone, record)| {
            ZoneSubnet::derive(&zone, &record.subnet, network)
                .map_err(|source| SubnetLayoutError::Address { zone, source })
        })
        .collect()
}
