//! Scaling plan and published topology document types.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// One partition of zones with its recommended instance count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slice {
    pub azs: Vec<String>,
    pub instances: usize,
}

/// Named slices of one redundancy tier, kept in generation order
/// (`slice1..sliceP`, `x1..x64`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tier(Vec<(String, Slice)>);

impl Tier {
    pub fn push(&mut self, name: impl Into<String>, slice: Slice) {
        self.0.push((name.into(), slice));
    }

    pub fn get(&self, name: &str) -> Option<&Slice> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Slice)> {
        self.0.iter().map(|(n, s)| (n.as_str(), s))
    }
}

impl Serialize for Tier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, slice) in &self.0 {
            map.serialize_entry(name, slice)?;
        }
        map.end()
    }
}

/// Partitioned AZ/instance-count recommendations per redundancy tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalingPlan {
    pub max1: Tier,
    pub max2: Tier,
    pub max3: Tier,
    pub odd3: Tier,
    pub odd5: Tier,
    pub all: Tier,
}

/// Document published for external orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyConfig {
    pub public_ips: BTreeMap<String, Ipv4Addr>,
    pub scaling: ScalingPlan,
}

impl TopologyConfig {
    pub fn to_json(&self) -> Result<String, TopologyError> {
        serde_json::to_string(self).map_err(|e| TopologyError::Serialize(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, TopologyError> {
        serde_json::to_string_pretty(self).map_err(|e| TopologyError::Serialize(e.to_string()))
    }
}

/// Errors raised while building the topology document
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("Cannot plan scaling for an empty zone set")]
    NoZones,

    #[error("Node {private_ip} has no zone index yet")]
    UnassignedZone { private_ip: Ipv4Addr },

    #[error("Zone {0} is claimed by more than one node")]
    DuplicateZone(String),

    #[error("No public address known for zone {0}")]
    MissingPublicAddress(String),

    #[error("Failed to serialize topology config: {0}")]
    Serialize(String),
}
