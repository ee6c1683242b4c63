//! Persisted node record.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ip::Subnet;

/// Zone index of the singleton zone
pub const SINGLETON_ZONE_INDEX: u32 = 0;

/// One node's zone, stored as JSON under its private address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Block reserved for this node by the overlay allocator
    pub subnet: Subnet,
    /// Absent until zone assignment has run (except for the singleton)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_index: Option<u32>,
    pub private_ip: Ipv4Addr,
    pub public_ip: Ipv4Addr,
    pub registered_at: DateTime<Utc>,
}

impl NodeRecord {
    pub fn new(subnet: Subnet, private_ip: Ipv4Addr, public_ip: Ipv4Addr) -> Self {
        NodeRecord {
            subnet,
            zone_index: None,
            private_ip,
            public_ip,
            registered_at: Utc::now(),
        }
    }

    pub fn is_singleton_zone(&self) -> bool {
        is_singleton_zone(self)
    }

    pub fn is_assigned(&self) -> bool {
        self.zone_index.is_some()
    }

    /// Zone name (`z0`, `z1`, ...) once an index is assigned.
    pub fn zone(&self, prefix: &str) -> Option<String> {
        self.zone_index.map(|i| format!("{}{}", prefix, i))
    }
}

/// True iff the record holds zone index 0.
pub fn is_singleton_zone(record: &NodeRecord) -> bool {
    record.zone_index == Some(SINGLETON_ZONE_INDEX)
}
