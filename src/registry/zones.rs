//! Zone registry: node registration and zone-index assignment.

use std::net::Ipv4Addr;

use log::{debug, info, warn};

use super::record::NodeRecord;
use super::store::{join_key, KvStore, StoreError};
use crate::ip::overlay::{OverlayAllocator, OverlayError};

/// Default key prefix for node records
pub const DEFAULT_NODES_ROOT: &str = "/zonectl/nodes";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),

    #[error("Corrupt node record at {key}: {reason}")]
    RecordCorrupt { key: String, reason: String },

    #[error("Node {caller} is not the singleton zone and may not assign zone indices")]
    NotAuthorized { caller: Ipv4Addr },

    #[error("Overlay allocator has no subnet for public address {public_ip} yet")]
    NoSubnetAvailable { public_ip: Ipv4Addr },
}

impl RegistryError {
    /// Errors a caller may retry after backing off.
    pub fn is_retryable(&self) -> bool {
        match self {
            RegistryError::Store(e) => e.is_retryable(),
            RegistryError::Overlay(OverlayError::Store(e)) => e.is_retryable(),
            RegistryError::NoSubnetAvailable { .. } => true,
            _ => false,
        }
    }
}

/// Outcome of one assignment pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentReport {
    /// Newly assigned `(private address, zone index)` pairs, in assignment order
    pub assigned: Vec<(Ipv4Addr, u32)>,
    /// Records that already carried an index and were left untouched
    pub unchanged: usize,
}

/// Registry of node records kept in the shared store.
///
/// Records are enumerated in the store's own order. For the bundled stores
/// that is ascending key order, i.e. the textual order of the private
/// addresses, which is also the order new zone indices are handed out in.
pub struct ZoneRegistry<S, A> {
    store: S,
    overlay: A,
    root: String,
}

impl<S: KvStore, A: OverlayAllocator> ZoneRegistry<S, A> {
    pub fn new(store: S, overlay: A, root: impl Into<String>) -> Self {
        ZoneRegistry {
            store,
            overlay,
            root: root.into(),
        }
    }

    pub fn overlay(&self) -> &A {
        &self.overlay
    }

    fn record_key(&self, private_ip: Ipv4Addr) -> String {
        join_key(&self.root, &private_ip.to_string())
    }

    fn decode(key: &str, raw: &str) -> Result<NodeRecord, RegistryError> {
        serde_json::from_str(raw).map_err(|e| RegistryError::RecordCorrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn put(&self, record: &NodeRecord) -> Result<(), RegistryError> {
        let key = self.record_key(record.private_ip);
        let raw = serde_json::to_string(record).map_err(|e| RegistryError::RecordCorrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.store.set(&key, &raw)?;
        Ok(())
    }

    /// Look up the record for one node.
    pub fn get(&self, private_ip: Ipv4Addr) -> Result<Option<NodeRecord>, RegistryError> {
        let key = self.record_key(private_ip);
        match self.store.get(&key)? {
            Some(raw) => Ok(Some(Self::decode(&key, &raw)?)),
            None => Ok(None),
        }
    }

    /// Register a node, or return its existing record unchanged.
    ///
    /// A new node takes the block the overlay reserved for its public
    /// address. If that block is first in the overlay's order the node
    /// becomes the singleton zone (index 0); every other node starts
    /// unassigned and waits for [`ZoneRegistry::assign_zone_indices`].
    pub fn register(&self, private_ip: Ipv4Addr, public_ip: Ipv4Addr) -> Result<NodeRecord, RegistryError> {
        if let Some(existing) = self.get(private_ip)? {
            debug!("Node {} already registered with subnet {}", private_ip, existing.subnet);
            return Ok(existing);
        }

        let subnet = self
            .overlay
            .subnet_for(public_ip)?
            .ok_or(RegistryError::NoSubnetAvailable { public_ip })?;

        let mut record = NodeRecord::new(subnet, private_ip, public_ip);
        if self.overlay.is_first(&subnet)? {
            // The allocator order is authoritative, but never mint a second zone 0.
            match self.load_all()?.into_iter().find(|r| r.is_singleton_zone()) {
                Some(holder) => warn!(
                    "Subnet {} is first in overlay order but {} already holds the singleton zone",
                    subnet, holder.private_ip
                ),
                None => record.zone_index = Some(super::record::SINGLETON_ZONE_INDEX),
            }
        }

        self.put(&record)?;
        info!(
            "Registered node {} (public {}) with subnet {}{}",
            private_ip,
            public_ip,
            subnet,
            if record.is_singleton_zone() { " as singleton zone" } else { "" }
        );
        Ok(record)
    }

    /// Every persisted record in store enumeration order.
    ///
    /// A single unreadable record fails the whole call.
    pub fn load_all(&self) -> Result<Vec<NodeRecord>, RegistryError> {
        self.store
            .list(&self.root)?
            .iter()
            .map(|(key, raw)| Self::decode(key, raw))
            .collect()
    }

    /// Hand out zone indices to every unassigned record.
    ///
    /// Only the singleton-zone node may run this. New indices continue from
    /// the highest index already in use. Each record is written on its own,
    /// so an interrupted pass leaves a prefix assigned; running it again
    /// picks up the rest and never touches assigned records.
    pub fn assign_zone_indices(&self, caller: Ipv4Addr) -> Result<AssignmentReport, RegistryError> {
        let records = self.load_all()?;

        let authorized = records
            .iter()
            .any(|r| r.private_ip == caller && r.is_singleton_zone());
        if !authorized {
            return Err(RegistryError::NotAuthorized { caller });
        }

        let mut next = records.iter().filter_map(|r| r.zone_index).max().unwrap_or(0) + 1;
        let mut report = AssignmentReport::default();

        for mut record in records {
            if record.is_assigned() {
                report.unchanged += 1;
                continue;
            }
            record.zone_index = Some(next);
            self.put(&record)?;
            info!("Assigned zone index {} to node {}", next, record.private_ip);
            report.assigned.push((record.private_ip, next));
            next += 1;
        }

        if report.assigned.is_empty() {
            debug!("All {} node records already carry a zone index", report.unchanged);
        }
        Ok(report)
    }
}
