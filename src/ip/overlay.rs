//! Overlay network allocator view.
//!
//! The overlay (flannel or an equivalent) hands each node a /24 and records
//! the reservation in the shared store. This module only reads those
//! reservations: it answers "which block belongs to this public address"
//! and "what is the agreed order of all blocks". The first block in that
//! order marks the singleton zone.

use std::net::Ipv4Addr;

use log::debug;
use serde::Deserialize;

use super::allocator::Subnet;
use crate::registry::store::{KvStore, StoreError};

/// Default location of flannel's subnet reservations
pub const DEFAULT_SUBNETS_ROOT: &str = "/coreos.com/network/subnets";

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Corrupt overlay reservation at {key}: {reason}")]
    CorruptReservation { key: String, reason: String },
}

/// One block handed out by the overlay allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub subnet: Subnet,
    pub public_ip: Ipv4Addr,
}

/// Read-only access to the overlay allocator.
pub trait OverlayAllocator {
    /// All current reservations in the allocator's total order.
    fn reservations(&self) -> Result<Vec<Reservation>, OverlayError>;

    /// The block reserved for `public_ip`, if the allocator has one yet.
    fn subnet_for(&self, public_ip: Ipv4Addr) -> Result<Option<Subnet>, OverlayError> {
        Ok(self
            .reservations()?
            .into_iter()
            .find(|r| r.public_ip == public_ip)
            .map(|r| r.subnet))
    }

    /// Whether `subnet` comes first in the total order.
    fn is_first(&self, subnet: &Subnet) -> Result<bool, OverlayError> {
        Ok(self.reservations()?.first().map(|r| &r.subnet) == Some(subnet))
    }
}

/// Progress of overlay reservations against the expected cluster size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayStatus {
    pub reserved: usize,
    pub expected: usize,
}

impl OverlayStatus {
    /// Every expected member has claimed its block.
    pub fn is_ready(&self) -> bool {
        self.reserved == self.expected
    }

    /// `"reserved/expected"` progress string.
    pub fn progress(&self) -> String {
        format!("{}/{}", self.reserved, self.expected)
    }
}

/// Compare reservation count with the expected number of members.
pub fn overlay_status<A: OverlayAllocator + ?Sized>(
    allocator: &A,
    expected: usize,
) -> Result<OverlayStatus, OverlayError> {
    Ok(OverlayStatus {
        reserved: allocator.reservations()?.len(),
        expected,
    })
}

#[derive(Deserialize)]
struct FlannelLease {
    #[serde(rename = "PublicIP")]
    public_ip: Ipv4Addr,
}

/// Flannel's etcd layout: one key per block named `A.B.C.D-PREFIX`, value
/// `{"PublicIP": "..."}`. Blocks are ordered by the reserving node's public
/// address.
#[derive(Debug, Clone)]
pub struct FlannelAllocator<S> {
    store: S,
    root: String,
}

impl<S: KvStore> FlannelAllocator<S> {
    pub fn new(store: S, root: impl Into<String>) -> Self {
        FlannelAllocator {
            store,
            root: root.into(),
        }
    }

    /// Parse a reservation key such as `/coreos.com/network/subnets/10.1.4.0-24`.
    pub fn parse_key(key: &str) -> Result<Subnet, OverlayError> {
        let name = key.rsplit('/').next().unwrap_or(key);
        name.replacen('-', "/", 1)
            .parse()
            .map_err(|e: super::allocator::AddressError| OverlayError::CorruptReservation {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}

impl<S: KvStore> OverlayAllocator for FlannelAllocator<S> {
    fn reservations(&self) -> Result<Vec<Reservation>, OverlayError> {
        let mut out = Vec::new();
        for (key, value) in self.store.list(&self.root)? {
            let subnet = Self::parse_key(&key)?;
            let lease: FlannelLease =
                serde_json::from_str(&value).map_err(|e| OverlayError::CorruptReservation {
                    key: key.clone(),
                    reason: e.to_string(),
                })?;
            out.push(Reservation {
                subnet,
                public_ip: lease.public_ip,
            });
        }
        out.sort_by_key(|r| r.public_ip);
        debug!("Loaded {} overlay reservations from {}", out.len(), self.root);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::store::MemoryStore;

    fn reserve(store: &MemoryStore, cidr: &str, public_ip: &str) {
        let key = format!("{}/{}", DEFAULT_SUBNETS_ROOT, cidr.replace('/', "-"));
        store
            .set(&key, &format!(r#"{{"PublicIP":"{}","BackendType":"vxlan"}}"#, public_ip))
            .unwrap();
    }

    #[test]
    fn test_order_follows_public_ip() {
        let store = MemoryStore::new();
        reserve(&store, "10.1.2.0/24", "192.168.2.12");
        reserve(&store, "10.1.9.0/24", "192.168.2.10");
        reserve(&store, "10.1.5.0/24", "192.168.2.11");

        let allocator = FlannelAllocator::new(&store, DEFAULT_SUBNETS_ROOT);
        let order: Vec<String> = allocator
            .reservations()
            .unwrap()
            .iter()
            .map(|r| r.subnet.to_string())
            .collect();
        assert_eq!(order, vec!["10.1.9.0/24", "10.1.5.0/24", "10.1.2.0/24"]);

        assert!(allocator.is_first(&"10.1.9.0/24".parse().unwrap()).unwrap());
        assert!(!allocator.is_first(&"10.1.2.0/24".parse().unwrap()).unwrap());
    }

    #[test]
    fn test_subnet_lookup() {
        let store = MemoryStore::new();
        reserve(&store, "10.1.5.0/24", "192.168.2.11");
        let allocator = FlannelAllocator::new(&store, DEFAULT_SUBNETS_ROOT);

        let found = allocator.subnet_for("192.168.2.11".parse().unwrap()).unwrap();
        assert_eq!(found.map(|s| s.to_string()).as_deref(), Some("10.1.5.0/24"));
        assert_eq!(allocator.subnet_for("192.168.2.99".parse().unwrap()).unwrap(), None);
    }

    #[test]
    fn test_corrupt_reservation() {
        let store = MemoryStore::new();
        store.set("/coreos.com/network/subnets/not-a-cidr", "{}").unwrap();
        let allocator = FlannelAllocator::new(&store, DEFAULT_SUBNETS_ROOT);
        assert!(matches!(
            allocator.reservations(),
            Err(OverlayError::CorruptReservation { .. })
        ));
    }

    #[test]
    fn test_status_progress() {
        let store = MemoryStore::new();
        reserve(&store, "10.1.5.0/24", "192.168.2.11");
        let allocator = FlannelAllocator::new(&store, DEFAULT_SUBNETS_ROOT);

        let status = overlay_status(&allocator, 3).unwrap();
        assert!(!status.is_ready());
        assert_eq!(status.progress(), "1/3");

        reserve(&store, "10.1.6.0/24", "192.168.2.12");
        reserve(&store, "10.1.7.0/24", "192.168.2.13");
        assert!(overlay_status(&allocator, 3).unwrap().is_ready());
    }
}
