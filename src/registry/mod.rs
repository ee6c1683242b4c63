//! # Zone Registry
//!
//! Every node in the cluster keeps one record in the shared key-value store,
//! keyed by its private address. The registry is the only writer of those
//! records and the only place zone indices are minted.
//!
//! ## Lifecycle of a record
//!
//! 1. **Registration**: a node looks up the block the overlay reserved for
//!    its public address and stores an unassigned record. The node whose
//!    block is first in the overlay's order is stored with zone index 0
//!    straight away and becomes the singleton zone.
//! 2. **Assignment**: once all nodes are visible, the singleton node walks
//!    the unassigned records and gives each the next free index.
//! 3. Records are never deleted.
//!
//! ## Store layout
//!
//! ```text
//! /zonectl/nodes/
//! |-- 172.17.8.101    {"subnet":"10.1.30.0/24","zone_index":0,...}
//! |-- 172.17.8.102    {"subnet":"10.1.20.0/24","zone_index":1,...}
//! \-- 172.17.8.103    {"subnet":"10.1.10.0/24",...}
//! ```
//!
//! ## Concurrency
//!
//! There is no compare-and-swap. `register` is idempotent per node, and only
//! the singleton node assigns indices, so retries are always safe.

pub mod record;
pub mod store;
pub mod zones;

pub use record::{is_singleton_zone, NodeRecord, SINGLETON_ZONE_INDEX};
pub use store::{FileStore, KvStore, MemoryStore, StoreError};
pub use zones::{AssignmentReport, RegistryError, ZoneRegistry, DEFAULT_NODES_ROOT};
