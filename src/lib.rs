//! # zonectl - Zone assignment and scaling plans for cluster nodes
//!
//! This library bootstraps a small fleet of cluster nodes. Every node gets a
//! unique availability-zone index and a private /24 carved out of a shared
//! overlay network, and the fleet as a whole gets a deterministic scaling
//! plan that workload placement uses to spread service instances across
//! zones.
//!
//! ## Overview
//!
//! Nodes coordinate only through a shared key-value store. Each node
//! registers itself under its private address; the node whose overlay block
//! comes first in the allocator's order becomes the *singleton zone* (index
//! 0) and is the only node allowed to hand out further indices. The current
//! set of zones then feeds two pure computations: host address derivation
//! inside each block and the scaling plan.
//!
//! ## Architecture
//!
//! - `ip`: CIDR arithmetic (`allocator`) and the overlay reservation view (`overlay`)
//! - `registry`: key-value store backends, node records and the zone registry
//! - `topology`: scaling-plan generation and topology document rendering
//! - `config`, `config_loader`: YAML configuration and CLI overrides
//! - `orchestrator`: end-to-end flows used by the `zonectl` binary
//! - `utils`: host address lookup from cloud metadata
//!
//! ## Example Usage
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use zonectl::topology::generate;
//!
//! let zones = vec!["z0".to_string(), "z1".to_string()];
//! let mut public_ips: BTreeMap<String, std::net::Ipv4Addr> = BTreeMap::new();
//! public_ips.insert("z0".to_string(), "192.168.2.10".parse()?);
//! public_ips.insert("z1".to_string(), "192.168.2.11".parse()?);
//!
//! let doc = generate(&zones, &public_ips)?;
//! assert_eq!(doc.scaling.all.get("x4").unwrap().instances, 8);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Published document
//!
//! ```json
//! {
//!   "public_ips": { "z0": "192.168.2.10", "z1": "192.168.2.11" },
//!   "scaling": {
//!     "max1": { "slice1": { "azs": ["z0"], "instances": 1 } },
//!     "odd3": { "slice1": { "azs": ["z0"], "instances": 1 }, ... },
//!     "all":  { "x1": { "azs": ["z0", "z1"], "instances": 2 }, ... }
//!   }
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library modules return typed `thiserror` errors. The orchestrator and
//! binary wrap them with `color_eyre` context.

pub mod config;
pub mod config_loader;
pub mod ip;
pub mod orchestrator;
pub mod registry;
pub mod topology;
pub mod utils;
