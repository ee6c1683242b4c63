//! Scaling plans and the published topology document.
//!
//! `scaling` is the pure plan generator, `render` turns registry records
//! into the document consumed by external orchestration.

pub mod render;
pub mod scaling;
pub mod types;

// Re-export key types and functions for easier access
pub use render::{render_topology_config, render_zone_subnets, SubnetLayoutError};
pub use scaling::{generate, partition, ALL_MULTIPLIERS};
pub use types::{ScalingPlan, Slice, Tier, TopologyConfig, TopologyError};
