//! Address derivation and overlay network access.
//!
//! `allocator` turns a zone's CIDR block into concrete host addresses;
//! `overlay` reads the block reservations made by the overlay allocator.

pub mod allocator;
pub mod overlay;

// Re-export commonly used types
pub use allocator::{AddressError, NodeNetwork, Subnet, ZoneSubnet, GATEWAY_OFFSET};
pub use overlay::{overlay_status, FlannelAllocator, OverlayAllocator, OverlayError, OverlayStatus, Reservation};
