//! Shared utilities: host address lookup from cloud metadata.

pub mod ip_utils;

pub use ip_utils::{lookup_ipv4_address, LookupError, DEFAULT_METADATA_FILE};
