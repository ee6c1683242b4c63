//! Scaling-plan generation.
//!
//! Given the current zones, produce for each redundancy tier a fixed number
//! of slices, each naming the zones a service group should span and how many
//! instances it should run. The output depends only on the sorted zone names.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use log::debug;

use super::types::{ScalingPlan, Slice, Tier, TopologyConfig, TopologyError};

/// Multipliers of the `all` tier; slice `x{m}` runs `m * N` instances.
pub const ALL_MULTIPLIERS: [usize; 7] = [1, 2, 4, 8, 16, 32, 64];

/// `(group size, slice count)` for each partitioned tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TierShapes {
    max2: (usize, usize),
    max3: (usize, usize),
    odd3: (usize, usize),
    odd5: (usize, usize),
}

fn tier_shapes(zone_count: usize) -> TierShapes {
    match zone_count {
        0 | 1 => TierShapes {
            max2: (1, 5),
            max3: (1, 3),
            odd3: (1, 3),
            odd5: (1, 2),
        },
        2 => TierShapes {
            max2: (2, 5),
            max3: (2, 3),
            odd3: (1, 3),
            odd5: (1, 2),
        },
        3..=4 => TierShapes {
            max2: (2, 5),
            max3: (3, 3),
            odd3: (3, 3),
            odd5: (3, 2),
        },
        _ => TierShapes {
            max2: (2, 5),
            max3: (3, 3),
            odd3: (3, 3),
            odd5: (5, 2),
        },
    }
}

/// Split `zones` into `slice_count` windows of `group_size` zones.
///
/// The group size is clamped to the number of zones. Slice `p` takes the
/// window `[(p-1)*g, p*g)`; a window that would run past the end is replaced
/// by the first window `[0, g)` instead of wrapping around modulo the zone
/// count.
///
/// ```
/// use zonectl::topology::partition;
///
/// let zones: Vec<String> = ["z0", "z1", "z2", "z3", "z4"].iter().map(|s| s.to_string()).collect();
/// let tier = partition(&zones, 2, 3);
/// assert_eq!(tier.get("slice2").unwrap().azs, vec!["z2", "z3"]);
/// assert_eq!(tier.get("slice3").unwrap().azs, vec!["z0", "z1"]);
/// ```
pub fn partition(zones: &[String], group_size: usize, slice_count: usize) -> Tier {
    let group = group_size.min(zones.len());
    let mut tier = Tier::default();

    for p in 1..=slice_count {
        let (mut start, mut end) = ((p - 1) * group, p * group);
        if end > zones.len() {
            start = 0;
            end = group;
        }
        tier.push(
            format!("slice{}", p),
            Slice {
                azs: zones[start..end].to_vec(),
                instances: group,
            },
        );
    }
    tier
}

impl ScalingPlan {
    /// Build the plan for a set of zone names.
    ///
    /// Names are sorted lexicographically first, so the caller's order does
    /// not matter.
    pub fn generate(zone_names: &[String]) -> Result<ScalingPlan, TopologyError> {
        if zone_names.is_empty() {
            return Err(TopologyError::NoZones);
        }

        let mut zones = zone_names.to_vec();
        zones.sort();
        let n = zones.len();
        let shapes = tier_shapes(n);

        let mut max1 = Tier::default();
        max1.push(
            "slice1",
            Slice {
                azs: vec![zones[0].clone()],
                instances: 1,
            },
        );

        let mut all = Tier::default();
        for m in ALL_MULTIPLIERS {
            all.push(
                format!("x{}", m),
                Slice {
                    azs: zones.clone(),
                    instances: m * n,
                },
            );
        }

        debug!("Generated scaling plan for {} zones ({:?})", n, shapes);
        Ok(ScalingPlan {
            max1,
            max2: partition(&zones, shapes.max2.0, shapes.max2.1),
            max3: partition(&zones, shapes.max3.0, shapes.max3.1),
            odd3: partition(&zones, shapes.odd3.0, shapes.odd3.1),
            odd5: partition(&zones, shapes.odd5.0, shapes.odd5.1),
            all,
        })
    }
}

/// Build the topology document for the given zones and their public
/// addresses. Every zone must have an address.
pub fn generate(
    zone_names: &[String],
    public_addr_by_zone: &BTreeMap<String, Ipv4Addr>,
) -> Result<TopologyConfig, TopologyError> {
    let scaling = ScalingPlan::generate(zone_names)?;

    let mut public_ips = BTreeMap::new();
    for zone in zone_names {
        let addr = public_addr_by_zone
            .get(zone)
            .ok_or_else(|| TopologyError::MissingPublicAddress(zone.clone()))?;
        public_ips.insert(zone.clone(), *addr);
    }

    Ok(TopologyConfig { public_ips, scaling })
}
