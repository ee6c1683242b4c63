//! Rendered topology documents for clusters of various sizes.

use std::net::Ipv4Addr;

use rand::seq::SliceRandom;
use serde_json::{json, Value};

use zonectl::registry::NodeRecord;
use zonectl::topology::render_topology_config;

fn node(i: u32) -> NodeRecord {
    let mut record = NodeRecord::new(
        format!("10.1.{}.0/24", i + 1).parse().unwrap(),
        Ipv4Addr::new(192, 168, 1, 10 + i as u8),
        Ipv4Addr::new(192, 168, 2, 10 + i as u8),
    );
    record.zone_index = Some(i);
    record
}

/// Cluster of `size` nodes in random order; rendering must not depend on it.
fn cluster(size: u32) -> Vec<NodeRecord> {
    let mut nodes: Vec<NodeRecord> = (0..size).map(node).collect();
    nodes.shuffle(&mut rand::thread_rng());
    nodes
}

fn render(size: u32) -> Value {
    let json = render_topology_config(&cluster(size), "z").unwrap().to_json().unwrap();
    serde_json::from_str(&json).unwrap()
}

fn slice(azs: &[&str], instances: usize) -> Value {
    json!({ "azs": azs, "instances": instances })
}

fn all_tier(azs: &[&str]) -> Value {
    let n = azs.len();
    json!({
        "x1": slice(azs, n),
        "x2": slice(azs, 2 * n),
        "x4": slice(azs, 4 * n),
        "x8": slice(azs, 8 * n),
        "x16": slice(azs, 16 * n),
        "x32": slice(azs, 32 * n),
        "x64": slice(azs, 64 * n),
    })
}

#[test]
fn test_one_node_cluster() {
    let z0 = &["z0"];
    let expected = json!({
        "public_ips": { "z0": "192.168.2.10" },
        "scaling": {
            "odd3": { "slice1": slice(z0, 1), "slice2": slice(z0, 1), "slice3": slice(z0, 1) },
            "odd5": { "slice1": slice(z0, 1), "slice2": slice(z0, 1) },
            "max1": { "slice1": slice(z0, 1) },
            "max2": {
                "slice1": slice(z0, 1), "slice2": slice(z0, 1), "slice3": slice(z0, 1),
                "slice4": slice(z0, 1), "slice5": slice(z0, 1)
            },
            "max3": { "slice1": slice(z0, 1), "slice2": slice(z0, 1), "slice3": slice(z0, 1) },
            "all": all_tier(z0),
        }
    });
    assert_eq!(render(1), expected);
}

#[test]
fn test_two_node_cluster() {
    let both = &["z0", "z1"];
    let expected = json!({
        "public_ips": { "z0": "192.168.2.10", "z1": "192.168.2.11" },
        "scaling": {
            "odd3": { "slice1": slice(&["z0"], 1), "slice2": slice(&["z1"], 1), "slice3": slice(&["z0"], 1) },
            "odd5": { "slice1": slice(&["z0"], 1), "slice2": slice(&["z1"], 1) },
            "max1": { "slice1": slice(&["z0"], 1) },
            "max2": {
                "slice1": slice(both, 2), "slice2": slice(both, 2), "slice3": slice(both, 2),
                "slice4": slice(both, 2), "slice5": slice(both, 2)
            },
            "max3": { "slice1": slice(both, 2), "slice2": slice(both, 2), "slice3": slice(both, 2) },
            "all": all_tier(both),
        }
    });
    assert_eq!(render(2), expected);
}

#[test]
fn test_three_node_cluster() {
    let three = &["z0", "z1", "z2"];
    let pair = &["z0", "z1"];
    let expected = json!({
        "public_ips": { "z0": "192.168.2.10", "z1": "192.168.2.11", "z2": "192.168.2.12" },
        "scaling": {
            "odd3": { "slice1": slice(three, 3), "slice2": slice(three, 3), "slice3": slice(three, 3) },
            "odd5": { "slice1": slice(three, 3), "slice2": slice(three, 3) },
            "max1": { "slice1": slice(&["z0"], 1) },
            "max2": {
                "slice1": slice(pair, 2), "slice2": slice(pair, 2), "slice3": slice(pair, 2),
                "slice4": slice(pair, 2), "slice5": slice(pair, 2)
            },
            "max3": { "slice1": slice(three, 3), "slice2": slice(three, 3), "slice3": slice(three, 3) },
            "all": all_tier(three),
        }
    });
    assert_eq!(render(3), expected);
}

#[test]
fn test_five_node_cluster() {
    let five = &["z0", "z1", "z2", "z3", "z4"];
    let three = &["z0", "z1", "z2"];
    let expected = json!({
        "public_ips": {
            "z0": "192.168.2.10", "z1": "192.168.2.11", "z2": "192.168.2.12",
            "z3": "192.168.2.13", "z4": "192.168.2.14"
        },
        "scaling": {
            "odd3": { "slice1": slice(three, 3), "slice2": slice(three, 3), "slice3": slice(three, 3) },
            "odd5": { "slice1": slice(five, 5), "slice2": slice(five, 5) },
            "max1": { "slice1": slice(&["z0"], 1) },
            "max2": {
                "slice1": slice(&["z0", "z1"], 2),
                "slice2": slice(&["z2", "z3"], 2),
                "slice3": slice(&["z0", "z1"], 2),
                "slice4": slice(&["z0", "z1"], 2),
                "slice5": slice(&["z0", "z1"], 2)
            },
            "max3": { "slice1": slice(three, 3), "slice2": slice(three, 3), "slice3": slice(three, 3) },
            "all": all_tier(five),
        }
    });
    assert_eq!(render(5), expected);
}

#[test]
fn test_nine_node_cluster() {
    let nine = &["z0", "z1", "z2", "z3", "z4", "z5", "z6", "z7", "z8"];
    let expected = json!({
        "public_ips": {
            "z0": "192.168.2.10", "z1": "192.168.2.11", "z2": "192.168.2.12",
            "z3": "192.168.2.13", "z4": "192.168.2.14", "z5": "192.168.2.15",
            "z6": "192.168.2.16", "z7": "192.168.2.17", "z8": "192.168.2.18"
        },
        "scaling": {
            "odd3": {
                "slice1": slice(&["z0", "z1", "z2"], 3),
                "slice2": slice(&["z3", "z4", "z5"], 3),
                "slice3": slice(&["z6", "z7", "z8"], 3)
            },
            "odd5": {
                "slice1": slice(&["z0", "z1", "z2", "z3", "z4"], 5),
                "slice2": slice(&["z0", "z1", "z2", "z3", "z4"], 5)
            },
            "max1": { "slice1": slice(&["z0"], 1) },
            "max2": {
                "slice1": slice(&["z0", "z1"], 2),
                "slice2": slice(&["z2", "z3"], 2),
                "slice3": slice(&["z4", "z5"], 2),
                "slice4": slice(&["z6", "z7"], 2),
                "slice5": slice(&["z0", "z1"], 2)
            },
            "max3": {
                "slice1": slice(&["z0", "z1", "z2"], 3),
                "slice2": slice(&["z3", "z4", "z5"], 3),
                "slice3": slice(&["z6", "z7", "z8"], 3)
            },
            "all": all_tier(nine),
        }
    });
    let doc = render(9);
    assert_eq!(doc["scaling"]["all"]["x64"]["instances"], 576);
    assert_eq!(doc, expected);
}

#[test]
fn test_render_is_order_independent_and_stable() {
    let a = render_topology_config(&cluster(7), "z").unwrap().to_json().unwrap();
    let b = render_topology_config(&cluster(7), "z").unwrap().to_json().unwrap();
    assert_eq!(a, b);
}
