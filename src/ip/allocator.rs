//! Host address derivation inside a zone's CIDR block.
//!
//! Every zone owns a /24 carved out of the overlay network. The addresses
//! the rest of the system needs (gateway, reserved pool, the automation
//! endpoint) are all derived by fixing the block's low octet, so this file
//! is pure arithmetic with no state of its own.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::config::NetworkConfig;

/// Host offset of the zone gateway.
pub const GATEWAY_OFFSET: u32 = 1;

/// Errors raised while deriving addresses from a block
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Host offset {offset} is out of range for {cidr}")]
    OutOfRange { offset: u32, cidr: String },

    #[error("Invalid CIDR '{cidr}': {reason}")]
    InvalidCidr { cidr: String, reason: String },
}

/// A CIDR block owned by a single zone.
///
/// Serialized as its canonical CIDR string (`"10.1.4.0/24"`). Host bits in
/// parsed input are cleared, so `"10.1.4.7/24"` and `"10.1.4.0/24"` are the
/// same subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subnet {
    cidr: Ipv4Net,
}

impl Subnet {
    pub fn new(cidr: Ipv4Net) -> Self {
        Subnet { cidr: cidr.trunc() }
    }

    /// Network address of the block
    pub fn network(&self) -> Ipv4Addr {
        self.cidr.network()
    }

    pub fn prefix_len(&self) -> u8 {
        self.cidr.prefix_len()
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.cidr.contains(&addr)
    }

    /// Derive the host address at `offset` by replacing the low octet.
    ///
    /// Only blocks where the low octet is the sole variable part (prefix
    /// length 24 or longer) are accepted, and the result must be a usable
    /// host: the network and broadcast addresses are rejected.
    ///
    /// # Examples
    /// ```
    /// use zonectl::ip::Subnet;
    ///
    /// let subnet: Subnet = "10.1.4.0/24".parse().unwrap();
    /// assert_eq!(subnet.host(10).unwrap().to_string(), "10.1.4.10");
    /// assert!(subnet.host(0).is_err());
    /// assert!(subnet.host(255).is_err());
    /// ```
    pub fn host(&self, offset: u32) -> Result<Ipv4Addr, AddressError> {
        let out_of_range = || AddressError::OutOfRange {
            offset,
            cidr: self.to_string(),
        };

        if self.cidr.prefix_len() < 24 {
            return Err(out_of_range());
        }
        let low = u8::try_from(offset).map_err(|_| out_of_range())?;

        let mut octets = self.cidr.network().octets();
        octets[3] = low;
        let addr = Ipv4Addr::from(octets);

        if !self.cidr.contains(&addr)
            || addr == self.cidr.network()
            || addr == self.cidr.broadcast()
        {
            return Err(out_of_range());
        }
        Ok(addr)
    }

    pub fn gateway(&self) -> Result<Ipv4Addr, AddressError> {
        self.host(GATEWAY_OFFSET)
    }

    /// Inclusive bounds of the reserved pool: the gateway plus `reserved_ips`
    /// addresses after it.
    pub fn reserved_range(&self, reserved_ips: u32) -> Result<(Ipv4Addr, Ipv4Addr), AddressError> {
        let upper = GATEWAY_OFFSET.checked_add(reserved_ips).ok_or(AddressError::OutOfRange {
            offset: u32::MAX,
            cidr: self.to_string(),
        })?;
        Ok((self.gateway()?, self.host(upper)?))
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cidr)
    }
}

impl FromStr for Subnet {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cidr: Ipv4Net = s.trim().parse().map_err(|e: ipnet::AddrParseError| {
            AddressError::InvalidCidr {
                cidr: s.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Subnet::new(cidr))
    }
}

impl TryFrom<String> for Subnet {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Subnet> for String {
    fn from(subnet: Subnet) -> Self {
        subnet.to_string()
    }
}

/// Per-zone network layout consumed by downstream cloud configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneSubnet {
    pub az: String,
    pub range: String,
    pub gateway: String,
    /// Reserved pools as `"first-last"` ranges
    pub reserved: Vec<String>,
    pub service_ip: String,
}

impl ZoneSubnet {
    pub fn derive(az: &str, subnet: &Subnet, network: &NetworkConfig) -> Result<Self, AddressError> {
        let (first, last) = subnet.reserved_range(network.reserved_ips)?;
        Ok(ZoneSubnet {
            az: az.to_string(),
            range: subnet.to_string(),
            gateway: subnet.gateway()?.to_string(),
            reserved: vec![format!("{}-{}", first, last)],
            service_ip: subnet.host(network.service_offset)?.to_string(),
        })
    }
}

/// Addresses handed to the embedded automation endpoint on the local node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeNetwork {
    pub internal_cidr: String,
    pub internal_gw: String,
    pub internal_ip: String,
    pub host_ip: String,
}

impl NodeNetwork {
    pub fn derive(subnet: &Subnet, public_ip: Ipv4Addr, network: &NetworkConfig) -> Result<Self, AddressError> {
        Ok(NodeNetwork {
            internal_cidr: subnet.to_string(),
            internal_gw: subnet.gateway()?.to_string(),
            internal_ip: subnet.host(network.service_offset)?.to_string(),
            host_ip: public_ip.to_string(),
        })
    }
}
