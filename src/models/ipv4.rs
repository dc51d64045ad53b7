//! IPv4 address and CIDR notation utilities.
//!
//! Provides [`Ipv4`] struct for representing IPv4 CIDR blocks,
//! along with the range arithmetic used by the topology checks.

use serde::de;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Maximum length for an IPv4 subnet mask (32 bits).
pub const MAX_LENGTH: u8 = 32;

/// Addresses GCP reserves in every primary subnet range
/// (network, default gateway, second-to-last and broadcast).
pub const GCP_RESERVED_ADDRESSES: u64 = 4;

/// Convert a CIDR prefix length to a subnet mask as u32.
///
/// # Examples
/// ```
/// use gcp_network_topology::models::get_cidr_mask;
/// assert_eq!(get_cidr_mask(24).unwrap(), 0xFFFFFF00);
/// ```
pub fn get_cidr_mask(len: u8) -> Result<u32, Box<dyn Error>> {
    if len > MAX_LENGTH {
        Err("Network length is too long".into())
    } else {
        Ok(mask_bits(len))
    }
}

fn mask_bits(len: u8) -> u32 {
    let right_len = MAX_LENGTH - len.min(MAX_LENGTH);
    let all_bits = u32::MAX as u64;
    ((all_bits >> right_len) << right_len) as u32
}

/// Calculate the broadcast address for a given IP and prefix length.
pub fn broadcast_addr(addr: Ipv4Addr, len: u8) -> Result<Ipv4Addr, Box<dyn Error>> {
    let mask = get_cidr_mask(len)?;
    Ok(Ipv4Addr::from((u32::from(addr) & mask) | !mask))
}

/// Returns the IP address following the given subnet.
pub fn ip_after_subnet(addr: Ipv4Addr, cidr: u8) -> Result<Ipv4Addr, Box<dyn Error>> {
    if cidr > MAX_LENGTH {
        return Err("Network length is too long".into());
    }
    let subnet_size = 1u64 << (MAX_LENGTH - cidr);
    let network_bits = (u32::from(addr) & get_cidr_mask(cidr)?) as u64;
    let next_bits = network_bits + subnet_size;
    if next_bits > u32::MAX as u64 {
        return Err("Next subnet calculation overflowed".into());
    }
    Ok(Ipv4Addr::from(next_bits as u32))
}

/// Calculate the next subnet after the given [`Ipv4`] subnet.
///
/// If `mask` is provided, the next subnet will use that mask size.
pub fn next_subnet_ipv4(ipv4: Ipv4, mask: Option<u8>) -> Result<Ipv4, Box<dyn Error>> {
    let new_mask = mask.unwrap_or(ipv4.mask);
    let addr = if new_mask <= ipv4.mask {
        ip_after_subnet(ipv4.addr, new_mask)?
    } else {
        // smaller subnet, step past the current block first
        ip_after_subnet(broadcast_addr(ipv4.addr, ipv4.mask)?, new_mask)?
    };
    Ok(Ipv4 {
        addr,
        mask: new_mask,
    })
}

/// Number of usable host addresses in a GCP primary range.
pub fn num_gcp_hosts(len: u8) -> Result<u64, Box<dyn Error>> {
    if len > MAX_LENGTH - 3 {
        // GCP accepts /29 as the smallest primary range
        Err("Network length is too long or invalid".into())
    } else {
        Ok((1u64 << (MAX_LENGTH - len)) - GCP_RESERVED_ADDRESSES)
    }
}

/// Calculate the minimum mask for an IP address based on trailing zeros.
pub fn lo_mask(ip: Ipv4Addr) -> u8 {
    let trailing_zeros = u32::from(ip).trailing_zeros().min(32) as u8;
    MAX_LENGTH - trailing_zeros
}

/// IPv4 CIDR block.
#[derive(Eq, Ord, Debug, Copy, Clone, Hash)]
pub struct Ipv4 {
    /// The IPv4 address.
    pub addr: Ipv4Addr,
    /// The prefix length (0-32).
    pub mask: u8,
}

impl Serialize for Ipv4 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ipv4 {
    fn deserialize<D>(deserializer: D) -> Result<Ipv4, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ipv4::new(&s).map_err(|e| de::Error::custom(format!("invalid CIDR '{s}': {e}")))
    }
}

impl FromStr for Ipv4 {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ipv4::new(s)
    }
}

impl Ipv4 {
    /// Create a new [`Ipv4`] from a CIDR string (e.g., "10.0.0.0/24").
    pub fn new(addr_cidr: &str) -> Result<Ipv4, Box<dyn Error>> {
        let addr_cidr = addr_cidr.trim();
        let (addr, mask) = addr_cidr
            .split_once('/')
            .ok_or_else(|| format!("Invalid address/mask {addr_cidr}"))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| format!("Invalid address {addr}"))?;
        let mask: u8 = mask
            .parse()
            .map_err(|_| format!("Invalid subnet mask {mask}"))?;
        if mask > MAX_LENGTH {
            return Err("Network length is too long".into());
        }
        Ok(Ipv4 { addr, mask })
    }

    /// Get the highest (broadcast) address in the subnet.
    pub fn hi(&self) -> Ipv4Addr {
        let mask = mask_bits(self.mask);
        Ipv4Addr::from((u32::from(self.addr) & mask) | !mask)
    }

    /// Get the lowest (network) address in the subnet.
    pub fn lo(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.addr) & mask_bits(self.mask))
    }

    /// True when the address carries no host bits.
    pub fn is_canonical(&self) -> bool {
        self.addr == self.lo()
    }

    /// Total addresses in the block.
    pub fn num_addresses(&self) -> u64 {
        1u64 << (MAX_LENGTH - self.mask.min(MAX_LENGTH))
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.lo() <= ip && ip <= self.hi()
    }

    /// True when every address of `other` lies in this block.
    pub fn contains_block(&self, other: &Ipv4) -> bool {
        self.contains(other.lo()) && self.contains(other.hi())
    }

    pub fn overlaps(&self, other: &Ipv4) -> bool {
        self.lo() <= other.hi() && other.lo() <= self.hi()
    }
}

impl std::fmt::Display for Ipv4 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.mask)
    }
}

impl PartialEq for Ipv4 {
    fn eq(&self, other: &Ipv4) -> bool {
        self.addr == other.addr && self.mask == other.mask
    }
}

impl PartialOrd for Ipv4 {
    fn partial_cmp(&self, other: &Ipv4) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cidr_mask() {
        assert_eq!(get_cidr_mask(0).unwrap(), 0x00000000);
        assert_eq!(get_cidr_mask(8).unwrap(), 0xFF000000);
        assert_eq!(get_cidr_mask(16).unwrap(), 0xFFFF0000);
        assert_eq!(get_cidr_mask(22).unwrap(), 0xFFFFFC00);
        assert_eq!(get_cidr_mask(32).unwrap(), 0xFFFFFFFF);
        assert!(get_cidr_mask(33).is_err());
    }

    #[test]
    fn test_ip_after_subnet() {
        let ip = Ipv4Addr::new(10, 0, 1, 0);
        assert_eq!(ip_after_subnet(ip, 24).unwrap(), Ipv4Addr::new(10, 0, 2, 0));
        assert_eq!(ip_after_subnet(ip, 16).unwrap(), Ipv4Addr::new(10, 1, 0, 0));
        assert!(ip_after_subnet(Ipv4Addr::new(255, 255, 255, 0), 24).is_err());
    }

    #[test]
    fn test_next_subnet_ipv4() {
        let public = Ipv4::new("10.0.1.0/24").unwrap();
        assert_eq!(
            next_subnet_ipv4(public, None).unwrap(),
            Ipv4::new("10.0.2.0/24").unwrap()
        );
        assert_eq!(
            next_subnet_ipv4(public, Some(28)).unwrap(),
            Ipv4::new("10.0.2.0/28").unwrap()
        );
        assert_eq!(
            next_subnet_ipv4(public, Some(16)).unwrap(),
            Ipv4::new("10.1.0.0/16").unwrap()
        );
    }

    #[test]
    fn test_broadcast_addr() {
        let ip = Ipv4Addr::new(35, 191, 0, 0);
        assert_eq!(
            broadcast_addr(ip, 16).unwrap(),
            Ipv4Addr::new(35, 191, 255, 255)
        );
        assert_eq!(broadcast_addr(ip, 32).unwrap(), ip);
    }

    #[test]
    fn test_num_gcp_hosts() {
        assert_eq!(num_gcp_hosts(24).unwrap(), 252);
        assert_eq!(num_gcp_hosts(16).unwrap(), 65532);
        assert_eq!(num_gcp_hosts(29).unwrap(), 4);
        assert_eq!(
            num_gcp_hosts(30).unwrap_err().to_string(),
            "Network length is too long or invalid"
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Ipv4::new("10.0.0.0").is_err());
        assert!(Ipv4::new("10.0.0.0/33").is_err());
        assert!(Ipv4::new("10.0.0.300/24").is_err());
        assert!(Ipv4::new("10.0.0.0/x").is_err());
        assert_eq!(
            " 10.0.2.0/24 ".parse::<Ipv4>().unwrap(),
            Ipv4::new("10.0.2.0/24").unwrap()
        );
    }

    #[test]
    fn test_serde_string_form() {
        let cidr = Ipv4::new("10.1.0.0/16").unwrap();
        assert_eq!(serde_json::to_string(&cidr).unwrap(), "\"10.1.0.0/16\"");
        let back: Ipv4 = serde_json::from_str("\"10.1.0.0/16\"").unwrap();
        assert_eq!(back, cidr);
        assert!(serde_json::from_str::<Ipv4>("\"10.1.0.0/40\"").is_err());
    }

    #[test]
    fn test_overlaps() {
        let vpc = Ipv4::new("10.0.0.0/16").unwrap();
        let private = Ipv4::new("10.0.2.0/24").unwrap();
        let data = Ipv4::new("10.0.3.0/24").unwrap();
        let pods = Ipv4::new("10.1.0.0/16").unwrap();

        assert!(vpc.overlaps(&private));
        assert!(private.overlaps(&vpc));
        assert!(!private.overlaps(&data));
        assert!(!vpc.overlaps(&pods));
        assert!(vpc.contains_block(&data));
        assert!(!data.contains_block(&vpc));
    }

    #[test]
    fn test_canonical() {
        assert!(Ipv4::new("10.0.2.0/24").unwrap().is_canonical());
        assert!(!Ipv4::new("10.0.2.7/24").unwrap().is_canonical());
        assert_eq!(Ipv4::new("10.0.2.7/24").unwrap().num_addresses(), 256);
    }

    #[test]
    fn test_ip4_cmp_overlap() {
        let ip1 = Ipv4::new("10.0.10.0/24").unwrap();
        let ip2 = Ipv4::new("10.0.0.0/8").unwrap();
        let ip3 = Ipv4::new("10.0.10.64/26").unwrap();

        assert!(ip1 > ip2);
        assert!(ip1 < ip3);
        assert!(ip2.lo() < ip1.lo());
        assert!(ip2.hi() > ip3.hi());
        assert_eq!(ip2.hi(), Ipv4Addr::new(10, 255, 255, 255));
    }

    #[test]
    fn test_lo_mask() {
        assert_eq!(lo_mask(Ipv4Addr::new(192, 168, 1, 1)), 32);
        assert_eq!(lo_mask(Ipv4Addr::new(10, 0, 4, 0)), 22);
        assert_eq!(lo_mask(Ipv4Addr::new(0, 0, 0, 0)), 0);
    }
}
