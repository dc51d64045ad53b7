//! Gap finding between subnets.
//!
//! Walks the network address space in order and identifies unused IP
//! address ranges between the allocated primary subnet ranges.

use crate::models::{lo_mask, next_subnet_ipv4, num_gcp_hosts, Ipv4, Subnet, Topology};
use std::net::Ipv4Addr;

/// Represents a row of the address plan for output.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressPlanRow {
    /// Row index (0 for gap rows).
    pub j: usize,
    /// `-gap-`, `primary` or `secondary`.
    pub kind: String,
    pub cidr: Ipv4,
    pub broadcast: Ipv4Addr,
    /// Usable host addresses (0 for secondary ranges, which hold alias IPs).
    pub hosts: u64,
    pub subnet_name: String,
    pub tier: String,
    pub region: String,
    /// Whether instances in the range egress through the NAT gateway.
    pub nat: bool,
}

/// Build the address plan: primary ranges with the gaps between them, then secondary ranges.
///
/// # Arguments
/// * `topology` - The declared topology
/// * `gap_cidr_mask` - Largest block size reported for one gap row
pub fn address_plan(topology: &Topology, gap_cidr_mask: u8) -> Vec<AddressPlanRow> {
    let space = topology.network.address_space;
    let mut subnets: Vec<&Subnet> = topology
        .subnets
        .iter()
        .filter(|s| space.contains_block(&s.ip_cidr_range))
        .collect();
    subnets.sort_by_key(|s| s.ip_cidr_range.lo());

    let mut rows = Vec::new();
    let mut next_ip = space.lo();
    let mut exhausted = false;
    for (i, s) in subnets.iter().enumerate() {
        let cidr = s.ip_cidr_range;
        if !exhausted && next_ip < cidr.lo() {
            rows.extend(gap_rows(next_ip, cidr.lo(), gap_cidr_mask));
        }
        rows.push(subnet_row(s, i + 1, cidr, "primary"));
        match next_subnet_ipv4(cidr, None) {
            Ok(next) if next.lo() > next_ip => next_ip = next.lo(),
            Ok(_) => {}
            // the subnet ends at 255.255.255.255
            Err(_) => exhausted = true,
        }
    }
    if !exhausted && space.contains(next_ip) {
        rows.extend(gap_rows_through(next_ip, space.hi(), gap_cidr_mask));
    }

    let mut j = subnets.len();
    for s in &topology.subnets {
        for r in &s.secondary_ip_range {
            j += 1;
            let mut row = subnet_row(s, j, r.ip_cidr_range, "secondary");
            row.subnet_name = format!("{}/{}", s.name, r.range_name);
            row.hosts = 0;
            rows.push(row);
        }
    }
    log::debug!("address plan has {} rows", rows.len());
    rows
}

fn subnet_row(s: &Subnet, j: usize, cidr: Ipv4, kind: &str) -> AddressPlanRow {
    AddressPlanRow {
        j,
        kind: kind.to_string(),
        cidr,
        broadcast: cidr.hi(),
        hosts: num_gcp_hosts(cidr.mask).unwrap_or(0),
        subnet_name: s.name.clone(),
        tier: s.tier.to_string(),
        region: s.region.clone(),
        nat: s.tier.uses_nat(),
    }
}

/// Gap rows covering `[start, end)`.
fn gap_rows(start: Ipv4Addr, end: Ipv4Addr, max_mask: u8) -> Vec<AddressPlanRow> {
    let mut rows = Vec::new();
    let mut next_ip = start;
    while next_ip < end {
        let mask = find_biggest_subnet(next_ip, max_mask, end);
        let gap = Ipv4 {
            addr: next_ip,
            mask,
        };
        rows.push(gap_row(gap));
        match next_subnet_ipv4(gap, None) {
            Ok(next) => next_ip = next.lo(),
            Err(_) => break,
        }
    }
    rows
}

/// Gap rows covering `[start, last]`.
fn gap_rows_through(start: Ipv4Addr, last: Ipv4Addr, max_mask: u8) -> Vec<AddressPlanRow> {
    match u32::from(last).checked_add(1) {
        Some(end) => gap_rows(start, Ipv4Addr::from(end), max_mask),
        None => {
            // the space runs to the top of the address range
            let mut rows = gap_rows(start, Ipv4Addr::new(255, 255, 255, 255), max_mask);
            rows.push(gap_row(Ipv4 {
                addr: Ipv4Addr::new(255, 255, 255, 255),
                mask: 32,
            }));
            rows
        }
    }
}

fn gap_row(gap: Ipv4) -> AddressPlanRow {
    AddressPlanRow {
        j: 0,
        kind: "-gap-".to_string(),
        cidr: gap,
        broadcast: gap.hi(),
        hosts: num_gcp_hosts(gap.mask).unwrap_or(0),
        subnet_name: "None".to_string(),
        tier: "None".to_string(),
        region: "None".to_string(),
        nat: false,
    }
}

/// Find the biggest aligned block starting at `start_ip` that ends before `below`.
///
/// The returned mask is constrained by:
/// 1. The `start_mask` parameter (won't return a smaller mask)
/// 2. The IP alignment - `start_ip` must be a valid network address for the mask
/// 3. The block must end before `below`
fn find_biggest_subnet(start_ip: Ipv4Addr, start_mask: u8, below: Ipv4Addr) -> u8 {
    let mut next_mask = start_mask.max(lo_mask(start_ip)).min(32);
    while next_mask < 32 {
        let block = Ipv4 {
            addr: start_ip,
            mask: next_mask,
        };
        if block.hi() >= below {
            next_mask += 1;
        } else {
            break;
        }
    }
    next_mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn test_find_biggest_subnet() {
        let start_ip = Ipv4Addr::new(10, 0, 0, 0);
        assert_eq!(24, find_biggest_subnet(start_ip, 8, Ipv4Addr::new(10, 0, 1, 0)));
        assert_eq!(28, find_biggest_subnet(start_ip, 28, Ipv4Addr::new(10, 0, 1, 0)));

        // 10.11.12.16 has 4 trailing zeros, so min mask = 28
        let start_ip = Ipv4Addr::new(10, 11, 12, 16);
        assert_eq!(28, find_biggest_subnet(start_ip, 8, Ipv4Addr::new(10, 11, 16, 0)));

        // 10.11.12.0 can be a valid /22 network address
        let start_ip = Ipv4Addr::new(10, 11, 12, 0);
        assert_eq!(22, find_biggest_subnet(start_ip, 8, Ipv4Addr::new(10, 11, 16, 0)));
    }

    #[test]
    fn test_find_biggest_subnet_alignment() {
        // 10.6.2.80 binary ends in 0101_0000, so it can only start a /28 or smaller
        let start_ip = Ipv4Addr::new(10, 6, 2, 80);
        assert_eq!(28, find_biggest_subnet(start_ip, 16, Ipv4Addr::new(10, 6, 8, 0)));
    }

    #[test]
    fn test_reference_address_plan() {
        let topology = Topology::reference(&Settings::default()).unwrap();
        let rows = address_plan(&topology, 16);
        let summary: Vec<String> = rows
            .iter()
            .map(|r| format!("{} {}", r.kind, r.cidr))
            .collect();
        assert_eq!(
            summary,
            vec![
                "-gap- 10.0.0.0/24",
                "primary 10.0.1.0/24",
                "primary 10.0.2.0/24",
                "primary 10.0.3.0/24",
                "-gap- 10.0.4.0/22",
                "-gap- 10.0.8.0/21",
                "-gap- 10.0.16.0/20",
                "-gap- 10.0.32.0/19",
                "-gap- 10.0.64.0/18",
                "-gap- 10.0.128.0/17",
                "secondary 10.1.0.0/16",
                "secondary 10.2.0.0/16",
            ]
        );
        assert_eq!(rows[1].hosts, 252);
        assert!(!rows[1].nat);
        assert!(rows[2].nat);
        assert_eq!(rows[10].subnet_name, "prod-private-subnet/pods");
        assert_eq!(rows[10].j, 4);
    }

    #[test]
    fn test_gap_mask_limits_block_size() {
        let topology = Topology::reference(&Settings::default()).unwrap();
        let rows = address_plan(&topology, 24);
        let gaps = rows.iter().filter(|r| r.kind == "-gap-").count();
        // 10.0.0.0/24 plus 10.0.4.0 .. 10.0.255.0
        assert_eq!(gaps, 1 + 252);
        assert!(rows
            .iter()
            .filter(|r| r.kind == "-gap-")
            .all(|r| r.cidr.mask == 24));
    }
}
