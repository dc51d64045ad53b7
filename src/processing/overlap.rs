//! Overlapping CIDR detection across subnet ranges.
//!
//! Every primary and secondary range of every subnet is compared with every
//! other one; no two may share an address.

use crate::models::{Ipv4, Topology};
use itertools::Itertools;

/// A named range taking part in the overlap check.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeInfo {
    /// `<subnet>` for primary ranges, `<subnet>/<range_name>` for secondary ones.
    pub name: String,
    pub cidr: Ipv4,
}

/// Two ranges that share addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapConflict {
    pub first: RangeInfo,
    pub second: RangeInfo,
}

/// Collect every range of the topology, sorted by CIDR.
pub fn collect_ranges(topology: &Topology) -> Vec<RangeInfo> {
    topology
        .all_ranges()
        .into_iter()
        .map(|(name, cidr)| RangeInfo { name, cidr })
        .sorted_by_key(|r| (r.cidr.lo(), r.cidr.mask))
        .collect()
}

/// Find every pair of overlapping ranges.
///
/// # Returns
/// A list of conflicts, ordered by the lower range of each pair
pub fn find_overlapping_ranges(ranges: &[RangeInfo]) -> Vec<OverlapConflict> {
    ranges
        .iter()
        .tuple_combinations()
        .filter(|(a, b)| a.cidr.overlaps(&b.cidr))
        .map(|(a, b)| OverlapConflict {
            first: a.clone(),
            second: b.clone(),
        })
        .collect()
}

/// Ranges whose address carries host bits, e.g. `10.0.2.7/24`.
pub fn find_non_canonical_ranges(ranges: &[RangeInfo]) -> Vec<&RangeInfo> {
    ranges.iter().filter(|r| !r.cidr.is_canonical()).collect()
}

/// Log overlapping range conflicts as warnings.
pub fn log_overlapping_ranges(conflicts: &[OverlapConflict]) {
    if conflicts.is_empty() {
        log::info!("No overlapping subnet CIDRs found.");
        return;
    }

    log::warn!("Found {} overlapping subnet CIDR pair(s):", conflicts.len());
    for conflict in conflicts {
        log::warn!(
            "  - '{}' {} overlaps '{}' {}",
            conflict.first.name,
            conflict.first.cidr,
            conflict.second.name,
            conflict.second.cidr
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn range(name: &str, cidr: &str) -> RangeInfo {
        RangeInfo {
            name: name.to_string(),
            cidr: Ipv4::new(cidr).unwrap(),
        }
    }

    #[test]
    fn test_reference_has_no_overlaps() {
        let topology = Topology::reference(&Settings::default()).unwrap();
        let ranges = collect_ranges(&topology);
        assert_eq!(ranges.len(), 5);
        assert_eq!(ranges[0].cidr.to_string(), "10.0.1.0/24");
        assert_eq!(ranges[4].cidr.to_string(), "10.2.0.0/16");
        assert!(find_overlapping_ranges(&ranges).is_empty());
        assert!(find_non_canonical_ranges(&ranges).is_empty());
    }

    #[test]
    fn test_secondary_overlapping_primary() {
        let ranges = vec![
            range("private", "10.0.2.0/24"),
            range("data", "10.0.3.0/24"),
            range("private/pods", "10.0.0.0/16"),
        ];
        let conflicts = find_overlapping_ranges(&ranges);
        assert_eq!(conflicts.len(), 2);
        assert!(conflicts.iter().all(|c| c.second.name == "private/pods"));
        log_overlapping_ranges(&conflicts);
    }

    #[test]
    fn test_identical_ranges_overlap() {
        let ranges = vec![range("a", "10.0.2.0/24"), range("b", "10.0.2.0/24")];
        assert_eq!(find_overlapping_ranges(&ranges).len(), 1);
    }

    #[test]
    fn test_non_canonical() {
        let ranges = vec![range("a", "10.0.2.7/24"), range("b", "10.0.3.0/24")];
        let bad = find_non_canonical_ranges(&ranges);
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].name, "a");
    }
}
