//! CSV output formatting for the address plan.

use crate::models::Topology;
use crate::processing::{address_plan, AddressPlanRow};
use colored::Colorize;
use std::error::Error;

use super::terminal::format_field;

/// CSV header matching [`csv_row`].
pub const CSV_HEADER: &str = r#" "cnt",     "kind",     "subnet_cidr",   "hosts",          "broadcast",             "subnet_name",   "tier",         "region",   "nat""#;

/// Print the address plan as CSV to stdout.
///
/// # Arguments
/// * `topology` - The declared topology
/// * `gap_cidr_mask` - The largest block reported for one gap row
pub fn print_address_plan(topology: &Topology, gap_cidr_mask: u8) -> Result<(), Box<dyn Error>> {
    log::info!(
        "#Start print_address_plan() add gap subnets with mask /{}",
        gap_cidr_mask
    );
    let rows = address_plan(topology, gap_cidr_mask);
    log::info!("# Got subnet count = {}", topology.subnets.len());

    println!("{CSV_HEADER}");
    for row in &rows {
        println!("{}", csv_row(row));
    }

    let outside: Vec<&str> = topology
        .subnets
        .iter()
        .filter(|s| !topology.network.address_space.contains_block(&s.ip_cidr_range))
        .map(|s| s.name.as_str())
        .collect();
    if !outside.is_empty() {
        println!(
            "#{}# Skipped subnets outside {}: {}",
            "NOTE".on_red(),
            topology.network.address_space,
            outside.join(", ")
        );
    }
    Ok(())
}

/// Format a single CSV row.
pub fn csv_row(row: &AddressPlanRow) -> String {
    format!(
        r#"{j},{kind},{subnet_cidr},{hosts},{broadcast},{subnet_name},{tier},{region},{nat}"#,
        j = format_field(row.j, 6),
        kind = format_field(&row.kind, 11),
        subnet_cidr = format_field(row.cidr, 18),
        hosts = format_field(format!("{}_hosts", row.hosts), 16),
        broadcast = format_field(format!("{}_br", row.broadcast), 19),
        subnet_name = format_field(&row.subnet_name, 34),
        tier = format_field(&row.tier, 9),
        region = format_field(&row.region, 16),
        nat = format_field(if row.nat { "nat" } else { "-" }, 6),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn test_csv_rows_for_reference() {
        let topology = Topology::reference(&Settings::default()).unwrap();
        let rows = address_plan(&topology, 16);

        let gap = csv_row(&rows[0]);
        assert_eq!(
            gap,
            r#"   "0",    "-gap-",     "10.0.0.0/24",     "252_hosts",    "10.0.0.255_br",                            "None",   "None",          "None",   "-""#
        );

        let private = csv_row(&rows[2]);
        assert!(private.contains(r#""prod-private-subnet""#));
        assert!(private.contains(r#""10.0.2.255_br""#));
        assert!(private.ends_with(r#""nat""#));

        let pods = csv_row(&rows[10]);
        assert!(pods.contains(r#""secondary""#));
        assert!(pods.contains(r#""0_hosts""#));
    }

    #[test]
    fn test_print_address_plan() {
        let topology = Topology::reference(&Settings::default()).unwrap();
        print_address_plan(&topology, 20).expect("Error printing address plan");
    }
}
