//! Terminal output utilities.
//!
//! Provides formatting helpers and the coloured reports printed by the CLI.

use crate::models::ResourceAddress;
use crate::processing::{Action, CheckId, CheckReport, Plan, Severity, Verdict};
use colored::Colorize;

/// Format a value as a quoted, right-aligned field.
///
/// # Arguments
/// * `value` - The value to format
/// * `width` - The minimum width of the field
///
/// # Returns
/// A quoted, right-aligned string
pub fn format_field<T: ToString>(value: T, width: usize) -> String {
    let value_str = value.to_string();
    let quoted = format!("\"{value_str}\"");
    let quoted_len = quoted.len();

    if quoted_len >= width {
        quoted
    } else {
        format!("{quoted:>width$}")
    }
}

/// One line per check, followed by its findings.
pub fn format_check_report(report: &CheckReport) -> Vec<String> {
    let mut lines = Vec::new();
    for check in CheckId::ALL {
        let status = if report.passed(check) {
            "PASS".green()
        } else {
            "FAIL".red()
        };
        lines.push(format!("[{status}] {check}"));
        for finding in report.for_check(check) {
            let severity = match finding.severity {
                Severity::Error => "error".red(),
                Severity::Warning => "warning".yellow(),
            };
            lines.push(format!("    {severity}: {}", finding.message));
        }
    }
    lines.push(format!(
        "{} error(s), {} warning(s)",
        report.errors().count(),
        report.warnings().count()
    ));
    lines
}

/// Plan lines in the provisioning engine's notation, then the summary.
pub fn format_plan(plan: &Plan) -> Vec<String> {
    if plan.is_empty() {
        return vec!["No changes. Infrastructure matches the declaration.".green().to_string()];
    }
    let mut lines = Vec::new();
    for change in &plan.changes {
        let symbol = change.action.to_string();
        let symbol = match change.action {
            Action::Create => symbol.green(),
            Action::Update => symbol.yellow(),
            Action::Replace => symbol.magenta(),
            Action::Delete => symbol.red(),
        };
        let suffix = match change.action {
            Action::Replace => " (forces replacement)",
            _ => "",
        };
        lines.push(format!("  {symbol} {}{suffix}", change.address));
        for attribute in &change.attributes {
            let before = attribute
                .before
                .as_ref()
                .map_or("null".to_string(), |v| v.to_string());
            let after = attribute
                .after
                .as_ref()
                .map_or("null".to_string(), |v| v.to_string());
            let marker = if attribute.force_new {
                " # forces replacement".red().to_string()
            } else {
                String::new()
            };
            lines.push(format!(
                "      {}: {before} -> {after}{marker}",
                attribute.name
            ));
        }
    }
    let destroy = plan.destroy_order();
    if !destroy.is_empty() {
        lines.push("Destroy order:".to_string());
        for (i, address) in destroy.iter().enumerate() {
            lines.push(format!("  {:>2}. {address}", i + 1));
        }
    }
    lines.push(plan.summary().to_string().bold().to_string());
    lines
}

/// Apply waves, one line per resource.
pub fn format_order(waves: &[Vec<ResourceAddress>]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut step = 0;
    for (i, wave) in waves.iter().enumerate() {
        lines.push(format!("wave {}:", i + 1).bold().to_string());
        for address in wave {
            step += 1;
            lines.push(format!("  {step:>3} {address}"));
        }
    }
    lines
}

pub fn format_verdict(verdict: &Verdict) -> String {
    let text = verdict.to_string();
    if verdict.is_allowed() {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::models::{ResourceKind, RuleAction, Topology};
    use crate::processing::{apply, plan, run_checks, DependencyGraph};
    use crate::store::State;

    #[test]
    fn test_format_field_short() {
        assert_eq!(format_field("test", 10), "    \"test\"");
    }

    #[test]
    fn test_format_field_exact() {
        assert_eq!(format_field("test", 6), "\"test\"");
    }

    #[test]
    fn test_format_field_long() {
        assert_eq!(format_field("long_value", 5), "\"long_value\"");
    }

    #[test]
    fn test_format_field_number() {
        assert_eq!(format_field(42, 6), "  \"42\"");
    }

    #[test]
    fn test_check_report_lists_every_check() {
        let topology = Topology::reference(&Settings::default()).unwrap();
        let lines = format_check_report(&run_checks(&topology));
        assert_eq!(lines.len(), CheckId::ALL.len() + 1);
        assert!(lines[0].contains("cidr-overlap"));
        assert!(lines.last().unwrap().starts_with("0 error(s)"));
    }

    #[test]
    fn test_plan_lines() {
        let topology = Topology::reference(&Settings::default()).unwrap();
        let initial = plan(&topology, &State::default()).unwrap();
        let lines = format_plan(&initial);
        assert_eq!(lines.len(), 12);
        assert!(lines[0].contains("google_compute_network.vpc"));
        assert!(lines[11].contains("Plan: 11 to add, 0 to change, 0 to destroy."));
    }

    #[test]
    fn test_plan_lines_list_destroy_order() {
        let topology = Topology::reference(&Settings::default()).unwrap();
        let state = apply(&plan(&topology, &State::default()).unwrap(), State::default());
        let mut changed = topology.clone();
        changed.subnets[2].ip_cidr_range = "10.0.4.0/24".parse().unwrap();

        let lines = format_plan(&plan(&changed, &state).unwrap());
        let start = lines.iter().position(|l| l == "Destroy order:").unwrap();
        assert_eq!(lines.len(), start + 3);
        assert!(lines[start + 1].ends_with("google_compute_subnetwork.data"));
        assert!(lines[start + 2].contains("Plan: 1 to add, 1 to change, 1 to destroy."));
    }

    #[test]
    fn test_order_lines() {
        let topology = Topology::reference(&Settings::default()).unwrap();
        let waves = DependencyGraph::build(&topology).unwrap().waves().unwrap();
        let lines = format_order(&waves);
        // 3 wave headers + 11 resources
        assert_eq!(lines.len(), 14);
        assert!(lines[1].ends_with(&ResourceAddress::new(ResourceKind::Network, "vpc").to_string()));
        assert!(lines[13].contains("google_compute_router_nat.nat"));
    }

    #[test]
    fn test_verdict_text() {
        let verdict = Verdict::Implied {
            action: RuleAction::Deny,
        };
        assert!(format_verdict(&verdict).contains("Deny by implied rule (priority 65535)"));
    }
}
