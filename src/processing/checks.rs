//! Policy checks over the declared topology.
//!
//! Each check inspects the declaration and reports [`Finding`]s. Errors mean
//! the declaration breaks an invariant of the topology; warnings flag
//! something a reviewer should look at.

use super::graph::DependencyGraph;
use super::overlap::{
    collect_ranges, find_non_canonical_ranges, find_overlapping_ranges, log_overlapping_ranges,
};
use crate::config::{self, DENY_ALL_PRIORITY};
use crate::models::{
    Direction, FirewallRule, Protocol, ResourceKind, RuleAction, Topology,
};
use itertools::Itertools;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

/// Regex every cloud-side resource name must match.
static NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_name_regex() -> &'static Regex {
    NAME_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z]([-a-z0-9]{0,61}[a-z0-9])?$").expect("Invalid Regex")
    })
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckId {
    CidrOverlap,
    NatCoverage,
    FirewallPriority,
    SshExposure,
    References,
    Naming,
    FlowLogs,
}

impl CheckId {
    pub const ALL: [CheckId; 7] = [
        CheckId::CidrOverlap,
        CheckId::NatCoverage,
        CheckId::FirewallPriority,
        CheckId::SshExposure,
        CheckId::References,
        CheckId::Naming,
        CheckId::FlowLogs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CheckId::CidrOverlap => "cidr-overlap",
            CheckId::NatCoverage => "nat-coverage",
            CheckId::FirewallPriority => "firewall-priority",
            CheckId::SshExposure => "ssh-exposure",
            CheckId::References => "references",
            CheckId::Naming => "naming",
            CheckId::FlowLogs => "flow-logs",
        }
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub check: CheckId,
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    fn error(check: CheckId, message: String) -> Finding {
        Finding {
            check,
            severity: Severity::Error,
            message,
        }
    }

    fn warning(check: CheckId, message: String) -> Finding {
        Finding {
            check,
            severity: Severity::Warning,
            message,
        }
    }
}

/// Outcome of [`run_checks`].
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub findings: Vec<Finding>,
}

impl CheckReport {
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn passed(&self, check: CheckId) -> bool {
        !self
            .findings
            .iter()
            .any(|f| f.check == check && f.severity == Severity::Error)
    }

    pub fn for_check(&self, check: CheckId) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.check == check).collect()
    }
}

/// Run every check against `topology`.
pub fn run_checks(topology: &Topology) -> CheckReport {
    let mut findings = Vec::new();
    findings.extend(check_cidr_overlap(topology));
    findings.extend(check_nat_coverage(topology));
    findings.extend(check_firewall_priority(topology));
    findings.extend(check_ssh_exposure(topology));
    findings.extend(check_references(topology));
    findings.extend(check_naming(topology));
    findings.extend(check_flow_logs(topology));

    let report = CheckReport { findings };
    log::info!(
        "checks done: {} error(s), {} warning(s)",
        report.errors().count(),
        report.warnings().count()
    );
    report
}

/// Ranges never overlap, carry no host bits, and primary ranges lie in the address space.
pub fn check_cidr_overlap(topology: &Topology) -> Vec<Finding> {
    let ranges = collect_ranges(topology);
    let conflicts = find_overlapping_ranges(&ranges);
    log_overlapping_ranges(&conflicts);
    let mut findings: Vec<Finding> = conflicts
        .into_iter()
        .map(|c| {
            Finding::error(
                CheckId::CidrOverlap,
                format!(
                    "'{}' {} overlaps '{}' {}",
                    c.first.name, c.first.cidr, c.second.name, c.second.cidr
                ),
            )
        })
        .collect();

    findings.extend(find_non_canonical_ranges(&ranges).into_iter().map(|r| {
        Finding::error(
            CheckId::CidrOverlap,
            format!(
                "'{}' {} has host bits set, expected {}/{}",
                r.name,
                r.cidr,
                r.cidr.lo(),
                r.cidr.mask
            ),
        )
    }));

    let space = topology.network.address_space;
    findings.extend(
        topology
            .subnets
            .iter()
            .filter(|s| !space.contains_block(&s.ip_cidr_range))
            .map(|s| {
                Finding::warning(
                    CheckId::CidrOverlap,
                    format!(
                        "subnet '{}' {} is outside the network address space {}",
                        s.name, s.ip_cidr_range, space
                    ),
                )
            }),
    );
    findings
}

/// The NAT gateway lists exactly the subnets of NATed tiers, never a public one.
pub fn check_nat_coverage(topology: &Topology) -> Vec<Finding> {
    let mut findings = Vec::new();
    let nat = &topology.nat;

    let listed: BTreeSet<&str> = nat.subnetwork.iter().map(|s| s.name.as_str()).collect();
    if listed.len() != nat.subnetwork.len() {
        findings.push(Finding::error(
            CheckId::NatCoverage,
            format!("NAT '{}' lists a subnet more than once", nat.name),
        ));
    }

    for subnet in &topology.subnets {
        let covered = nat.covers(&subnet.label);
        match (subnet.tier.uses_nat(), covered) {
            (false, true) => findings.push(Finding::error(
                CheckId::NatCoverage,
                format!(
                    "NAT '{}' translates for {} subnet '{}'",
                    nat.name, subnet.tier, subnet.name
                ),
            )),
            (true, false) => findings.push(Finding::error(
                CheckId::NatCoverage,
                format!(
                    "{} subnet '{}' has no NAT egress",
                    subnet.tier, subnet.name
                ),
            )),
            _ => {}
        }
    }

    for label in listed.iter().filter(|l| topology.subnet(l).is_none()) {
        findings.push(Finding::error(
            CheckId::NatCoverage,
            format!("NAT '{}' lists undeclared subnet '{label}'", nat.name),
        ));
    }
    findings
}

/// The deny-all ingress rule is the lowest-precedence declared ingress rule, and
/// no two rules at the same priority decide the same traffic differently.
pub fn check_firewall_priority(topology: &Topology) -> Vec<Finding> {
    let mut findings = Vec::new();
    let ingress = topology.ingress_rules();

    let deny_all: Vec<&FirewallRule> = ingress.iter().copied().filter(|r| is_deny_all(r)).collect();
    if deny_all.len() > 1 {
        findings.push(Finding::warning(
            CheckId::FirewallPriority,
            format!("{} deny-all ingress rules declared", deny_all.len()),
        ));
    }
    // the earliest deny-all decides everything evaluated after it
    match deny_all.iter().min_by_key(|r| r.effective_priority()) {
        None => findings.push(Finding::error(
            CheckId::FirewallPriority,
            "no deny-all ingress rule declared".to_string(),
        )),
        Some(rule) => {
            if rule.effective_priority() != DENY_ALL_PRIORITY {
                findings.push(Finding::warning(
                    CheckId::FirewallPriority,
                    format!(
                        "deny-all rule '{}' has priority {}, expected {}",
                        rule.name,
                        rule.effective_priority(),
                        DENY_ALL_PRIORITY
                    ),
                ));
            }
            let shadowed = ingress
                .iter()
                .filter(|r| !is_deny_all(r))
                .filter(|r| r.effective_priority() >= rule.effective_priority());
            for other in shadowed {
                findings.push(Finding::error(
                    CheckId::FirewallPriority,
                    format!(
                        "rule '{}' priority {} is not above deny-all '{}' priority {}",
                        other.name,
                        other.effective_priority(),
                        rule.name,
                        rule.effective_priority()
                    ),
                ));
            }
        }
    }

    for rule in &topology.firewall_rules {
        if let Some(priority) = rule.priority {
            if u32::from(priority) >= config::IMPLIED_RULE_PRIORITY {
                findings.push(Finding::error(
                    CheckId::FirewallPriority,
                    format!(
                        "rule '{}' priority {priority} collides with the implied rules",
                        rule.name
                    ),
                ));
            }
        }
    }

    for (a, b) in topology.firewall_rules.iter().tuple_combinations() {
        if a.effective_priority() == b.effective_priority()
            && a.action != b.action
            && rules_intersect(a, b)
        {
            findings.push(Finding::error(
                CheckId::FirewallPriority,
                format!(
                    "rules '{}' and '{}' share priority {} but decide overlapping traffic differently",
                    a.name,
                    b.name,
                    a.effective_priority()
                ),
            ));
        }
    }
    findings
}

/// Only the bastion rule opens tcp/22 to the internet, and only for tag `bastion`.
pub fn check_ssh_exposure(topology: &Topology) -> Vec<Finding> {
    let mut findings = Vec::new();
    let open: Vec<&FirewallRule> = topology
        .firewall_rules
        .iter()
        .filter(|r| r.opens_to_world(Protocol::Tcp, config::SSH_PORT))
        .collect();

    for rule in &open {
        if rule.target_tags != [config::BASTION_TAG] {
            let targets = if rule.target_tags.is_empty() {
                "every instance".to_string()
            } else {
                format!("tags {:?}", rule.target_tags)
            };
            findings.push(Finding::error(
                CheckId::SshExposure,
                format!(
                    "rule '{}' opens tcp/{} from 0.0.0.0/0 to {targets}",
                    rule.name,
                    config::SSH_PORT
                ),
            ));
        }
    }
    if open.is_empty() {
        findings.push(Finding::warning(
            CheckId::SshExposure,
            "no rule admits SSH to the bastion hosts".to_string(),
        ));
    }
    findings
}

/// Every reference resolves and the dependency graph is acyclic.
pub fn check_references(topology: &Topology) -> Vec<Finding> {
    let result = DependencyGraph::build(topology).and_then(|g| g.apply_order());
    match result {
        Ok(_) => vec![],
        Err(e) => vec![Finding::error(CheckId::References, e.to_string())],
    }
}

/// Cloud-side names are valid and unique per resource type.
pub fn check_naming(topology: &Topology) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut seen: BTreeSet<(ResourceKind, &str)> = BTreeSet::new();
    for resource in topology.resources() {
        let kind = resource.address().kind;
        let name = resource.name();
        if !get_name_regex().is_match(name) {
            findings.push(Finding::error(
                CheckId::Naming,
                format!("{kind} name '{name}' is not a valid resource name"),
            ));
        }
        if !seen.insert((kind, name)) {
            findings.push(Finding::error(
                CheckId::Naming,
                format!("{kind} name '{name}' is used more than once"),
            ));
        }
    }
    findings
}

/// Every subnet samples flows for auditing.
pub fn check_flow_logs(topology: &Topology) -> Vec<Finding> {
    topology
        .subnets
        .iter()
        .filter_map(|s| match &s.log_config {
            None => Some(Finding::warning(
                CheckId::FlowLogs,
                format!("subnet '{}' has flow logs disabled", s.name),
            )),
            Some(log) if !(log.flow_sampling > 0.0 && log.flow_sampling <= 1.0) => {
                Some(Finding::error(
                    CheckId::FlowLogs,
                    format!(
                        "subnet '{}' flow sampling {} is outside (0, 1]",
                        s.name, log.flow_sampling
                    ),
                ))
            }
            Some(_) => None,
        })
        .collect()
}

fn is_deny_all(rule: &FirewallRule) -> bool {
    rule.direction == Direction::Ingress
        && rule.action == RuleAction::Deny
        && rule.target_tags.is_empty()
        && rule.admits_any_source()
        && rule
            .rules
            .iter()
            .any(|m| m.protocol == Protocol::All && m.ports.is_empty())
}

/// Whether some packet could be matched by both rules.
fn rules_intersect(a: &FirewallRule, b: &FirewallRule) -> bool {
    if a.direction != b.direction {
        return false;
    }
    let protocols = a
        .rules
        .iter()
        .any(|x| b.rules.iter().any(|y| x.intersects(y)));
    let targets = a.target_tags.is_empty()
        || b.target_tags.is_empty()
        || a.target_tags.iter().any(|t| b.target_tags.contains(t));
    let sources = match a.direction {
        Direction::Ingress => {
            // a tagged instance may hold an address inside the other rule's ranges
            let range_meets_tag = (!a.source_ranges.is_empty() && !b.source_tags.is_empty())
                || (!a.source_tags.is_empty() && !b.source_ranges.is_empty());
            a.has_no_sources()
                || b.has_no_sources()
                || range_meets_tag
                || a.source_ranges
                    .iter()
                    .any(|x| b.source_ranges.iter().any(|y| x.overlaps(y)))
                || a.source_tags.iter().any(|t| b.source_tags.contains(t))
        }
        Direction::Egress => {
            a.destination_ranges.is_empty()
                || b.destination_ranges.is_empty()
                || a.destination_ranges
                    .iter()
                    .any(|x| b.destination_ranges.iter().any(|y| x.overlaps(y)))
        }
    };
    protocols && targets && sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::models::{Ipv4, NatSubnetwork, ProtocolMatch, SourceIpRanges};

    fn reference() -> Topology {
        Topology::reference(&Settings::new("acme-net", "us-central1", "prod"))
            .expect("reference topology")
    }

    fn rule_mut<'a>(topology: &'a mut Topology, label: &str) -> &'a mut FirewallRule {
        topology
            .firewall_rules
            .iter_mut()
            .find(|r| r.label == label)
            .unwrap()
    }

    #[test]
    fn test_reference_passes_every_check() {
        let report = run_checks(&reference());
        assert!(report.findings.is_empty(), "{:?}", report.findings);
        for check in CheckId::ALL {
            assert!(report.passed(check), "{check} failed");
        }
    }

    #[test]
    fn test_secondary_range_overlap_detected() {
        let mut topology = reference();
        topology.subnets[1].secondary_ip_range[1].ip_cidr_range = Ipv4::new("10.1.128.0/20").unwrap();
        let report = run_checks(&topology);
        assert!(!report.passed(CheckId::CidrOverlap));
        let findings = report.for_check(CheckId::CidrOverlap);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("prod-private-subnet/pods"));
    }

    #[test]
    fn test_subnet_outside_address_space_warns() {
        let mut topology = reference();
        topology.subnets[0].ip_cidr_range = Ipv4::new("172.16.1.0/24").unwrap();
        let report = run_checks(&topology);
        assert!(report.passed(CheckId::CidrOverlap));
        assert_eq!(report.for_check(CheckId::CidrOverlap)[0].severity, Severity::Warning);
    }

    #[test]
    fn test_public_subnet_in_nat_is_error() {
        let mut topology = reference();
        topology.nat.subnetwork.push(NatSubnetwork {
            name: "public".to_string(),
            source_ip_ranges_to_nat: vec![SourceIpRanges::AllIpRanges],
        });
        let report = run_checks(&topology);
        assert!(!report.passed(CheckId::NatCoverage));
        assert!(report.for_check(CheckId::NatCoverage)[0]
            .message
            .contains("public subnet 'prod-public-subnet'"));
    }

    #[test]
    fn test_data_subnet_missing_from_nat_is_error() {
        let mut topology = reference();
        topology.nat.subnetwork.retain(|s| s.name != "data");
        let findings = check_nat_coverage(&topology);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("has no NAT egress"));
    }

    #[test]
    fn test_nat_undeclared_subnet() {
        let mut topology = reference();
        topology.nat.subnetwork[1].name = "analytics".to_string();
        let report = run_checks(&topology);
        assert!(!report.passed(CheckId::NatCoverage));
        assert!(!report.passed(CheckId::References));
    }

    #[test]
    fn test_rule_below_deny_all_is_error() {
        let mut topology = reference();
        rule_mut(&mut topology, "allow_http_https").priority = Some(65534);
        let findings = check_firewall_priority(&topology);
        assert!(findings
            .iter()
            .any(|f| f.message.contains("prod-allow-http-https")
                && f.message.contains("not above deny-all")));
    }

    #[test]
    fn test_early_second_deny_all_is_error() {
        let mut topology = reference();
        let mut early = rule_mut(&mut topology, "deny_all_ingress").clone();
        early.label = "deny_all_early".to_string();
        early.name = "prod-deny-all-early".to_string();
        early.priority = Some(500);
        topology.firewall_rules.push(early);

        let report = run_checks(&topology);
        assert!(!report.passed(CheckId::FirewallPriority));
        let findings = report.for_check(CheckId::FirewallPriority);
        assert!(findings
            .iter()
            .any(|f| f.message == "2 deny-all ingress rules declared"));
        // all four allow rules sit behind the priority 500 deny-all
        let shadowed = findings
            .iter()
            .filter(|f| f.message.contains("not above deny-all 'prod-deny-all-early'"))
            .count();
        assert_eq!(shadowed, 4);
    }

    #[test]
    fn test_missing_deny_all_is_error() {
        let mut topology = reference();
        topology.firewall_rules.retain(|r| r.label != "deny_all_ingress");
        let findings = check_firewall_priority(&topology);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].message, "no deny-all ingress rule declared");
    }

    #[test]
    fn test_conflicting_equal_priority_rules() {
        let mut topology = reference();
        let mut deny_ssh = rule_mut(&mut topology, "allow_ssh_bastion").clone();
        deny_ssh.label = "deny_ssh_scanners".to_string();
        deny_ssh.name = "prod-deny-ssh-scanners".to_string();
        deny_ssh.action = RuleAction::Deny;
        deny_ssh.source_ranges = vec![Ipv4::new("203.0.113.0/24").unwrap()];
        topology.firewall_rules.push(deny_ssh);

        let findings = check_firewall_priority(&topology);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("share priority 1000"));
        assert!(findings[0].message.contains("prod-allow-ssh-bastion"));

        // distinct ports do not conflict
        rule_mut(&mut topology, "deny_ssh_scanners").rules =
            vec![ProtocolMatch::ports(Protocol::Tcp, &[8443])];
        assert!(check_firewall_priority(&topology).is_empty());
    }

    #[test]
    fn test_range_and_tag_sources_can_conflict() {
        let mut topology = reference();
        let mut deny_from_jump = rule_mut(&mut topology, "allow_ssh_bastion").clone();
        deny_from_jump.label = "deny_ssh_from_jump".to_string();
        deny_from_jump.name = "prod-deny-ssh-from-jump".to_string();
        deny_from_jump.action = RuleAction::Deny;
        deny_from_jump.source_ranges.clear();
        deny_from_jump.source_tags = vec!["jump".to_string()];
        topology.firewall_rules.push(deny_from_jump);

        // tagged sources may sit in the ranges of the internal, bastion and health-check rules
        let findings = check_firewall_priority(&topology);
        assert_eq!(findings.len(), 3, "{findings:?}");
        assert!(findings
            .iter()
            .all(|f| f.message.contains("prod-deny-ssh-from-jump")));
        assert!(findings
            .iter()
            .any(|f| f.message.contains("prod-allow-ssh-bastion")));
    }

    #[test]
    fn test_ssh_open_through_split_ranges() {
        let mut topology = reference();
        let mut allow_all = rule_mut(&mut topology, "allow_ssh_bastion").clone();
        allow_all.label = "allow_ssh_all".to_string();
        allow_all.name = "prod-allow-ssh-all".to_string();
        allow_all.source_ranges = vec![
            Ipv4::new("0.0.0.0/1").unwrap(),
            Ipv4::new("128.0.0.0/1").unwrap(),
        ];
        allow_all.target_tags.clear();
        topology.firewall_rules.push(allow_all);

        let report = run_checks(&topology);
        assert!(!report.passed(CheckId::SshExposure));
        let findings = report.for_check(CheckId::SshExposure);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("prod-allow-ssh-all"));
    }

    #[test]
    fn test_ssh_rule_without_sources_is_open() {
        let mut topology = reference();
        rule_mut(&mut topology, "allow_http_https").rules =
            vec![ProtocolMatch::ports(Protocol::Tcp, &[22])];
        rule_mut(&mut topology, "allow_http_https").source_ranges.clear();
        let findings = check_ssh_exposure(&topology);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("prod-allow-http-https"));
    }

    #[test]
    fn test_ssh_open_to_all_instances() {
        let mut topology = reference();
        rule_mut(&mut topology, "allow_ssh_bastion").target_tags.clear();
        let findings = check_ssh_exposure(&topology);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("every instance"));
    }

    #[test]
    fn test_second_rule_opening_ssh() {
        let mut topology = reference();
        rule_mut(&mut topology, "allow_http_https").rules =
            vec![ProtocolMatch::ports(Protocol::Tcp, &[22, 80, 443])];
        let findings = check_ssh_exposure(&topology);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("prod-allow-http-https"));
    }

    #[test]
    fn test_bastion_rule_with_extra_tag() {
        let mut topology = reference();
        rule_mut(&mut topology, "allow_ssh_bastion")
            .target_tags
            .push("web".to_string());
        assert!(!check_ssh_exposure(&topology).is_empty());
    }

    #[test]
    fn test_naming() {
        let mut topology = reference();
        topology.subnets[0].name = "Public_Subnet".to_string();
        topology.subnets[2].name = topology.subnets[1].name.clone();
        let findings = check_naming(&topology);
        assert_eq!(findings.len(), 2);
        assert!(findings[0].message.contains("not a valid resource name"));
        assert!(findings[1].message.contains("used more than once"));
    }

    #[test]
    fn test_flow_logs() {
        let mut topology = reference();
        topology.subnets[0].log_config = None;
        if let Some(log) = topology.subnets[1].log_config.as_mut() {
            log.flow_sampling = 1.5;
        }
        let findings = check_flow_logs(&topology);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[1].severity, Severity::Error);
    }
}
