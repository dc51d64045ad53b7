//! Topology processing logic.
//!
//! This module contains the business logic run over a declared topology:
//! - [`graph`] - Dependency graph, apply and destroy order
//! - [`plan`] - Reconciliation plan against recorded state
//! - [`firewall_eval`] - Which rule decides a packet
//! - [`checks`] - Policy checks over the declaration
//! - [`overlap`] - Overlapping range detection
//! - [`gap_finder`] - Finding gaps between subnets

mod checks;
mod firewall_eval;
mod gap_finder;
mod graph;
mod overlap;
mod plan;

// Re-export public functions
pub use checks::{
    check_cidr_overlap, check_firewall_priority, check_flow_logs, check_naming,
    check_nat_coverage, check_references, check_ssh_exposure, run_checks, CheckId, CheckReport,
    Finding, Severity,
};
pub use firewall_eval::{evaluate, evaluation_order, Verdict};
pub use gap_finder::{address_plan, AddressPlanRow};
pub use graph::DependencyGraph;
pub use overlap::{
    collect_ranges, find_non_canonical_ranges, find_overlapping_ranges, log_overlapping_ranges,
    OverlapConflict, RangeInfo,
};
pub use plan::{apply, is_force_new, plan, Action, AttributeChange, Plan, PlanSummary, ResourceChange};
