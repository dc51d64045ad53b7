//! Firewall evaluation: lowest priority number first, first match wins.
//!
//! At equal priority a deny rule wins over an allow rule. Traffic no
//! declared rule matches falls to the provider's implied rules: deny for
//! ingress, allow for egress.

use crate::config::IMPLIED_RULE_PRIORITY;
use crate::models::{Direction, FirewallRule, Packet, RuleAction};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// A declared rule matched.
    Rule {
        label: String,
        action: RuleAction,
        priority: u16,
    },
    /// Nothing matched, the implied rule for the direction applies.
    Implied { action: RuleAction },
}

impl Verdict {
    pub fn action(&self) -> RuleAction {
        match self {
            Verdict::Rule { action, .. } | Verdict::Implied { action } => *action,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.action() == RuleAction::Allow
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Rule {
                label,
                action,
                priority,
            } => write!(f, "{action:?} by {label} (priority {priority})"),
            Verdict::Implied { action } => {
                write!(f, "{action:?} by implied rule (priority {IMPLIED_RULE_PRIORITY})")
            }
        }
    }
}

/// Rules of one direction in evaluation order.
pub fn evaluation_order(rules: &[FirewallRule], direction: Direction) -> Vec<&FirewallRule> {
    let mut ordered: Vec<&FirewallRule> =
        rules.iter().filter(|r| r.direction == direction).collect();
    // stable sort, deny before allow on ties
    ordered.sort_by_key(|r| (r.effective_priority(), r.action != RuleAction::Deny));
    ordered
}

pub fn evaluate(rules: &[FirewallRule], packet: &Packet) -> Verdict {
    let verdict = evaluation_order(rules, packet.direction)
        .into_iter()
        .find(|r| r.matches(packet))
        .map(|r| Verdict::Rule {
            label: r.label.clone(),
            action: r.action,
            priority: r.effective_priority(),
        })
        .unwrap_or(Verdict::Implied {
            action: match packet.direction {
                Direction::Ingress => RuleAction::Deny,
                Direction::Egress => RuleAction::Allow,
            },
        });
    log::debug!(
        "{:?} {} port={:?} from {} -> {verdict}",
        packet.direction,
        packet.protocol,
        packet.port,
        packet.source
    );
    verdict
}
