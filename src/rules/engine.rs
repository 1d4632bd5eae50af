//! Rule evaluation
//!
//! `evaluate(permission, candidate, ruleset)` resolves a candidate against
//! all rules in the domain. Matching precedence, most specific first:
//! exact literal, explicit trailing-wildcard prefix, implicit prefix, full
//! glob. Within a tier, any deny wins; otherwise the most recently merged
//! rule wins. When nothing matches, the domain's category default applies.

use std::collections::HashSet;

use super::pattern::MatchTier;
use super::ruleset::{RuleAction, Ruleset};

/// Per-domain default actions for candidates no rule matches
///
/// General tool domains default to allow; domains listed as locked default
/// to deny (system-locked agents).
#[derive(Debug, Clone, Default)]
pub struct DomainDefaults {
    locked: HashSet<String>,
}

impl DomainDefaults {
    /// Defaults with no locked domains (everything falls back to allow)
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a domain as locked: unmatched candidates are denied
    pub fn lock_domain(mut self, permission: impl Into<String>) -> Self {
        self.locked.insert(permission.into());
        self
    }

    /// The fallback action for a domain
    pub fn default_for(&self, permission: &str) -> RuleAction {
        if self.locked.contains(permission) {
            RuleAction::Deny
        } else {
            RuleAction::Allow
        }
    }
}

/// The result of evaluating one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// The resolved action
    pub action: RuleAction,
    /// The pattern of the winning rule, or `None` for a domain default
    pub matched_pattern: Option<String>,
}

/// Evaluate a candidate against a ruleset within one permission domain
pub fn evaluate(
    permission: &str,
    candidate: &str,
    ruleset: &Ruleset,
    defaults: &DomainDefaults,
) -> Evaluation {
    let mut best: Option<(MatchTier, u64, RuleAction, &str)> = None;
    let mut best_deny: Option<(MatchTier, &str)> = None;

    for rule in ruleset.rules_for(permission) {
        let tier = match rule.compiled.match_tier(candidate) {
            Some(tier) => tier,
            None => continue,
        };

        // Deny dominance is resolved per tier: track the most specific deny
        // separately so a user wildcard cannot shadow a security deny at the
        // same specificity.
        if rule.rule.action == RuleAction::Deny {
            match best_deny {
                Some((deny_tier, _)) if deny_tier <= tier => {}
                _ => best_deny = Some((tier, rule.rule.pattern.as_str())),
            }
        }

        let better = match best {
            None => true,
            Some((best_tier, best_seq, _, _)) => {
                tier < best_tier || (tier == best_tier && rule.seq > best_seq)
            }
        };
        if better {
            best = Some((tier, rule.seq, rule.rule.action, rule.rule.pattern.as_str()));
        }
    }

    match best {
        Some((tier, _, action, pattern)) => {
            // A deny at the winning tier overrides ask/allow from that tier
            if let Some((deny_tier, deny_pattern)) = best_deny {
                if deny_tier <= tier {
                    return Evaluation {
                        action: RuleAction::Deny,
                        matched_pattern: Some(deny_pattern.to_string()),
                    };
                }
            }
            Evaluation {
                action,
                matched_pattern: Some(pattern.to_string()),
            }
        }
        None => Evaluation {
            action: defaults.default_for(permission),
            matched_pattern: None,
        },
    }
}
