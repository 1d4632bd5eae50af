//! Permission rules and layered rulesets
//!
//! A [`Ruleset`] is an ordered, mergeable collection of [`PermissionRule`]s.
//! Layering follows the configuration model: a *base* set of permissive
//! defaults, the *user* set merged on top (replacing base rules for the same
//! `(permission, pattern)` pair), then *security defaults* that apply only
//! to permission domains the user left unconfigured. Rules approved during a
//! session are appended with [`RuleOrigin::Session`].
//!
//! The live ruleset is shared as [`SharedRuleset`] (`Arc<RwLock<_>>`):
//! evaluation takes a read guard, an "always" append takes the write guard,
//! so readers see either the whole new rule or none of it.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::pattern::CompiledPattern;

/// The outcome a rule assigns to matching candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Permit without asking
    Allow,
    /// Reject; deny wins over ask/allow at equal specificity
    Deny,
    /// Suspend and escalate for an interactive decision
    Ask,
}

/// Which configuration layer a rule came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOrigin {
    /// Built-in permissive default
    Base,
    /// Security default for a domain the user did not configure
    SecurityDefault,
    /// From user configuration
    User,
    /// Approved during this session via escalation
    Session,
}

/// A single permission rule, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Capability domain the rule is scoped to (e.g. "bash")
    pub permission: String,
    /// Pattern within the domain (literal, trailing-wildcard, or glob)
    pub pattern: String,
    /// Outcome for matching candidates
    pub action: RuleAction,
    /// Configuration layer the rule came from
    #[serde(default = "default_origin")]
    pub origin: RuleOrigin,
}

fn default_origin() -> RuleOrigin {
    RuleOrigin::User
}

impl PermissionRule {
    /// Create a user-origin rule
    pub fn new(
        permission: impl Into<String>,
        pattern: impl Into<String>,
        action: RuleAction,
    ) -> Self {
        Self {
            permission: permission.into(),
            pattern: pattern.into(),
            action,
            origin: RuleOrigin::User,
        }
    }

    /// Override the origin layer
    pub fn with_origin(mut self, origin: RuleOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// A rule together with its compiled pattern and merge sequence number
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub rule: PermissionRule,
    pub compiled: CompiledPattern,
    /// Insertion order; among equal-specificity matches the most recently
    /// merged rule wins (unless a deny is present)
    pub seq: u64,
}

/// Ordered, mergeable collection of permission rules
#[derive(Debug, Default)]
pub struct Ruleset {
    rules: Vec<CompiledRule>,
    next_seq: u64,
}

impl Ruleset {
    /// Create an empty ruleset
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ruleset from a list of rules, preserving order
    pub fn from_rules(rules: Vec<PermissionRule>) -> Self {
        let mut ruleset = Self::new();
        for rule in rules {
            ruleset.push(rule);
        }
        ruleset
    }

    /// The built-in permissive base layer
    pub fn base_defaults() -> Self {
        Self::from_rules(vec![
            PermissionRule::new("bash", "*", RuleAction::Allow).with_origin(RuleOrigin::Base),
            PermissionRule::new("task", "*", RuleAction::Allow).with_origin(RuleOrigin::Base),
        ])
    }

    /// Security-default rules, applied only to domains the user left
    /// unconfigured (see [`Ruleset::merge_security_defaults`])
    pub fn security_defaults() -> Vec<PermissionRule> {
        vec![PermissionRule::new("external_directory", "*", RuleAction::Ask)
            .with_origin(RuleOrigin::SecurityDefault)]
    }

    /// Number of rules in the set
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if the set has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Append a rule, compiling its pattern
    ///
    /// Exact duplicates (same permission, pattern and action) are ignored.
    pub fn push(&mut self, rule: PermissionRule) {
        if self
            .rules
            .iter()
            .any(|r| {
                r.rule.permission == rule.permission
                    && r.rule.pattern == rule.pattern
                    && r.rule.action == rule.action
            })
        {
            return;
        }
        tracing::debug!(
            "[Ruleset] Adding {:?} rule for {}: {:?}",
            rule.origin,
            rule.permission,
            rule.pattern
        );
        let compiled = CompiledPattern::compile(&rule.pattern);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.rules.push(CompiledRule {
            rule,
            compiled,
            seq,
        });
    }

    /// Merge another ruleset on top of this one
    ///
    /// Set union keyed on `(permission, pattern)`: an incoming rule replaces
    /// an existing rule for the same pair and takes a fresh sequence number,
    /// so it wins ties against older rules of equal specificity.
    pub fn merge(&mut self, other: Ruleset) {
        for incoming in other.rules {
            self.rules.retain(|r| {
                !(r.rule.permission == incoming.rule.permission
                    && r.rule.pattern == incoming.rule.pattern)
            });
            let seq = self.next_seq;
            self.next_seq += 1;
            self.rules.push(CompiledRule { seq, ..incoming });
        }
    }

    /// Merge security-default rules for domains the user did not configure
    ///
    /// A default is skipped entirely if any existing rule names its
    /// permission domain: explicit user configuration is never overridden.
    pub fn merge_security_defaults(&mut self, defaults: Vec<PermissionRule>) {
        for default in defaults {
            let configured = self
                .rules
                .iter()
                .any(|r| r.rule.permission == default.permission);
            if configured {
                tracing::debug!(
                    "[Ruleset] Skipping security default for configured domain {}",
                    default.permission
                );
                continue;
            }
            self.push(default.with_origin(RuleOrigin::SecurityDefault));
        }
    }

    /// Parse user configuration: a JSON array of rules
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let rules: Vec<PermissionRule> = serde_json::from_str(json)?;
        Ok(Self::from_rules(rules))
    }

    /// All rules scoped to a permission domain
    pub(crate) fn rules_for<'a>(
        &'a self,
        permission: &'a str,
    ) -> impl Iterator<Item = &'a CompiledRule> + 'a {
        self.rules.iter().filter(move |r| r.rule.permission == permission)
    }

    /// Snapshot of the plain rules (for persistence by the caller)
    pub fn rules(&self) -> Vec<PermissionRule> {
        self.rules.iter().map(|r| r.rule.clone()).collect()
    }
}

/// Shared handle to the live ruleset
///
/// Rule evaluation never blocks on anything but the lock itself; appends
/// from approved escalations are applied atomically under the write guard.
pub type SharedRuleset = Arc<RwLock<Ruleset>>;

/// Wrap a ruleset for sharing
pub fn shared(ruleset: Ruleset) -> SharedRuleset {
    Arc::new(RwLock::new(ruleset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_deduplicates() {
        let mut ruleset = Ruleset::new();
        ruleset.push(PermissionRule::new("bash", "git *", RuleAction::Allow));
        ruleset.push(PermissionRule::new("bash", "git *", RuleAction::Allow));
        assert_eq!(ruleset.len(), 1);
    }

    #[test]
    fn test_merge_replaces_same_pair() {
        let mut base = Ruleset::from_rules(vec![PermissionRule::new(
            "bash",
            "npm *",
            RuleAction::Ask,
        )
        .with_origin(RuleOrigin::Base)]);

        let user = Ruleset::from_rules(vec![PermissionRule::new(
            "bash",
            "npm *",
            RuleAction::Allow,
        )]);
        base.merge(user);

        assert_eq!(base.len(), 1);
        let rules = base.rules();
        assert_eq!(rules[0].action, RuleAction::Allow);
        assert_eq!(rules[0].origin, RuleOrigin::User);
    }

    #[test]
    fn test_security_defaults_skip_configured_domains() {
        let mut ruleset = Ruleset::from_rules(vec![PermissionRule::new(
            "external_directory",
            "/home/me/*",
            RuleAction::Allow,
        )]);
        ruleset.merge_security_defaults(Ruleset::security_defaults());

        // The user configured external_directory; the ask-everything default
        // must not appear
        let rules = ruleset.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].action, RuleAction::Allow);
    }

    #[test]
    fn test_security_defaults_apply_to_unconfigured_domains() {
        let mut ruleset =
            Ruleset::from_rules(vec![PermissionRule::new("bash", "*", RuleAction::Allow)]);
        ruleset.merge_security_defaults(Ruleset::security_defaults());

        let rules = ruleset.rules();
        assert_eq!(rules.len(), 2);
        assert!(rules
            .iter()
            .any(|r| r.permission == "external_directory" && r.action == RuleAction::Ask));
    }

    #[test]
    fn test_from_json_config() {
        let ruleset = Ruleset::from_json(
            r#"[
                {"permission": "bash", "pattern": "git push *", "action": "ask"},
                {"permission": "bash", "pattern": "rm *", "action": "deny"}
            ]"#,
        )
        .unwrap();

        let rules = ruleset.rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].action, RuleAction::Ask);
        // Origin defaults to user when absent from the config
        assert_eq!(rules[0].origin, RuleOrigin::User);
    }

    #[test]
    fn test_shared_ruleset_append_visible_to_readers() {
        let handle = shared(Ruleset::new());
        {
            let mut guard = handle.write().unwrap();
            guard.push(PermissionRule::new("bash", "ls *", RuleAction::Allow));
        }
        let guard = handle.read().unwrap();
        assert_eq!(guard.len(), 1);
    }
}
