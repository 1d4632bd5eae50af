//! Layered permission rule engine
//!
//! Rules are scoped to a permission domain ("bash", "external_directory",
//! "task", ...) and carry a pattern plus an allow/deny/ask action. Rulesets
//! layer: base defaults, user configuration, security defaults for
//! unconfigured domains, and session rules appended from approved
//! escalations.
//!
//! ## Example
//!
//! ```rust,ignore
//! use agent_sandbox::rules::{evaluate, DomainDefaults, PermissionRule, RuleAction, Ruleset};
//!
//! let mut ruleset = Ruleset::base_defaults();
//! ruleset.merge(Ruleset::from_rules(vec![
//!     PermissionRule::new("bash", "rm *", RuleAction::Deny),
//! ]));
//! ruleset.merge_security_defaults(Ruleset::security_defaults());
//!
//! let result = evaluate("bash", "rm -rf /tmp/x", &ruleset, &DomainDefaults::new());
//! ```

mod engine;
mod pattern;
mod ruleset;

pub use engine::{evaluate, DomainDefaults, Evaluation};
pub use pattern::{CompiledPattern, MatchTier};
pub use ruleset::{shared, PermissionRule, RuleAction, RuleOrigin, Ruleset, SharedRuleset};
