//! Interactive escalation protocol
//!
//! When rule evaluation resolves to "ask", the invocation suspends until an
//! [`EscalationHandler`] returns a decision. The handler is the caller's
//! seam: an interactive UI, an auto-policy, or a test stub. With no handler
//! configured the sandbox fails closed and denies.
//!
//! An "always" approval is generalized before it becomes a rule: the
//! command's invariant leading tokens are kept (program name plus the first
//! verb for verb-taking programs, leading flags skipped) and a wildcard is
//! appended, so `npm install lodash` persists as `npm install *` rather
//! than the single literal or an overly broad `npm *`. The verb table is
//! configurable.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A request for an interactive permission decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRequest {
    /// The permission domain being asked about
    pub permission: String,
    /// The literal patterns that need approval (one per sub-command or path)
    pub patterns: Vec<String>,
    /// Generalized patterns an "always" approval would persist
    pub always_patterns: Vec<String>,
    /// Caller-supplied description of the action
    pub description: Option<String>,
}

/// The decision returned by an escalation handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationDecision {
    /// Reject the command
    Deny,
    /// Permit this invocation only
    AllowOnce,
    /// Permit and persist the generalized patterns as allow rules
    AllowAlways,
}

/// The suspend-and-ask seam
///
/// Invoked once per distinct permission domain needed by a command. The
/// invocation blocks cooperatively on the returned future; a handler error
/// degrades to deny (fail closed), never to fail-open.
#[async_trait]
pub trait EscalationHandler: Send + Sync {
    /// Ask for a decision on the given request
    async fn ask(&self, request: EscalationRequest) -> Result<EscalationDecision>;
}

/// Derives the persisted "always" pattern from an approved command
#[derive(Debug, Clone)]
pub struct Generalizer {
    /// Programs whose first sub-command/verb is part of the invariant prefix
    verb_programs: HashSet<String>,
}

impl Default for Generalizer {
    fn default() -> Self {
        let verb_programs = [
            "git", "npm", "pnpm", "yarn", "cargo", "docker", "kubectl", "pip", "pip3", "apt",
            "apt-get", "brew", "go",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();
        Self { verb_programs }
    }
}

impl Generalizer {
    /// A generalizer with a custom verb-program table
    pub fn with_verb_programs(programs: impl IntoIterator<Item = String>) -> Self {
        Self {
            verb_programs: programs.into_iter().collect(),
        }
    }

    /// Generalize a command signature into an "always" rule pattern
    ///
    /// `git commit -m "x"` -> `git commit *`; `ls -la` -> `ls *`.
    pub fn generalize(&self, signature: &str) -> String {
        let mut tokens = signature
            .split_whitespace()
            // VAR=value prefixes are not part of the invariant command
            .skip_while(|t| t.contains('=') && !t.starts_with('-'));

        let program = match tokens.next() {
            Some(program) => program,
            None => return "*".to_string(),
        };

        if self.verb_programs.contains(program) {
            while let Some(token) = tokens.next() {
                if let Some(flag) = token.strip_prefix('-') {
                    // A short flag without an inline value takes the next
                    // token as its value; neither is the verb
                    if !flag.starts_with('-') && !flag.contains('=') {
                        tokens.next();
                    }
                    continue;
                }
                return format!("{program} {token} *");
            }
        }
        format!("{program} *")
    }
}
