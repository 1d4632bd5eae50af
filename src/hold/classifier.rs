//! Hold/release state-modification classifier
//!
//! Independent of the rule engine: decides whether a command would mutate
//! system state, using mode-specific allow/block lists. In release mode
//! only `always_block` patterns apply; in hold mode the active profile's
//! block list applies too, with `hold_allow` entries checked first as
//! exceptions. A hold-block is a hard stop, never escalated to ask.

use serde::{Deserialize, Serialize};

use super::profile::block_list;
use crate::parser::{base_program, ParsedCommand};

/// Operating posture for command execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    /// Read-only posture: profile block lists are enforced
    Hold,
    /// State-mutating posture: only `always_block` is enforced
    Release,
}

/// Classifier configuration, handed in as plain data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldModeConfig {
    /// Built-in block-list profile name ("standard" or "strict")
    pub profile: String,
    /// Exceptions permitted even in hold mode
    #[serde(default)]
    pub hold_allow: Vec<String>,
    /// Patterns blocked in both modes
    #[serde(default)]
    pub always_block: Vec<String>,
}

impl Default for HoldModeConfig {
    fn default() -> Self {
        Self {
            profile: "standard".into(),
            hold_allow: Vec::new(),
            always_block: Vec::new(),
        }
    }
}

impl HoldModeConfig {
    /// Config using a named built-in profile
    pub fn with_profile(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            ..Self::default()
        }
    }
}

/// The classifier's verdict for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldVerdict {
    /// True if the command must not run
    pub blocked: bool,
    /// Why it was blocked
    pub reason: Option<String>,
    /// The block-list pattern that matched
    pub matched_pattern: Option<String>,
    /// The active profile name
    pub profile: String,
}

impl HoldVerdict {
    fn clear(profile: &str) -> Self {
        Self {
            blocked: false,
            reason: None,
            matched_pattern: None,
            profile: profile.to_string(),
        }
    }
}

/// Classify a parsed command under the given mode and configuration
pub fn classify(parsed: &ParsedCommand, mode: ExecMode, config: &HoldModeConfig) -> HoldVerdict {
    for invocation in &parsed.invocations {
        let signature = normalized_signature(&invocation.signature());

        if let Some(pattern) = first_match(&config.always_block, &signature) {
            tracing::info!(
                "[Hold] Always-blocked command: {} (pattern: {})",
                signature,
                pattern
            );
            return HoldVerdict {
                blocked: true,
                reason: Some(format!("'{pattern}' is always blocked")),
                matched_pattern: Some(pattern),
                profile: config.profile.clone(),
            };
        }

        if mode == ExecMode::Release {
            continue;
        }

        // hold_allow exceptions are checked before the profile block list
        if first_match(&config.hold_allow, &signature).is_some() {
            continue;
        }

        let profile_patterns = block_list(&config.profile);
        if let Some(pattern) = first_match_static(&profile_patterns, &signature) {
            tracing::info!(
                "[Hold] Blocked in hold mode: {} (pattern: {}, profile: {})",
                signature,
                pattern,
                config.profile
            );
            return HoldVerdict {
                blocked: true,
                reason: Some(format!(
                    "'{}' matches the '{}' profile-based blocklist while in hold mode",
                    pattern, config.profile
                )),
                matched_pattern: Some(pattern.to_string()),
                profile: config.profile.clone(),
            };
        }
    }

    HoldVerdict::clear(&config.profile)
}

/// Signature with the program's directory prefix stripped, so
/// `/bin/rm -rf x` matches the `rm` pattern
fn normalized_signature(signature: &str) -> String {
    match signature.split_once(' ') {
        Some((program, rest)) => format!("{} {}", base_program(program), rest),
        None => base_program(signature).to_string(),
    }
}

/// True if the signature matches the pattern at a token boundary
fn pattern_matches(pattern: &str, signature: &str) -> bool {
    signature == pattern
        || (signature.starts_with(pattern) && signature[pattern.len()..].starts_with(' '))
}

fn first_match(patterns: &[String], signature: &str) -> Option<String> {
    patterns
        .iter()
        .find(|p| pattern_matches(p, signature))
        .cloned()
}

fn first_match_static<'a>(patterns: &[&'a str], signature: &str) -> Option<&'a str> {
    patterns
        .iter()
        .find(|p| pattern_matches(p, signature))
        .copied()
}
