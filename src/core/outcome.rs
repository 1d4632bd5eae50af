//! Execution request, outcome and report types
//!
//! An [`ExecutionRequest`] goes in; an [`ExecutionReport`] comes back.
//! Policy refusals are reported as `Denied` values, never as errors, so a
//! rejected command can be shown to the model/user without aborting the
//! enclosing agent turn.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default timeout in milliseconds (2 minutes)
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;
/// Maximum timeout in milliseconds (10 minutes)
pub const MAX_TIMEOUT_MS: u64 = 600_000;
/// Hard ceiling on accumulated output bytes before the process is killed
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;
/// Display ceiling for output returned to the caller
pub const MAX_DISPLAY_OUTPUT: usize = 30_000;
/// Marker appended when output is truncated to the display ceiling
pub const TRUNCATION_MARKER: &str = "\n... (output truncated)";

/// A request to execute a shell command under the sandbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// The command string, as the agent produced it
    pub command: String,
    /// Working directory for execution and path resolution
    pub cwd: PathBuf,
    /// Timeout in milliseconds (clamped to [`MAX_TIMEOUT_MS`])
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Extra environment variables for the child process
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Optional human-readable description for progress events
    #[serde(default)]
    pub description: Option<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ExecutionRequest {
    /// Create a request with default timeout and empty environment
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            env: HashMap::new(),
            description: None,
        }
    }

    /// Set the timeout in milliseconds
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the progress description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Final state of a supervised process
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionOutcome {
    /// Combined stdout/stderr, capped at the display ceiling
    pub output: String,
    /// The child's native exit status; `None` if it was killed
    pub exit_code: Option<i32>,
    /// Terminated by the timeout timer
    pub timed_out: bool,
    /// Terminated by an external cancellation signal
    pub aborted: bool,
    /// Terminated by the output-size watchdog
    pub killed_for_size: bool,
    /// Output exceeded the display ceiling and was truncated
    pub truncated: bool,
}

impl ExecutionOutcome {
    /// True if exactly zero or one abnormal flag is set (invariant check)
    pub fn is_consistent(&self) -> bool {
        let abnormal =
            [self.timed_out, self.aborted, self.killed_for_size].iter().filter(|f| **f).count();
        abnormal <= 1 && (abnormal == 0 || self.exit_code.is_none())
    }

    /// Outcome for an invocation cancelled before any process was spawned
    pub fn aborted_before_spawn() -> Self {
        Self {
            aborted: true,
            ..Self::default()
        }
    }
}

/// A structured policy refusal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refusal {
    /// The permission domain that rejected the command
    pub permission: String,
    /// Human-readable reason
    pub reason: String,
    /// The rule or block-list pattern that matched, if any
    pub matched_pattern: Option<String>,
}

impl Refusal {
    /// Create a refusal without a matched pattern
    pub fn new(permission: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            permission: permission.into(),
            reason: reason.into(),
            matched_pattern: None,
        }
    }

    /// Attach the pattern that triggered the refusal
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.matched_pattern = Some(pattern.into());
        self
    }
}

/// What the sandbox returned for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionReport {
    /// The command was refused before spawning a process
    Denied(Refusal),
    /// The command ran; see the outcome flags for how it ended
    Completed(ExecutionOutcome),
}

impl ExecutionReport {
    /// True if the report is a policy refusal
    pub fn is_denied(&self) -> bool {
        matches!(self, ExecutionReport::Denied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_consistency() {
        let clean = ExecutionOutcome {
            exit_code: Some(0),
            ..Default::default()
        };
        assert!(clean.is_consistent());

        let timed_out = ExecutionOutcome {
            timed_out: true,
            ..Default::default()
        };
        assert!(timed_out.is_consistent());

        let conflicting = ExecutionOutcome {
            timed_out: true,
            aborted: true,
            ..Default::default()
        };
        assert!(!conflicting.is_consistent());

        // A killed process must not report an exit code
        let killed_with_code = ExecutionOutcome {
            killed_for_size: true,
            exit_code: Some(0),
            ..Default::default()
        };
        assert!(!killed_with_code.is_consistent());
    }

    #[test]
    fn test_aborted_before_spawn() {
        let outcome = ExecutionOutcome::aborted_before_spawn();
        assert!(outcome.aborted);
        assert!(outcome.exit_code.is_none());
        assert!(outcome.output.is_empty());
        assert!(outcome.is_consistent());
    }

    #[test]
    fn test_refusal_builder() {
        let refusal = Refusal::new("bash", "blocked by rule").with_pattern("rm *");
        assert_eq!(refusal.permission, "bash");
        assert_eq!(refusal.matched_pattern.as_deref(), Some("rm *"));
    }

    #[test]
    fn test_request_defaults() {
        let request = ExecutionRequest::new("ls", "/tmp");
        assert_eq!(request.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(request.env.is_empty());
    }
}
