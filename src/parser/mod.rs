//! Command parsing for policy extraction
//!
//! The parser turns a shell command string into the data the rule engine
//! and classifier work on: one [`CommandInvocation`] per shell-level
//! sub-command, plus the canonical filesystem paths the command references.

mod paths;
mod shell;

use std::path::Path;

pub use paths::{base_program, referenced_paths, resolve_path};
pub use shell::{parse_command, CommandInvocation, ParseError};

/// A fully decomposed command, valid for one invocation only
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    /// Sub-command invocations in source order
    pub invocations: Vec<CommandInvocation>,
    /// Canonical absolute paths referenced by file-mutating sub-commands
    pub referenced_paths: Vec<std::path::PathBuf>,
}

impl ParsedCommand {
    /// Parse a command string and derive its referenced paths
    ///
    /// Path resolution consults the real filesystem and is a blocking call.
    /// The cwd is canonicalized first so resolved paths share its real
    /// prefix even when the target does not exist yet.
    pub fn parse(command: &str, cwd: &Path) -> Result<Self, ParseError> {
        let invocations = parse_command(command)?;
        let cwd = cwd.canonicalize().unwrap_or_else(|_| cwd.to_path_buf());
        let referenced_paths = referenced_paths(&invocations, &cwd);
        Ok(Self {
            invocations,
            referenced_paths,
        })
    }

    /// Rule-matching signatures for every sub-command
    pub fn signatures(&self) -> Vec<String> {
        self.invocations.iter().map(|i| i.signature()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_command_combines_invocations_and_paths() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().canonicalize().unwrap();

        let parsed = ParsedCommand::parse("mkdir build && ls build", &cwd).unwrap();
        assert_eq!(parsed.invocations.len(), 2);
        assert_eq!(parsed.referenced_paths, vec![cwd.join("build")]);
        assert_eq!(parsed.signatures(), vec!["mkdir build", "ls build"]);
    }

    #[test]
    fn test_unparseable_is_an_error() {
        let result = ParsedCommand::parse("if then fi ((", Path::new("/tmp"));
        assert!(result.is_err());
    }
}
