//! Sandbox error types

use thiserror::Error;

/// Errors that can occur in the sandbox
///
/// Policy refusals and abnormal terminations are *not* errors: they are
/// reported as values in [`crate::core::ExecutionReport`] so the caller
/// always receives whatever partial output was captured. The only hard
/// failure is a spawn that never produced a process.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The OS failed to create the process (missing shell/binary, bad cwd)
    #[error("Failed to spawn process: {0}")]
    Spawn(#[from] std::io::Error),

    /// The process spawned but its exit status could not be collected
    #[error("Failed to await process exit: {0}")]
    Wait(std::io::Error),

    /// Child process handles were not captured as expected
    #[error("Process pipe unavailable: {0}")]
    PipeUnavailable(&'static str),

    /// Invalid configuration handed to the sandbox
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SandboxError {
    /// Create an invalid-configuration error from a string
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        SandboxError::InvalidConfig(msg.into())
    }
}

/// Result type alias for sandbox operations
pub type SandboxResult<T> = Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SandboxError::InvalidConfig("empty ruleset".into());
        assert_eq!(err.to_string(), "Invalid configuration: empty ruleset");

        let err = SandboxError::PipeUnavailable("stdout");
        assert_eq!(err.to_string(), "Process pipe unavailable: stdout");

        // Spawn and wait failures are distinct stages
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "ECHILD");
        let err = SandboxError::Wait(io_err);
        assert!(err.to_string().starts_with("Failed to await process exit"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such shell");
        let sandbox_err: SandboxError = io_err.into();
        assert!(matches!(sandbox_err, SandboxError::Spawn(_)));
    }
}
