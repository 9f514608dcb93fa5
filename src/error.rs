use std::{fmt, io, time::Duration};

/// Output captured from an endpoint, attached to every failure that has one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

impl fmt::Display for CapturedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "--- stdout ---\n{}\n--- stderr ---\n{}",
            self.stdout_lossy().trim_end(),
            self.stderr_lossy().trim_end()
        )
    }
}

/// Failure taxonomy for a single case
///
/// Nothing here crosses case boundaries: each case owns its processes and
/// reports exactly one of these when it does not pass.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Invalid or unsupported option combination, detected before any launch
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Server never signalled readiness within the startup sub-timeout
    #[error(
        "{endpoint} did not start listening within {timeout:?} (exit code: {exit_code:?})\n{output}"
    )]
    StartupTimeout {
        endpoint: String,
        timeout: Duration,
        exit_code: Option<i32>,
        output: CapturedOutput,
    },

    /// Endpoint exceeded the overall run timeout and was killed
    #[error("{endpoint} exceeded run timeout of {timeout:?}\n{output}")]
    RunTimeout {
        endpoint: String,
        timeout: Duration,
        output: CapturedOutput,
    },

    /// Endpoint exited unsuccessfully
    #[error("{endpoint} failed with exit code {exit_code:?}\n{output}")]
    ProcessFailure {
        endpoint: String,
        exit_code: Option<i32>,
        output: CapturedOutput,
    },

    /// Endpoint output did not contain an expected marker
    #[error("expected `{expected}` in {endpoint} output, got:\n{actual}")]
    AssertionMismatch {
        endpoint: String,
        expected: String,
        actual: String,
    },

    /// The OS refused to launch the endpoint
    #[error("failed to launch {endpoint} ({program}): {source}")]
    Launch {
        endpoint: String,
        program: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl HarnessError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Short label used for metrics and reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::StartupTimeout { .. } => "startup_timeout",
            Self::RunTimeout { .. } => "run_timeout",
            Self::ProcessFailure { .. } => "process_failure",
            Self::AssertionMismatch { .. } => "assertion_mismatch",
            Self::Launch { .. } => "launch",
            Self::Io(_) => "io",
        }
    }

    /// Captured output, when the failure has any
    #[must_use]
    pub const fn output(&self) -> Option<&CapturedOutput> {
        match self {
            Self::StartupTimeout { output, .. }
            | Self::RunTimeout { output, .. }
            | Self::ProcessFailure { output, .. } => Some(output),
            _ => None,
        }
    }
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_process_failure_surfaces_output() {
        let err = HarnessError::ProcessFailure {
            endpoint: "s2n server".to_string(),
            exit_code: Some(1),
            output: CapturedOutput {
                stdout: b"Listening on 127.0.0.1:8000\n".to_vec(),
                stderr: b"handshake failure\n".to_vec(),
            },
        };
        let message = err.to_string();
        assert!(message.contains("s2n server"));
        assert!(message.contains("Some(1)"));
        assert!(message.contains("Listening on"));
        assert!(message.contains("handshake failure"));
        assert_eq!(err.kind(), "process_failure");
        assert!(err.output().is_some());
    }

    #[test]
    fn test_startup_timeout_distinct_from_run_timeout() {
        let startup = HarnessError::StartupTimeout {
            endpoint: "server".to_string(),
            timeout: Duration::from_millis(200),
            exit_code: None,
            output: CapturedOutput::default(),
        };
        let run = HarnessError::RunTimeout {
            endpoint: "server".to_string(),
            timeout: Duration::from_secs(5),
            output: CapturedOutput::default(),
        };
        assert_ne!(startup.kind(), run.kind());
        assert!(startup.to_string().contains("did not start listening"));
        assert!(run.to_string().contains("exceeded run timeout"));
    }

    #[test]
    fn test_assertion_mismatch_reports_both_strings() {
        let err = HarnessError::AssertionMismatch {
            endpoint: "server".to_string(),
            expected: "Server name: www.example.com".to_string(),
            actual: "Server name: other.example.com".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("Server name: www.example.com"));
        assert!(message.contains("other.example.com"));
        assert!(err.output().is_none());
    }

    #[test]
    fn test_configuration_helper() {
        let err = HarnessError::configuration("client carries certificates");
        assert_eq!(err.kind(), "configuration");
        assert_eq!(
            err.to_string(),
            "configuration error: client carries certificates"
        );
    }
}
