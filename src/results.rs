//! Structured results drained from endpoint processes

use crate::error::{CapturedOutput, HarnessError, Result};
use serde::Serialize;
use std::{collections::VecDeque, fmt, iter::FusedIterator, time::Duration};

/// Terminal status of one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
    Timeout,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of a terminated endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub endpoint: String,
    pub status: Status,
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
    /// Run budget the endpoint was given
    pub timeout: Duration,
}

impl ProcessResult {
    #[must_use]
    pub fn output(&self) -> CapturedOutput {
        CapturedOutput {
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }

    /// Fail with the captured output attached unless the endpoint succeeded
    ///
    /// # Errors
    ///
    /// Returns `ProcessFailure` or `RunTimeout` carrying stdout and stderr
    pub fn assert_success(&self) -> Result<()> {
        match self.status {
            Status::Success => Ok(()),
            Status::Failure => Err(HarnessError::ProcessFailure {
                endpoint: self.endpoint.clone(),
                exit_code: self.exit_code,
                output: self.output(),
            }),
            Status::Timeout => Err(HarnessError::RunTimeout {
                endpoint: self.endpoint.clone(),
                timeout: self.timeout,
                output: self.output(),
            }),
        }
    }

    #[must_use]
    pub fn stdout_contains(&self, needle: &str) -> bool {
        contains_bytes(&self.stdout, needle.as_bytes())
    }

    /// # Errors
    ///
    /// Returns `AssertionMismatch` with the expected marker and actual stdout
    pub fn assert_stdout_contains(&self, expected: &str) -> Result<()> {
        if self.stdout_contains(expected) {
            return Ok(());
        }
        Err(HarnessError::AssertionMismatch {
            endpoint: self.endpoint.clone(),
            expected: expected.to_string(),
            actual: String::from_utf8_lossy(&self.stdout).into_owned(),
        })
    }
}

/// Substring search over raw output
#[must_use]
pub fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

enum StreamState {
    Pending(VecDeque<ProcessResult>),
    Exhausted,
}

/// Finite, non-restartable sequence of results for one process
///
/// Once exhausted it stays exhausted; there is no way to re-read a process.
pub struct ResultStream {
    state: StreamState,
}

impl ResultStream {
    #[must_use]
    pub fn single(result: ProcessResult) -> Self {
        Self::from_events([result])
    }

    /// Stream over several structured events from one run
    pub fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = ProcessResult>,
    {
        Self {
            state: StreamState::Pending(events.into_iter().collect()),
        }
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self {
            state: StreamState::Exhausted,
        }
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self.state, StreamState::Exhausted)
    }
}

impl Iterator for ResultStream {
    type Item = ProcessResult;

    fn next(&mut self) -> Option<Self::Item> {
        let next = match &mut self.state {
            StreamState::Pending(queue) => queue.pop_front(),
            StreamState::Exhausted => None,
        };
        if next.is_none() {
            self.state = StreamState::Exhausted;
        }
        next
    }
}

impl FusedIterator for ResultStream {}

impl fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            StreamState::Pending(queue) => write!(f, "ResultStream(pending: {})", queue.len()),
            StreamState::Exhausted => f.write_str("ResultStream(exhausted)"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn result(status: Status, stdout: &str) -> ProcessResult {
        ProcessResult {
            endpoint: "s2n-server".to_string(),
            status,
            exit_code: match status {
                Status::Success => Some(0),
                Status::Failure => Some(1),
                Status::Timeout => None,
            },
            stdout: stdout.as_bytes().to_vec(),
            stderr: b"stderr text".to_vec(),
            duration: Duration::from_millis(20),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_stream_yields_once_then_exhausts() {
        let mut stream = ResultStream::single(result(Status::Success, "ok"));
        assert!(!stream.is_exhausted());
        assert!(stream.next().is_some());
        assert!(stream.next().is_none());
        assert!(stream.is_exhausted());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_stream_multiple_events_in_order() {
        let stream = ResultStream::from_events([
            result(Status::Success, "first"),
            result(Status::Success, "second"),
        ]);
        let outputs: Vec<_> = stream.map(|r| r.stdout).collect();
        assert_eq!(outputs, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn test_empty_stream() {
        let mut stream = ResultStream::empty();
        assert!(stream.is_exhausted());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_assert_success_attaches_output() {
        assert!(result(Status::Success, "").assert_success().is_ok());

        let err = result(Status::Failure, "partial")
            .assert_success()
            .unwrap_err();
        assert_eq!(err.kind(), "process_failure");
        let output = err.output().unwrap();
        assert_eq!(output.stdout, b"partial");
        assert_eq!(output.stderr, b"stderr text");

        let err = result(Status::Timeout, "").assert_success().unwrap_err();
        assert_eq!(err.kind(), "run_timeout");
    }

    #[test]
    fn test_stdout_contains() {
        let r = result(Status::Success, "Actual protocol version: 34\nServer name: a.b\n");
        assert!(r.stdout_contains("Actual protocol version: 34"));
        assert!(r.assert_stdout_contains("Server name: a.b").is_ok());

        let err = r.assert_stdout_contains("Server name: c.d").unwrap_err();
        match err {
            HarnessError::AssertionMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, "Server name: c.d");
                assert!(actual.contains("Server name: a.b"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_contains_bytes() {
        assert!(contains_bytes(b"abc", b""));
        assert!(contains_bytes(b"abc", b"bc"));
        assert!(!contains_bytes(b"abc", b"abcd"));
        assert!(!contains_bytes(b"", b"a"));
    }
}
