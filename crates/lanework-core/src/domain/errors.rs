//! Execution failure classification.

use std::fmt;

/// Operational class of a handler failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// May succeed on a later attempt. Everything a handler raises lands here
    /// unless the handler says otherwise.
    Transient,
    /// Will not succeed on retry (unknown job type, misconfiguration).
    Permanent,
    /// A dependency of the handler is down (SMTP relay, filesystem).
    Infrastructure,
}

/// Failure of one execution attempt.
///
/// This is a value handed to the retry controller, not an error that escapes
/// the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    kind: ErrorKind,
    message: String,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Infrastructure, message)
    }

    pub fn unknown_job_type(job_type: &str) -> Self {
        Self::permanent(format!("Unknown job type: {job_type}"))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message recorded in the job's `error` column.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ExecutionError {}

impl From<serde_json::Error> for ExecutionError {
    fn from(err: serde_json::Error) -> Self {
        Self::transient(format!("invalid payload: {err}"))
    }
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        Self::infrastructure(err.to_string())
    }
}
