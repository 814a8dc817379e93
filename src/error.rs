// src/error.rs

use std::fmt;

/// Global error enum for the exam session runtime.
/// Centralizes the failure taxonomy shared by the controller, the
/// persistence gateway, and the stores behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExamError {
    /// User-correctable input problem (blank identity, closed access
    /// window, answer for an unknown question). Blocks the operation
    /// but never the session.
    Validation(String),

    /// The remote store is unreachable (connect failure, timeout,
    /// 5xx). Triggers sticky failover at the gateway.
    Transport(String),

    /// The remote store rejected the caller's credentials (401/403).
    /// Triggers sticky failover at the gateway.
    Authorization(String),

    /// A mutating call arrived after the session lock was set.
    /// Swallowed at the controller boundary; callers observe a no-op.
    TerminalState,

    /// Both the primary and the fallback store failed during submit.
    /// The session still reaches its terminal state locally.
    CommitFailure(String),

    /// Local durable storage fault (I/O or serialization).
    Storage(String),
}

impl ExamError {
    /// Whether this error must flip the gateway into local-fallback
    /// mode. Only remote availability and permission failures do;
    /// local faults and validation problems never cause failover.
    pub fn triggers_failover(&self) -> bool {
        matches!(self, ExamError::Transport(_) | ExamError::Authorization(_))
    }
}

impl fmt::Display for ExamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamError::Validation(msg) => write!(f, "validation error: {}", msg),
            ExamError::Transport(msg) => write!(f, "transport error: {}", msg),
            ExamError::Authorization(msg) => write!(f, "authorization error: {}", msg),
            ExamError::TerminalState => write!(f, "session is already terminated"),
            ExamError::CommitFailure(msg) => write!(f, "commit failure: {}", msg),
            ExamError::Storage(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for ExamError {}

/// Converts `reqwest::Error` into the taxonomy.
/// Connectivity and timeout problems are transport failures; an error
/// carrying a 401/403 status is an authorization failure.
impl From<reqwest::Error> for ExamError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return ExamError::Authorization(err.to_string());
            }
        }
        ExamError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for ExamError {
    fn from(err: std::io::Error) -> Self {
        ExamError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ExamError {
    fn from(err: serde_json::Error) -> Self {
        ExamError::Storage(err.to_string())
    }
}
