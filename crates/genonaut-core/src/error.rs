//! The error taxonomy shared by every layer — orchestrator, planner, and the
//! HTTP surface map onto it (see §7). Kinds are semantic, not tied to a
//! transport.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenonautError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad cursor: {0}")]
    BadCursor(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("backend rejected request: {0}")]
    BackendRejected(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("output missing: {0}")]
    OutputMissing(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GenonautError {
    /// Semantic kind, used as `error.kind` in the JSON envelope and to pick
    /// an HTTP status at the server layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::BadCursor(_) => "bad_cursor",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::BackendRejected(_) => "backend_rejected",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::OutputMissing(_) => "output_missing",
            Self::Internal(_) => "internal",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::BadCursor(_) => 400,
            Self::BackendUnavailable(_) => 503,
            Self::BackendRejected(_) => 422,
            Self::Timeout(_) => 504,
            Self::Cancelled => 200,
            Self::OutputMissing(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Only transient backend conditions are retryable by the worker loop (§4.1).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, GenonautError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_status_table() {
        assert_eq!(GenonautError::Validation("x".into()).http_status(), 400);
        assert_eq!(GenonautError::NotFound("x".into()).http_status(), 404);
        assert_eq!(GenonautError::BadCursor("x".into()).http_status(), 400);
        assert_eq!(
            GenonautError::BackendUnavailable("x".into()).http_status(),
            503
        );
        assert_eq!(
            GenonautError::BackendRejected("x".into()).http_status(),
            422
        );
        assert_eq!(GenonautError::Timeout("x".into()).http_status(), 504);
        assert_eq!(GenonautError::Cancelled.http_status(), 200);
        assert_eq!(GenonautError::OutputMissing("x".into()).http_status(), 500);
    }

    #[test]
    fn only_backend_unavailable_is_retryable() {
        assert!(GenonautError::BackendUnavailable("x".into()).is_retryable());
        assert!(!GenonautError::BackendRejected("x".into()).is_retryable());
        assert!(!GenonautError::Timeout("x".into()).is_retryable());
    }
}
