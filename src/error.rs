use std::sync::Arc;

use http::Method;
use thiserror::Error;

use crate::state::RequestState;

type SharedCause = Arc<dyn std::error::Error + Send + Sync>;

/// Stable machine-readable codes, one per error kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    Network,
    Timeout,
    RetryExhausted,
    CircuitOpen,
    ResponseValidation,
    IntegrityViolation,
    DeterministicState,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT_ERROR",
            Self::RetryExhausted => "RETRY_EXHAUSTED",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::ResponseValidation => "RESPONSE_VALIDATION_ERROR",
            Self::IntegrityViolation => "INTEGRITY_VIOLATION",
            Self::DeterministicState => "DETERMINISTIC_STATE_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Closed failure taxonomy of the request engine.
///
/// Every variant is cloneable so that deduplicated waiters can share a single
/// settled outcome; transport causes are therefore held behind `Arc`.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("network error: {message}")]
    Network {
        message: String,
        cause: Option<SharedCause>,
    },
    #[error("request timed out after {timeout_ms}ms for {method} {url}")]
    Timeout {
        timeout_ms: u64,
        method: Method,
        url: String,
    },
    #[error("retry attempts exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: Box<Error> },
    #[error("circuit breaker is open for {method} {url}")]
    CircuitOpen { method: Method, url: String },
    #[error("response validation failed: {message}")]
    ResponseValidation {
        message: String,
        issues: Vec<String>,
    },
    #[error("idempotency key conflict: {message}")]
    IntegrityViolation { message: String },
    #[error("illegal request state transition {from} -> {to}")]
    DeterministicState {
        from: RequestState,
        to: RequestState,
    },
}

impl Error {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Network { .. } => ErrorCode::Network,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::RetryExhausted { .. } => ErrorCode::RetryExhausted,
            Self::CircuitOpen { .. } => ErrorCode::CircuitOpen,
            Self::ResponseValidation { .. } => ErrorCode::ResponseValidation,
            Self::IntegrityViolation { .. } => ErrorCode::IntegrityViolation,
            Self::DeterministicState { .. } => ErrorCode::DeterministicState,
        }
    }

    /// Underlying transport failure for `Network` errors, when one exists.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync)> {
        match self {
            Self::Network {
                cause: Some(cause), ..
            } => Some(cause.as_ref()),
            _ => None,
        }
    }

    /// Final underlying failure for `RetryExhausted`; `self` otherwise.
    pub fn last_error(&self) -> &Error {
        match self {
            Self::RetryExhausted { last_error, .. } => last_error,
            _ => self,
        }
    }

    pub(crate) fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            cause: None,
        }
    }

    pub(crate) fn network_caused(message: impl Into<String>, cause: SharedCause) -> Self {
        Self::Network {
            message: message.into(),
            cause: Some(cause),
        }
    }
}
