//! Error taxonomy for the request queue.

use thiserror::Error;

/// Kinds of failure a submitted request can resolve to. Retryable kinds
/// (`Timeout`, `TransientUpstream`) never escape to the caller unless
/// retries are exhausted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError {
    /// Caller error, e.g. a negative `size_bytes` passed somewhere upstream
    /// of the queue. Never retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The request exceeded `request_timeout_ms`. Retried per policy.
    #[error("request timed out")]
    Timeout,

    /// Classified by the caller's `execute` as retryable. Retried per
    /// policy.
    #[error("transient upstream failure: {0}")]
    TransientUpstream(String),

    /// Classified by the caller's `execute` as non-retryable. Surfaced
    /// immediately.
    #[error("permanent upstream failure: {0}")]
    PermanentUpstream(String),

    /// The breaker is open. Surfaced immediately, no retry, no upstream
    /// call made.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The queue was cleared, or the caller dropped interest, while this
    /// request was queued or in flight.
    #[error("request was cancelled")]
    Cancelled,
}

impl RequestError {
    /// Whether this failure kind should trigger a retry, subject to the
    /// queue's attempt budget. Every other kind surfaces immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RequestError::Timeout | RequestError::TransientUpstream(_))
    }

    /// Whether this failure kind counts toward `consecutive_failures` for
    /// the circuit breaker. Only a terminal `PermanentUpstream` counts —
    /// whether the request started out transient and exhausted its
    /// retries, or was classified permanent on the first attempt.
    pub fn counts_toward_breaker(&self) -> bool {
        matches!(self, RequestError::PermanentUpstream(_))
    }
}
