//! Classification of a single upstream attempt.

use std::fmt;
use std::time::Duration;

use crate::CachedPayload;

/// Result of one call to one mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// 2xx response carrying a JSON payload.
    Success(CachedPayload),
    /// HTTP 429, with the server's `Retry-After` hint when one was usable.
    RateLimited {
        /// Server-requested wait before the next attempt.
        retry_after: Option<Duration>,
    },
    /// HTTP 5xx.
    ServerError {
        /// Status code returned by the mirror.
        status: u16,
    },
    /// 2xx response whose body was not valid JSON.
    MalformedPayload {
        /// Parser diagnostic.
        message: String,
    },
    /// Timeout or transport failure before a status was received.
    NetworkFailure {
        /// Whether the per-attempt timeout elapsed.
        timed_out: bool,
        /// Transport diagnostic.
        message: String,
    },
    /// Any other status; retrying the same mirror will not help.
    NonRetryable {
        /// Status code returned by the mirror.
        status: u16,
    },
}

impl AttemptOutcome {
    /// Whether another attempt against the same mirror may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::ServerError { .. }
                | Self::MalformedPayload { .. }
                | Self::NetworkFailure { .. }
        )
    }

    /// Whether the backoff for this outcome carries random jitter.
    #[must_use]
    pub const fn is_jittered(&self) -> bool {
        matches!(
            self,
            Self::ServerError { .. } | Self::MalformedPayload { .. } | Self::NetworkFailure { .. }
        )
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(_) => f.write_str("success"),
            Self::RateLimited {
                retry_after: Some(wait),
            } => write!(f, "rate limited (retry after {}ms)", wait.as_millis()),
            Self::RateLimited { retry_after: None } => f.write_str("rate limited"),
            Self::ServerError { status } => write!(f, "server error (HTTP {status})"),
            Self::MalformedPayload { message } => write!(f, "malformed payload: {message}"),
            Self::NetworkFailure {
                timed_out: true,
                message,
            } => write!(f, "timed out: {message}"),
            Self::NetworkFailure { message, .. } => write!(f, "network failure: {message}"),
            Self::NonRetryable { status } => write!(f, "non-retryable status (HTTP {status})"),
        }
    }
}
