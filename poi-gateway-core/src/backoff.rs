//! Delay policy between attempts against the same mirror.
//!
//! The policy is a pure function of the attempt index, the failed outcome, and
//! a jitter sample drawn by the caller, so it can be tested without timers.
//!
//! | Outcome | Delay before attempt `a + 1` |
//! |---------|------------------------------|
//! | rate limited with hint `h` | `h` |
//! | rate limited without hint | `base * (a + 1)` |
//! | server error, malformed payload, network failure | `base * (a + 1) + jitter` |
//! | success, non-retryable | none |

use std::time::Duration;

use crate::AttemptOutcome;

/// Linear backoff with optional jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay unit multiplied by the one-based attempt number.
    pub base: Duration,
    /// Exclusive upper bound for jitter samples.
    pub jitter_ceiling: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1_500),
            jitter_ceiling: Duration::from_millis(500),
        }
    }
}

impl BackoffPolicy {
    /// Create a policy from its base unit and jitter ceiling.
    #[must_use]
    pub const fn new(base: Duration, jitter_ceiling: Duration) -> Self {
        Self {
            base,
            jitter_ceiling,
        }
    }

    /// Un-jittered delay after the zero-based `attempt`.
    #[must_use]
    pub fn linear(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt.saturating_add(1))
    }

    /// Delay to wait after `outcome` on zero-based `attempt`.
    ///
    /// Returns `None` when the outcome does not warrant another attempt on the
    /// same mirror. `jitter` is only added for jittered outcomes and is capped
    /// just below [`BackoffPolicy::jitter_ceiling`].
    #[must_use]
    pub fn delay(&self, attempt: u32, outcome: &AttemptOutcome, jitter: Duration) -> Option<Duration> {
        match outcome {
            AttemptOutcome::RateLimited {
                retry_after: Some(hint),
            } => Some(*hint),
            AttemptOutcome::RateLimited { retry_after: None } => Some(self.linear(attempt)),
            AttemptOutcome::ServerError { .. }
            | AttemptOutcome::MalformedPayload { .. }
            | AttemptOutcome::NetworkFailure { .. } => {
                Some(self.linear(attempt).saturating_add(self.cap_jitter(jitter)))
            }
            AttemptOutcome::Success(_) | AttemptOutcome::NonRetryable { .. } => None,
        }
    }

    fn cap_jitter(&self, jitter: Duration) -> Duration {
        let ceiling = self.jitter_ceiling.saturating_sub(Duration::from_millis(1));
        jitter.min(ceiling)
    }
}

/// Parse a `Retry-After` header expressed in seconds.
///
/// Fractional seconds are accepted. Zero, negative, non-finite, and
/// non-numeric values (including HTTP dates) yield `None`, so the caller falls
/// back to linear backoff.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use poi_gateway_core::parse_retry_after;
///
/// assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
/// assert_eq!(parse_retry_after("0"), None);
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
#[must_use]
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
    let seconds: f64 = raw.trim().parse().ok()?;
    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn policy() -> BackoffPolicy {
        BackoffPolicy::default()
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[rstest]
    #[case(0, 1_500)]
    #[case(1, 3_000)]
    #[case(2, 4_500)]
    fn rate_limit_without_hint_backs_off_linearly(
        policy: BackoffPolicy,
        #[case] attempt: u32,
        #[case] expected_ms: u64,
    ) {
        let outcome = AttemptOutcome::RateLimited { retry_after: None };

        assert_eq!(policy.delay(attempt, &outcome, ms(400)), Some(ms(expected_ms)));
    }

    #[rstest]
    fn rate_limit_hint_overrides_linear_backoff(policy: BackoffPolicy) {
        let outcome = AttemptOutcome::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };

        assert_eq!(policy.delay(2, &outcome, ms(499)), Some(ms(2_000)));
    }

    #[rstest]
    #[case::server(AttemptOutcome::ServerError { status: 503 })]
    #[case::network(AttemptOutcome::NetworkFailure { timed_out: false, message: "reset".into() })]
    #[case::malformed(AttemptOutcome::MalformedPayload { message: "html".into() })]
    fn transient_failures_add_jitter(policy: BackoffPolicy, #[case] outcome: AttemptOutcome) {
        assert_eq!(policy.delay(1, &outcome, ms(250)), Some(ms(3_250)));
    }

    #[rstest]
    fn jitter_stays_below_ceiling(policy: BackoffPolicy) {
        let outcome = AttemptOutcome::ServerError { status: 500 };

        assert_eq!(policy.delay(0, &outcome, ms(10_000)), Some(ms(1_999)));
    }

    #[rstest]
    fn non_retryable_has_no_delay(policy: BackoffPolicy) {
        let outcome = AttemptOutcome::NonRetryable { status: 404 };

        assert_eq!(policy.delay(0, &outcome, Duration::ZERO), None);
    }

    #[rstest]
    #[case("2", Some(Duration::from_secs(2)))]
    #[case(" 1.5 ", Some(ms(1_500)))]
    #[case("0", None)]
    #[case("-4", None)]
    #[case("NaN", None)]
    #[case("inf", None)]
    #[case("Wed, 21 Oct 2015 07:28:00 GMT", None)]
    fn parses_retry_after(#[case] raw: &str, #[case] expected: Option<Duration>) {
        assert_eq!(parse_retry_after(raw), expected);
    }
}
