//! Bounded attempt loop against a single mirror.
//!
//! For each attempt the engine sends the query, classifies the response into
//! an [`AttemptOutcome`], and decides whether to stay on the mirror:
//!
//! ```text
//! Success ───────────────────────────────► MirrorOutcome::Success
//! NonRetryable ──────────────────────────► MirrorOutcome::Abandoned
//! RateLimited / ServerError /
//! MalformedPayload / NetworkFailure ──┬──► last attempt: MirrorOutcome::Exhausted
//!                                     └──► sleep(backoff), next attempt
//! ```
//!
//! No sleep follows the final attempt; the dispatcher moves straight on to the
//! next mirror.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use poi_gateway_core::{AttemptOutcome, BackoffPolicy, CachedPayload, parse_retry_after};
use serde_json::Value;

use crate::mirror::Mirror;
use crate::sleep::{JitterSource, RandomJitter, Sleeper, TokioSleeper};
use crate::transport::{Transport, UpstreamResponse};

/// Attempts made against each mirror when none are configured.
pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = NonZeroU32::MIN.saturating_add(2);

const TOO_MANY_REQUESTS: u16 = 429;

/// Final result of the attempt loop for one mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorOutcome {
    /// A payload was obtained.
    Success(CachedPayload),
    /// Every attempt failed with a retryable outcome; carries the last one.
    Exhausted(AttemptOutcome),
    /// The mirror answered with a non-retryable status.
    Abandoned(AttemptOutcome),
}

/// Classify a raw mirror response.
///
/// 2xx bodies are parsed as JSON; a body that fails to parse is
/// [`AttemptOutcome::MalformedPayload`].
#[must_use]
pub fn classify_response(response: &UpstreamResponse) -> AttemptOutcome {
    match response.status {
        200..=299 => match serde_json::from_str::<Value>(&response.body) {
            Ok(payload) => AttemptOutcome::Success(Arc::new(payload)),
            Err(err) => AttemptOutcome::MalformedPayload {
                message: err.to_string(),
            },
        },
        TOO_MANY_REQUESTS => AttemptOutcome::RateLimited {
            retry_after: response.retry_after.as_deref().and_then(parse_retry_after),
        },
        500..=599 => AttemptOutcome::ServerError {
            status: response.status,
        },
        status => AttemptOutcome::NonRetryable { status },
    }
}

/// Per-mirror retry loop with status-driven backoff.
pub struct RetryEngine {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    jitter: Arc<dyn JitterSource>,
    policy: BackoffPolicy,
    max_attempts: NonZeroU32,
}

impl std::fmt::Debug for RetryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryEngine")
            .field("transport", &"<dyn Transport>")
            .field("policy", &self.policy)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl RetryEngine {
    /// Create an engine with Tokio sleeping, random jitter, the default
    /// backoff policy, and [`DEFAULT_MAX_ATTEMPTS`].
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(RandomJitter),
            policy: BackoffPolicy::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Replace the sleeper.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replace the jitter source.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the backoff policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the number of attempts per mirror.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: NonZeroU32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Attempts made per mirror.
    #[must_use]
    pub const fn max_attempts(&self) -> NonZeroU32 {
        self.max_attempts
    }

    /// Run the attempt loop for `query` against `mirror`.
    pub async fn attempt(&self, mirror: &Mirror, query: &str) -> MirrorOutcome {
        let mut attempt: u32 = 0;
        loop {
            let outcome = self.attempt_once(mirror, query).await;
            match outcome {
                AttemptOutcome::Success(payload) => {
                    debug!("mirror {mirror} answered on attempt {}", attempt + 1);
                    return MirrorOutcome::Success(payload);
                }
                AttemptOutcome::NonRetryable { .. } => {
                    warn!("mirror {mirror} rejected the query: {outcome}");
                    return MirrorOutcome::Abandoned(outcome);
                }
                _ => {}
            }

            let next = attempt.saturating_add(1);
            if next >= self.max_attempts.get() {
                warn!("mirror {mirror} exhausted after {next} attempt(s): {outcome}");
                return MirrorOutcome::Exhausted(outcome);
            }

            if let Some(delay) = self.policy.delay(attempt, &outcome, self.jitter_for(&outcome)) {
                warn!(
                    "mirror {mirror} attempt {next} failed ({outcome}); retrying in {}ms",
                    delay.as_millis()
                );
                self.sleeper.sleep(delay).await;
            }
            attempt = next;
        }
    }

    async fn attempt_once(&self, mirror: &Mirror, query: &str) -> AttemptOutcome {
        match self.transport.send(mirror, query).await {
            Ok(response) => classify_response(&response),
            Err(err) => AttemptOutcome::NetworkFailure {
                timed_out: err.is_timeout(),
                message: err.to_string(),
            },
        }
    }

    fn jitter_for(&self, outcome: &AttemptOutcome) -> Duration {
        if outcome.is_jittered() {
            self.jitter.sample(self.policy.jitter_ceiling)
        } else {
            Duration::ZERO
        }
    }
}
