//! Failover across the ordered mirror list.

use log::{info, warn};
use poi_gateway_core::{AttemptOutcome, CachedPayload};
use thiserror::Error;

use crate::mirror::MirrorList;
use crate::retry::{MirrorOutcome, RetryEngine};

/// Every mirror was tried without obtaining a payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// All mirrors were exhausted or abandoned.
    #[error("all {mirrors} mirror(s) exhausted; last failure: {last}")]
    AllMirrorsExhausted {
        /// Number of mirrors consulted.
        mirrors: usize,
        /// Failure reported by the final mirror, kept for diagnostics.
        last: AttemptOutcome,
    },
}

/// Runs the [`RetryEngine`] against each mirror in turn until one succeeds.
#[derive(Debug)]
pub struct Dispatcher {
    mirrors: MirrorList,
    engine: RetryEngine,
}

impl Dispatcher {
    /// Create a dispatcher over `mirrors`.
    #[must_use]
    pub const fn new(mirrors: MirrorList, engine: RetryEngine) -> Self {
        Self { mirrors, engine }
    }

    /// Mirrors in consultation order.
    #[must_use]
    pub const fn mirrors(&self) -> &MirrorList {
        &self.mirrors
    }

    /// Submit `query`, failing over until a mirror returns a payload.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::AllMirrorsExhausted`] when no mirror succeeds.
    pub async fn dispatch(&self, query: &str) -> Result<CachedPayload, DispatchError> {
        let mut last = None;
        for (position, mirror) in self.mirrors.iter().enumerate() {
            match self.engine.attempt(mirror, query).await {
                MirrorOutcome::Success(payload) => {
                    if position > 0 {
                        info!("served by fallback mirror {mirror}");
                    }
                    return Ok(payload);
                }
                MirrorOutcome::Exhausted(outcome) | MirrorOutcome::Abandoned(outcome) => {
                    warn!("mirror {mirror} failed ({outcome}); moving on");
                    last = Some(outcome);
                }
            }
        }
        Err(DispatchError::AllMirrorsExhausted {
            mirrors: self.mirrors.len(),
            last: last.unwrap_or(AttemptOutcome::NetworkFailure {
                timed_out: false,
                message: "no mirrors configured".to_owned(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::Mirror;
    use crate::test_support::{FixedJitter, RecordingSleeper, ScriptedTransport};
    use rstest::{fixture, rstest};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    struct Harness {
        transport: Arc<ScriptedTransport>,
        dispatcher: Dispatcher,
        primary: Mirror,
        secondary: Mirror,
    }

    #[fixture]
    fn harness() -> Harness {
        let transport = Arc::new(ScriptedTransport::default());
        let primary = Mirror::parse("http://primary.test/api/interpreter").expect("valid mirror");
        let secondary =
            Mirror::parse("http://secondary.test/api/interpreter").expect("valid mirror");
        let engine = RetryEngine::new(transport.clone())
            .with_sleeper(Arc::new(RecordingSleeper::default()))
            .with_jitter(Arc::new(FixedJitter::new(Duration::ZERO)));
        let mirrors =
            MirrorList::new(vec![primary.clone(), secondary.clone()]).expect("non-empty list");
        Harness {
            transport,
            dispatcher: Dispatcher::new(mirrors, engine),
            primary,
            secondary,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn first_success_short_circuits(harness: Harness) {
        harness.transport.push_json(&harness.primary, json!({ "from": "primary" }));

        let payload = harness.dispatcher.dispatch("q").await.expect("should succeed");

        assert_eq!(*payload, json!({ "from": "primary" }));
        assert_eq!(harness.transport.calls_to(&harness.secondary), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn three_server_errors_move_to_next_mirror(harness: Harness) {
        for _ in 0..3 {
            harness.transport.push_status(&harness.primary, 502);
        }
        harness.transport.push_json(&harness.secondary, json!({ "from": "secondary" }));

        let payload = harness.dispatcher.dispatch("q").await.expect("should fail over");

        assert_eq!(*payload, json!({ "from": "secondary" }));
        assert_eq!(harness.transport.calls_to(&harness.primary), 3);
        assert_eq!(
            harness.transport.calls(),
            [
                harness.primary.to_string(),
                harness.primary.to_string(),
                harness.primary.to_string(),
                harness.secondary.to_string(),
            ]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn non_retryable_status_fails_over_immediately(harness: Harness) {
        harness.transport.push_status(&harness.primary, 403);
        harness.transport.push_json(&harness.secondary, json!({}));

        let result = harness.dispatcher.dispatch("q").await;

        assert!(result.is_ok());
        assert_eq!(harness.transport.calls_to(&harness.primary), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn exhaustion_keeps_last_failure(harness: Harness) {
        for _ in 0..3 {
            harness.transport.push_status(&harness.primary, 500);
        }
        harness.transport.push_status(&harness.secondary, 400);

        let err = harness.dispatcher.dispatch("q").await.expect_err("should fail");

        assert_eq!(
            err,
            DispatchError::AllMirrorsExhausted {
                mirrors: 2,
                last: AttemptOutcome::NonRetryable { status: 400 },
            }
        );
        assert_eq!(harness.transport.total_calls(), 4);
    }
}
