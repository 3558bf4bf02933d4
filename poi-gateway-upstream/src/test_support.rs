//! Test doubles for the upstream seams.
//!
//! [`ScriptedTransport`] replays queued responses per mirror and records every
//! call, [`RecordingSleeper`] records requested delays without waiting, and
//! [`FixedJitter`] returns a constant jitter sample.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use poi_gateway_upstream::{Mirror, RetryEngine, MirrorOutcome};
//! use poi_gateway_upstream::test_support::{RecordingSleeper, ScriptedTransport};
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build()?.block_on(async {
//! let mirror = Mirror::parse("http://mirror.test/api/interpreter")?;
//! let transport = Arc::new(ScriptedTransport::default());
//! transport.push_status(&mirror, 502);
//! transport.push_json(&mirror, json!({ "elements": [] }));
//! let sleeper = Arc::new(RecordingSleeper::default());
//!
//! let engine = RetryEngine::new(transport.clone()).with_sleeper(sleeper.clone());
//! let outcome = engine.attempt(&mirror, "[out:json];").await;
//!
//! assert!(matches!(outcome, MirrorOutcome::Success(_)));
//! assert_eq!(transport.calls_to(&mirror), 2);
//! assert_eq!(sleeper.recorded().len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::mirror::Mirror;
use crate::sleep::{JitterSource, Sleeper};
use crate::transport::{Transport, TransportError, UpstreamResponse};

type Script = Result<UpstreamResponse, TransportError>;

/// [`Transport`] replaying queued results per mirror.
///
/// A mirror with nothing queued answers with a network error, so tests that
/// forget to script a mirror fail over rather than hang.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    /// Queue a raw result for `mirror`.
    pub fn push(&self, mirror: &Mirror, result: Result<UpstreamResponse, TransportError>) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(mirror.to_string())
            .or_default()
            .push_back(result);
    }

    /// Queue a 200 response carrying `payload`.
    pub fn push_json(&self, mirror: &Mirror, payload: Value) {
        self.push(mirror, Ok(UpstreamResponse::new(200, payload.to_string())));
    }

    /// Queue an empty-bodied response with `status`.
    pub fn push_status(&self, mirror: &Mirror, status: u16) {
        self.push(mirror, Ok(UpstreamResponse::new(status, "")));
    }

    /// Queue a 429 response, optionally carrying a `Retry-After` value.
    pub fn push_rate_limited(&self, mirror: &Mirror, retry_after: Option<&str>) {
        let mut response = UpstreamResponse::new(429, "rate limited");
        response.retry_after = retry_after.map(str::to_owned);
        self.push(mirror, Ok(response));
    }

    /// Queue a transport failure.
    pub fn push_error(&self, mirror: &Mirror, error: TransportError) {
        self.push(mirror, Err(error));
    }

    /// Mirrors contacted so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(mirror, _)| mirror.clone())
            .collect()
    }

    /// Queries sent so far, in call order.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, query)| query.clone())
            .collect()
    }

    /// Number of calls made to `mirror`.
    #[must_use]
    pub fn calls_to(&self, mirror: &Mirror) -> usize {
        let key = mirror.to_string();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(called, _)| *called == key)
            .count()
    }

    /// Total number of calls across all mirrors.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, mirror: &Mirror, query: &str) -> Result<UpstreamResponse, TransportError> {
        let key = mirror.to_string();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((key.clone(), query.to_owned()));
        let next = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        next.unwrap_or_else(|| {
            Err(TransportError::Network {
                url: key,
                message: "no scripted response".to_owned(),
            })
        })
    }
}

/// [`Sleeper`] that records delays and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    recorded: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Delays requested so far, in order.
    #[must_use]
    pub fn recorded(&self) -> Vec<Duration> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

/// [`JitterSource`] returning the same sample every time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedJitter {
    sample: Duration,
}

impl FixedJitter {
    /// Always return `sample`.
    #[must_use]
    pub const fn new(sample: Duration) -> Self {
        Self { sample }
    }
}

impl JitterSource for FixedJitter {
    fn sample(&self, _ceiling: Duration) -> Duration {
        self.sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn mirror(url: &str) -> Mirror {
        Mirror::parse(url).expect("valid mirror")
    }

    #[rstest]
    #[tokio::test]
    async fn replays_scripts_per_mirror_in_order() {
        let transport = ScriptedTransport::default();
        let first = mirror("http://a.test/api");
        let second = mirror("http://b.test/api");
        transport.push_status(&first, 503);
        transport.push_status(&first, 200);
        transport.push_status(&second, 404);

        let a1 = transport.send(&first, "q").await.expect("scripted");
        let b1 = transport.send(&second, "q").await.expect("scripted");
        let a2 = transport.send(&first, "q").await.expect("scripted");

        assert_eq!((a1.status, b1.status, a2.status), (503, 404, 200));
        assert_eq!(transport.calls_to(&first), 2);
        assert_eq!(transport.total_calls(), 3);
    }

    #[rstest]
    #[tokio::test]
    async fn unscripted_mirror_fails_with_network_error() {
        let transport = ScriptedTransport::default();

        let err = transport
            .send(&mirror("http://a.test/api"), "q")
            .await
            .expect_err("nothing scripted");

        assert!(!err.is_timeout());
    }

    #[rstest]
    #[tokio::test]
    async fn recording_sleeper_does_not_wait() {
        let sleeper = RecordingSleeper::default();

        sleeper.sleep(Duration::from_secs(3_600)).await;

        assert_eq!(sleeper.recorded(), [Duration::from_secs(3_600)]);
    }
}
