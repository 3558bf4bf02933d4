//! Time and randomness seams used between retry attempts.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// Suspends the current request between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Source of backoff jitter.
pub trait JitterSource: Send + Sync {
    /// Draw a duration uniformly from `[0, ceiling)`.
    fn sample(&self, ceiling: Duration) -> Duration;
}

/// [`JitterSource`] drawing from the thread-local RNG at millisecond
/// resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&self, ceiling: Duration) -> Duration {
        let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        if ceiling_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..ceiling_ms))
    }
}
