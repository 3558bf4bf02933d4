//! Runtime settings for assembling a [`crate::Gateway`].

use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

use poi_gateway_core::{BackoffPolicy, DEFAULT_CACHE_CAPACITY};

use crate::mirror::MirrorList;
use crate::retry::DEFAULT_MAX_ATTEMPTS;
use crate::transport::{DEFAULT_TIMEOUT, HttpTransportConfig};

/// Descriptive client identifier sent to mirrors.
pub const DEFAULT_USER_AGENT: &str = "poi-gateway/0.1";

/// Settings for the production gateway.
///
/// The defaults reproduce the stock behaviour: the public mirrors, three
/// attempts per mirror, a fifteen second timeout, and a 200 entry cache.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Mirrors in consultation order.
    pub mirrors: MirrorList,
    /// Attempts made against each mirror.
    pub max_attempts: NonZeroU32,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// `User-Agent` sent with each request.
    pub user_agent: String,
    /// Maximum number of cached payloads.
    pub cache_capacity: NonZeroUsize,
    /// Delays between attempts.
    pub policy: BackoffPolicy,
    /// Share one upstream dispatch between concurrent identical misses.
    pub coalesce: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mirrors: MirrorList::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            policy: BackoffPolicy::default(),
            coalesce: false,
        }
    }
}

impl GatewayConfig {
    /// Replace the mirror list.
    #[must_use]
    pub fn with_mirrors(mut self, mirrors: MirrorList) -> Self {
        self.mirrors = mirrors;
        self
    }

    /// Set the attempts made per mirror.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: NonZeroU32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the cache capacity.
    #[must_use]
    pub const fn with_cache_capacity(mut self, cache_capacity: NonZeroUsize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    /// Replace the backoff policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable request coalescing.
    #[must_use]
    pub const fn with_coalescing(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    /// Transport settings derived from this configuration.
    #[must_use]
    pub fn transport(&self) -> HttpTransportConfig {
        HttpTransportConfig::default()
            .with_timeout(self.timeout)
            .with_user_agent(self.user_agent.clone())
    }
}
