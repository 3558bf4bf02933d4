//! Request handling: validation, cache, dispatch, and stale fallback.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use poi_gateway_core::{
    CachedPayload, QueryRequest, QueryRequestError, QuerySpec, ResponseCache, SharedFifoCache,
};
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::retry::RetryEngine;
use crate::single_flight::InFlightRegistry;
use crate::transport::{HttpTransport, TransportBuildError};

/// Where a served payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Obtained from a mirror for this request.
    Fresh,
    /// Served from the cache without contacting a mirror.
    Cached,
    /// Served from the cache after every mirror failed.
    Stale,
}

/// Payload returned to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    /// Upstream JSON, unmodified.
    pub payload: CachedPayload,
    /// Provenance of the payload.
    pub source: ResponseSource,
}

/// Failures surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// The request lacked required fields.
    #[error("invalid request: {0}")]
    Validation(#[from] QueryRequestError),
    /// No mirror answered and nothing was cached.
    #[error("upstream unavailable: {0}")]
    Unavailable(#[source] DispatchError),
}

/// Serves POI queries from the cache or the mirror pool.
pub struct Gateway {
    dispatcher: Arc<Dispatcher>,
    cache: Arc<dyn ResponseCache>,
    in_flight: Option<InFlightRegistry>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("dispatcher", &self.dispatcher)
            .field("cached_entries", &self.cache.len())
            .field("coalescing", &self.in_flight.is_some())
            .finish()
    }
}

impl Gateway {
    /// Assemble a gateway from its parts, without coalescing.
    #[must_use]
    pub fn new(dispatcher: Dispatcher, cache: Arc<dyn ResponseCache>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            cache,
            in_flight: None,
        }
    }

    /// Enable or disable sharing of concurrent identical dispatches.
    #[must_use]
    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(InFlightRegistry::new);
        self
    }

    /// Build the production gateway: an HTTP transport, the configured retry
    /// policy and mirrors, and an in-memory FIFO cache.
    ///
    /// # Errors
    ///
    /// Returns [`TransportBuildError`] if the HTTP client cannot be built.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, TransportBuildError> {
        let transport = HttpTransport::with_config(config.transport())?;
        let engine = RetryEngine::new(Arc::new(transport))
            .with_policy(config.policy)
            .with_max_attempts(config.max_attempts);
        let dispatcher = Dispatcher::new(config.mirrors.clone(), engine);
        let cache = Arc::new(SharedFifoCache::new(config.cache_capacity));
        Ok(Self::new(dispatcher, cache).with_coalescing(config.coalesce))
    }

    /// Number of payloads currently cached.
    #[must_use]
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Number of configured mirrors.
    #[must_use]
    pub fn mirror_count(&self) -> usize {
        self.dispatcher.mirrors().len()
    }

    /// Validate `request` and serve it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] before any cache or network work
    /// when required fields are missing, and [`GatewayError::Unavailable`]
    /// when every mirror fails and no cached payload exists.
    pub async fn handle(&self, request: QueryRequest) -> Result<GatewayResponse, GatewayError> {
        let spec = request.into_spec()?;
        self.fetch(&spec).await
    }

    /// Serve an already validated query.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] when every mirror fails and no
    /// cached payload exists.
    pub async fn fetch(&self, spec: &QuerySpec) -> Result<GatewayResponse, GatewayError> {
        let key = spec.to_query();
        if let Some(payload) = self.cache.get(&key) {
            debug!("cache hit");
            return Ok(GatewayResponse {
                payload,
                source: ResponseSource::Cached,
            });
        }

        match self.dispatch(&key).await {
            Ok(payload) => Ok(GatewayResponse {
                payload,
                source: ResponseSource::Fresh,
            }),
            Err(err) => match self.cache.get(&key) {
                Some(payload) => {
                    warn!("serving stale payload after upstream failure: {err}");
                    Ok(GatewayResponse {
                        payload,
                        source: ResponseSource::Stale,
                    })
                }
                None => {
                    warn!("no mirror available and nothing cached: {err}");
                    Err(GatewayError::Unavailable(err))
                }
            },
        }
    }

    async fn dispatch(&self, key: &str) -> Result<CachedPayload, DispatchError> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let cache = Arc::clone(&self.cache);
        let query = key.to_owned();
        let work = async move {
            let payload = dispatcher.dispatch(&query).await?;
            cache.put(query, Arc::clone(&payload));
            Ok(payload)
        };
        match &self.in_flight {
            Some(registry) => registry.run(key, || work).await,
            None => work.await,
        }
    }
}
