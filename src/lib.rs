//! Facade crate for the POI gateway.
//!
//! This crate re-exports the query, cache, and backoff domain types and, behind
//! the `upstream` feature, the mirror failover gateway.

#![forbid(unsafe_code)]

pub use poi_gateway_core::{
    AttemptOutcome, BackoffPolicy, CachedPayload, DEFAULT_CACHE_CAPACITY, FifoCache, GeoCenter,
    QueryRequest, QueryRequestError, QuerySpec, ResponseCache, SharedFifoCache, TagRule,
    build_query,
};

#[cfg(feature = "upstream")]
pub use poi_gateway_upstream::{
    DispatchError, Gateway, GatewayConfig, GatewayError, GatewayResponse, Mirror, MirrorList,
    ResponseSource, RetryEngine, Transport,
};
