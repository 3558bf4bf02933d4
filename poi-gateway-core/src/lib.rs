//! Core domain types for the POI gateway.
//!
//! This crate holds everything that does not touch the network: the wire
//! input and its validation, the query-language builder, the bounded
//! response cache, and the pure backoff policy used by the retry engine.
//! Constructors return `Result` where input can be rejected so invalid
//! requests surface before any upstream call is attempted.

#![forbid(unsafe_code)]

pub mod backoff;
pub mod cache;
pub mod outcome;
pub mod query;

pub use backoff::{BackoffPolicy, parse_retry_after};
pub use cache::{CachedPayload, DEFAULT_CACHE_CAPACITY, FifoCache, ResponseCache, SharedFifoCache};
pub use outcome::AttemptOutcome;
pub use query::{
    DEFAULT_MAX_RESULTS, DEFAULT_RADIUS_METERS, ElementKind, GeoCenter, MAX_RESULTS_CEILING,
    QueryRequest, QueryRequestError, QuerySpec, TagRule, build_query, clamp_max_results,
    normalise_radius,
};
