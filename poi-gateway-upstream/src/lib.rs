//! Upstream access for the POI gateway.
//!
//! This crate owns everything between a validated [`poi_gateway_core::QuerySpec`]
//! and a JSON payload: the mirror list, the HTTP transport, the per-mirror
//! [`RetryEngine`], the [`Dispatcher`] that fails over between mirrors, and
//! the [`Gateway`] that ties those to the shared response cache.
//!
//! # Architecture
//!
//! ```text
//! Gateway::handle
//!   ├─ validate request          -> GatewayError::Validation
//!   ├─ cache lookup              -> hit: respond
//!   ├─ Dispatcher::dispatch      (mirrors in fixed order)
//!   │    └─ RetryEngine::attempt (bounded attempts per mirror)
//!   ├─ success                   -> write-through cache, respond
//!   └─ exhausted                 -> stale cache entry or GatewayError::Unavailable
//! ```
//!
//! Network access, sleeping, and jitter sit behind the [`Transport`],
//! [`Sleeper`], and [`JitterSource`] traits so the state machine can be driven
//! deterministically in tests.
//!
//! # Example
//!
//! ```no_run
//! use poi_gateway_core::{GeoCenter, QueryRequest, TagRule};
//! use poi_gateway_upstream::{Gateway, GatewayConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Gateway::from_config(&GatewayConfig::default())?;
//! let request = QueryRequest {
//!     rules: Some(vec![TagRule::new("tourism", ["museum"])]),
//!     center: Some(GeoCenter::new(51.5, -0.1)),
//!     ..QueryRequest::default()
//! };
//! let response = gateway.handle(request).await?;
//! println!("{}", response.payload);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod config;
mod dispatch;
mod gateway;
mod mirror;
mod retry;
mod single_flight;
mod sleep;
mod transport;

#[doc(hidden)]
pub mod test_support;

pub use config::{DEFAULT_USER_AGENT, GatewayConfig};
pub use dispatch::{DispatchError, Dispatcher};
pub use gateway::{Gateway, GatewayError, GatewayResponse, ResponseSource};
pub use mirror::{DEFAULT_MIRRORS, Mirror, MirrorError, MirrorList};
pub use retry::{DEFAULT_MAX_ATTEMPTS, MirrorOutcome, RetryEngine, classify_response};
pub use single_flight::InFlightRegistry;
pub use sleep::{JitterSource, RandomJitter, Sleeper, TokioSleeper};
pub use transport::{
    DEFAULT_TIMEOUT, HttpTransport, HttpTransportConfig, Transport, TransportBuildError,
    TransportError, UpstreamResponse,
};
