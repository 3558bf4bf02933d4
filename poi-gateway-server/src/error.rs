//! Error types emitted by the gateway CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::net::AddrParseError;
use std::sync::Arc;

use camino::Utf8PathBuf;
use poi_gateway_core::QueryRequestError;
use poi_gateway_upstream::{GatewayError, MirrorError, TransportBuildError};
use thiserror::Error;

/// Errors emitted by the gateway CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name.
        field: &'static str,
        /// Environment variable name.
        env: &'static str,
    },
    /// A numeric option must be at least one.
    #[error("{field} must be at least 1")]
    ZeroValue {
        /// Flag name.
        field: &'static str,
    },
    /// The listen address could not be parsed.
    #[error("invalid {field} address {value:?}: {source}")]
    InvalidBindAddress {
        /// Flag name.
        field: &'static str,
        /// Rejected input.
        value: String,
        /// Parser diagnostic.
        #[source]
        source: AddrParseError,
    },
    /// The mirror list could not be parsed.
    #[error("invalid {field}: {source}")]
    InvalidMirrors {
        /// Flag name.
        field: &'static str,
        /// Mirror diagnostic.
        #[source]
        source: MirrorError,
    },
    /// Constructing the HTTP client failed.
    #[error(transparent)]
    BuildTransport(#[from] TransportBuildError),
    /// The async runtime could not be started.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Binding the listen socket failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address requested.
        addr: std::net::SocketAddr,
        /// Socket error.
        #[source]
        source: std::io::Error,
    },
    /// The HTTP server stopped with an error.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
    /// Opening the query request file failed.
    #[error("failed to open query request at {path:?}: {source}")]
    OpenQueryRequest {
        /// Request file.
        path: Utf8PathBuf,
        /// IO error.
        #[source]
        source: std::io::Error,
    },
    /// Query request JSON could not be decoded.
    #[error("failed to parse query request JSON at {path:?}: {source}")]
    ParseQueryRequest {
        /// Request file.
        path: Utf8PathBuf,
        /// Decoder diagnostic.
        #[source]
        source: serde_json::Error,
    },
    /// The query request lacked required fields.
    #[error("query request in {path:?} is invalid: {source}")]
    InvalidQueryRequest {
        /// Request file.
        path: Utf8PathBuf,
        /// Validation diagnostic.
        #[source]
        source: QueryRequestError,
    },
    /// Every mirror failed and nothing was cached.
    #[error(transparent)]
    Upstream(GatewayError),
    /// Serialising the payload failed.
    #[error("failed to serialise query response: {0}")]
    SerialiseQueryResponse(#[source] serde_json::Error),
    /// Writing the payload failed.
    #[error("failed to write query output: {0}")]
    WriteQueryOutput(#[source] std::io::Error),
}
