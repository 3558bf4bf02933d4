//! Serve command implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use log::{info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use poi_gateway_upstream::{Gateway, GatewayConfig};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::config::UpstreamSettings;
use crate::{
    ARG_BIND, ARG_CACHE_CAPACITY, ARG_COALESCE, ARG_MAX_ATTEMPTS, ARG_MIRRORS, ARG_TIMEOUT_SECS,
    ARG_USER_AGENT, AppState, CliError, init_logging, router,
};

/// Listen address used when none is configured.
pub(crate) const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// CLI arguments for the `serve` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Serve POI queries over HTTP. Cache misses are sent to the \
                 configured Overpass mirrors in order, retrying each with \
                 backoff before failing over to the next.",
    about = "Serve POI queries over HTTP"
)]
#[ortho_config(prefix = "POI_GATEWAY")]
pub(crate) struct ServeArgs {
    /// Socket address to listen on.
    #[arg(long = ARG_BIND, value_name = "addr")]
    #[serde(default)]
    pub(crate) bind: Option<String>,
    /// Comma-separated mirror URLs, consulted in order.
    #[arg(long = ARG_MIRRORS, value_name = "urls")]
    #[serde(default)]
    pub(crate) mirrors: Option<String>,
    /// Attempts made against each mirror.
    #[arg(long = ARG_MAX_ATTEMPTS, value_name = "n")]
    #[serde(default)]
    pub(crate) max_attempts: Option<u32>,
    /// Per-attempt upstream timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    /// Maximum number of cached payloads.
    #[arg(long = ARG_CACHE_CAPACITY, value_name = "n")]
    #[serde(default)]
    pub(crate) cache_capacity: Option<usize>,
    /// `User-Agent` sent to mirrors.
    #[arg(long = ARG_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
    /// Share one upstream dispatch between concurrent identical misses.
    #[arg(long = ARG_COALESCE, value_name = "bool")]
    #[serde(default)]
    pub(crate) coalesce: Option<bool>,
}

impl ServeArgs {
    pub(crate) fn into_config(self) -> Result<ServeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ServeConfig::try_from(merged)
    }
}

/// Resolved `serve` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ServeConfig {
    /// Listen address.
    pub(crate) bind: SocketAddr,
    /// Upstream and cache settings.
    pub(crate) gateway: GatewayConfig,
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = CliError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let raw_bind = args.bind.unwrap_or_else(|| DEFAULT_BIND.to_owned());
        let bind = raw_bind
            .parse()
            .map_err(|source| CliError::InvalidBindAddress {
                field: ARG_BIND,
                value: raw_bind.clone(),
                source,
            })?;
        let gateway = GatewayConfig::try_from(UpstreamSettings {
            mirrors: args.mirrors,
            max_attempts: args.max_attempts,
            timeout_secs: args.timeout_secs,
            cache_capacity: args.cache_capacity,
            user_agent: args.user_agent,
            coalesce: args.coalesce,
        })?;
        Ok(Self { bind, gateway })
    }
}

pub(super) fn run_serve(args: ServeArgs) -> Result<(), CliError> {
    init_logging();
    let config = args.into_config()?;
    let gateway = Gateway::from_config(&config.gateway)?;
    info!(
        "gateway ready: {} mirror(s), cache capacity {}, coalescing {}",
        gateway.mirror_count(),
        config.gateway.cache_capacity,
        config.gateway.coalesce
    );
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(serve(config.bind, AppState::new(Arc::new(gateway))))
}

async fn serve(addr: SocketAddr, state: AppState) -> Result<(), CliError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| CliError::Bind { addr, source })?;
    info!("listening on {addr}");
    serve_on(listener, state, shutdown_signal()).await
}

/// Serve `state` on `listener` until `shutdown` resolves.
pub(super) async fn serve_on<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
) -> Result<(), CliError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(CliError::Serve)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            warn!("cannot listen for shutdown signal: {err}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ServeConfig, CliError> {
    let merged = ServeArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ServeConfig::try_from(merged)
}
