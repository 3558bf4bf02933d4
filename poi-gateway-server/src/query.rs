//! Query command implementation for one-shot use without a server.

use std::fs::File;
use std::io::{BufReader, Write};

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use poi_gateway_core::{CachedPayload, QueryRequest};
use poi_gateway_upstream::{Gateway, GatewayConfig};
use serde::{Deserialize, Serialize};

use crate::config::UpstreamSettings;
use crate::{
    ARG_MAX_ATTEMPTS, ARG_MIRRORS, ARG_QUERY_REQUEST, ARG_TIMEOUT_SECS, ARG_USER_AGENT, CliError,
    ENV_QUERY_REQUEST, init_logging,
};

/// CLI arguments for the `query` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Run a single POI query read from a JSON file shaped like \
                 the HTTP request body ({\"rules\": [...], \"center\": \
                 {\"lat\": .., \"lng\": ..}}) and print the upstream payload.",
    about = "Run one POI query and print the payload"
)]
#[ortho_config(prefix = "POI_GATEWAY")]
pub(crate) struct QueryArgs {
    /// Path to a JSON file containing the query request.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) request_path: Option<Utf8PathBuf>,
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
    /// `User-Agent` sent to mirrors.
    #[arg(long = ARG_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
}

impl QueryArgs {
    pub(crate) fn into_config(self) -> Result<QueryConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        QueryConfig::try_from(merged)
    }
}

/// Resolved `query` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueryConfig {
    /// Path to the JSON request file.
    pub(crate) request_path: Utf8PathBuf,
    /// Upstream settings.
    pub(crate) gateway: GatewayConfig,
}

impl TryFrom<QueryArgs> for QueryConfig {
    type Error = CliError;

    fn try_from(args: QueryArgs) -> Result<Self, Self::Error> {
        let request_path = args.request_path.ok_or(CliError::MissingArgument {
            field: ARG_QUERY_REQUEST,
            env: ENV_QUERY_REQUEST,
        })?;
        let gateway = GatewayConfig::try_from(UpstreamSettings {
            mirrors: args.mirrors,
            max_attempts: args.max_attempts,
            timeout_secs: args.timeout_secs,
            user_agent: args.user_agent,
            ..UpstreamSettings::default()
        })?;
        Ok(Self {
            request_path,
            gateway,
        })
    }
}

/// Builds the gateway used by a query invocation.
pub(super) trait QueryGatewayBuilder {
    fn build(&self, config: &GatewayConfig) -> Result<Gateway, CliError>;
}

pub(super) struct DefaultQueryGatewayBuilder;

impl QueryGatewayBuilder for DefaultQueryGatewayBuilder {
    fn build(&self, config: &GatewayConfig) -> Result<Gateway, CliError> {
        Ok(Gateway::from_config(config)?)
    }
}

pub(super) fn run_query(args: QueryArgs) -> Result<(), CliError> {
    init_logging();
    let mut stdout = std::io::stdout().lock();
    let builder = DefaultQueryGatewayBuilder;
    run_query_with(args, &builder, &mut stdout)
}

pub(super) fn run_query_with(
    args: QueryArgs,
    builder: &dyn QueryGatewayBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let payload = execute_query(args, builder)?;
    write_payload(writer, &payload)
}

fn execute_query(
    args: QueryArgs,
    builder: &dyn QueryGatewayBuilder,
) -> Result<CachedPayload, CliError> {
    let config = args.into_config()?;
    let request = load_query_request(&config.request_path)?;
    let spec = request
        .into_spec()
        .map_err(|source| CliError::InvalidQueryRequest {
            path: config.request_path.clone(),
            source,
        })?;
    let gateway = builder.build(&config.gateway)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let response = runtime
        .block_on(gateway.fetch(&spec))
        .map_err(CliError::Upstream)?;
    Ok(response.payload)
}

/// Loads a JSON-encoded [`QueryRequest`] from disk.
pub(super) fn load_query_request(path: &Utf8Path) -> Result<QueryRequest, CliError> {
    let file = File::open(path).map_err(|source| CliError::OpenQueryRequest {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|source| CliError::ParseQueryRequest {
        path: path.to_path_buf(),
        source,
    })
}

fn write_payload(writer: &mut dyn Write, payload: &CachedPayload) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(payload.as_ref()).map_err(CliError::SerialiseQueryResponse)?;
    writer
        .write_all(rendered.as_bytes())
        .map_err(CliError::WriteQueryOutput)?;
    writer
        .write_all(b"\n")
        .map_err(CliError::WriteQueryOutput)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<QueryConfig, CliError> {
    let merged = QueryArgs::merge_from_layers(layers).map_err(CliError::from)?;
    QueryConfig::try_from(merged)
}
