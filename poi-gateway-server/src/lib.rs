//! HTTP front end and command-line interface for the POI gateway.
//!
//! `serve` exposes the gateway over HTTP; `query` runs a single request read
//! from a JSON file and prints the payload. Both resolve their settings from
//! CLI flags, environment variables, and configuration files through
//! `ortho_config`.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod config;
mod error;
mod logging;
mod query;
mod routes;
mod serve;

pub use error::CliError;
pub use logging::init_logging;
pub use routes::{AppState, router};

pub(crate) const ARG_BIND: &str = "bind";
pub(crate) const ARG_MIRRORS: &str = "mirrors";
pub(crate) const ARG_MAX_ATTEMPTS: &str = "max-attempts";
pub(crate) const ARG_TIMEOUT_SECS: &str = "timeout-secs";
pub(crate) const ARG_CACHE_CAPACITY: &str = "cache-capacity";
pub(crate) const ARG_USER_AGENT: &str = "user-agent";
pub(crate) const ARG_COALESCE: &str = "coalesce";
pub(crate) const ARG_QUERY_REQUEST: &str = "request";
pub(crate) const ENV_QUERY_REQUEST: &str = "POI_GATEWAY_CMDS_QUERY_REQUEST_PATH";

/// Run the gateway CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when arguments or configuration are invalid, the
/// server cannot start, or a one-shot query fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Serve(args) => serve::run_serve(args),
        Command::Query(args) => query::run_query(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "poi-gateway",
    about = "Caching, failover gateway for Overpass POI queries",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve POI queries over HTTP.
    Serve(serve::ServeArgs),
    /// Run one query from a JSON file and print the payload.
    Query(query::QueryArgs),
}

#[cfg(test)]
mod tests;
