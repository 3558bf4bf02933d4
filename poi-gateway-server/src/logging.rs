//! Log subscriber installation.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Install a formatted subscriber honouring `RUST_LOG` (default `info`).
///
/// Output goes to stderr so that `query` can print its payload on stdout.
/// Records emitted through the `log` facade by the library crates are
/// captured as well. Calling this more than once is harmless; later calls
/// leave the first subscriber in place.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        log::debug!("log subscriber already installed");
    }
}
