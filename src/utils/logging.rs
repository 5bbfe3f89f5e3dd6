// src/utils/logging.rs
use tracing_subscriber::{fmt, EnvFilter};

// HTTP stack noise stays out of the default output.
const QUIET_DEPENDENCIES: &str = "hyper=warn,reqwest=warn";

/// Installs the global subscriber, writing to stderr so that stdout stays
/// free for piping. `RUST_LOG` wins when set; otherwise the level is `info`,
/// or `debug` for this crate when `verbose` is on.
pub fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    if installed.is_err() {
        tracing::debug!("Logging already set up, keeping the existing subscriber");
        return;
    }
    tracing::debug!("Logging setup complete.");
}

fn default_filter(verbose: bool) -> String {
    let level = if verbose { "info,sds_extractor=debug" } else { "info" };
    format!("{},{}", level, QUIET_DEPENDENCIES)
}
