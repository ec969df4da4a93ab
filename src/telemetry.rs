//! telemetry
//!
//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr through `tracing`; user-facing output goes
//! through [`crate::ui::output`] and is unaffected by the filter here.
//! `REPOFLEET_LOG` takes `EnvFilter` directives and overrides the level
//! chosen from the command-line flags.

use tracing::metadata::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "REPOFLEET_LOG";

/// Install the global subscriber. Safe to call more than once; later calls
/// are no-ops.
pub fn init(debug: bool, quiet: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level(debug, quiet).into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    let layer = fmt::layer()
        .compact()
        .with_target(debug)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}

fn default_level(debug: bool, quiet: bool) -> LevelFilter {
    match (debug, quiet) {
        (true, _) => LevelFilter::DEBUG,
        (false, true) => LevelFilter::ERROR,
        (false, false) => LevelFilter::WARN,
    }
}
