// Logging setup for the binary

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level; `verbose` raises the configured level to debug.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<(), TryInitError> {
	let level = if verbose { "debug" } else { config.level.as_str() };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	let registry = tracing_subscriber::registry().with(filter);

	match config.format {
		LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init(),
		LogFormat::Json => registry.with(fmt::layer().json().with_current_span(false)).try_init(),
	}
}
