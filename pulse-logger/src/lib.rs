//! Logging helper
//!
//! Used by all binaries to log consistently.
//!
//! Outside of `wasm`, the filter is read from `RUST_LOG` (defaulting to `INFO`)
//! and colors may be disabled with `RUST_LOG_COLOR=0`.
//! On `wasm`, everything is written to the browser console.

// Imports
use tracing_subscriber::{prelude::*, util::TryInitError};

/// Initializes logging.
///
/// # Panics
/// Panics if a global subscriber was already set.
pub fn init() {
	self::try_init().expect("Logging was already initialized");
}

/// Initializes logging, failing if a global subscriber was already set
pub fn try_init() -> Result<(), TryInitError> {
	let registry = tracing_subscriber::registry();

	#[cfg(not(target_family = "wasm"))]
	let registry = {
		use tracing::level_filters::LevelFilter;

		let filter = tracing_subscriber::EnvFilter::builder()
			.with_default_directive(LevelFilter::INFO.into())
			.from_env_lossy();
		let layer = tracing_subscriber::fmt::layer()
			.with_ansi(self::use_color())
			.with_filter(filter);

		registry.with(layer)
	};

	#[cfg(target_family = "wasm")]
	let registry = {
		let layer = tracing_subscriber::fmt::layer()
			.with_ansi(false)
			.without_time()
			.with_level(false)
			.with_writer(tracing_web::MakeWebConsoleWriter::new().with_pretty_level());
		registry.with(layer)
	};

	registry.try_init()?;
	tracing::debug!("Initialized logging");

	Ok(())
}

/// Returns whether to use colors, from `RUST_LOG_COLOR`.
///
/// Defaults to `true` when unset.
#[cfg(not(target_family = "wasm"))]
fn use_color() -> bool {
	std::env::var("RUST_LOG_COLOR").map_or(true, |value| self::parse_bool(&value))
}

/// Parses a boolean environment value
#[cfg_attr(target_family = "wasm", expect(dead_code, reason = "Only used outside of wasm"))]
fn parse_bool(value: &str) -> bool {
	matches!(value.trim().to_uppercase().as_str(), "1" | "YES" | "TRUE" | "ON")
}
