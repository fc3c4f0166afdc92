// Copyright 2023-2025 Irreducible Inc.

/// Installs a global `tracing` subscriber printing formatted events.
///
/// The filter is taken from `RUST_LOG` and defaults to `info`. Calling this more than once is
/// harmless: later calls leave the first subscriber in place.
pub fn init_tracing() {
	use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let _ = tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().with_test_writer())
		.try_init();
}
