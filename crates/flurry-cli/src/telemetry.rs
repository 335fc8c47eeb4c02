//! Log output for the `flurry` binary.
//!
//! Events are written to stderr so stdout carries nothing but IDs. The level
//! is taken from `RUST_LOG` and defaults to `warn`; use `RUST_LOG=debug` to
//! see backoffs and `RUST_LOG=trace` for a span per generated ID.

use anyhow::Context;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_file(true),
        )
        .try_init()
        .context("failed to install tracing subscriber")
}
