//! `tracing` subscriber setup for binaries and services embedding the crate.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError};

fn filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "phonebill=debug,info" } else { "phonebill=info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs a compact human-readable subscriber. `RUST_LOG` overrides the
/// default level. Fails if a global subscriber is already set.
pub fn init(verbose: bool) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .try_init()
}

/// Installs a JSON subscriber for log collectors.
pub fn init_json(verbose: bool) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(tracing_subscriber::fmt::layer().with_target(false).json())
        .try_init()
}
