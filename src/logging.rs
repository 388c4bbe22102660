//! Logging initialization.

use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogDestination;
use crate::error::PoolResult;

/// Install the global tracing subscriber for the configured destination.
///
/// Honors `RUST_LOG` when set. If a subscriber is already installed (an
/// embedding application, or an earlier test), that one wins and this
/// call is a no-op; only a failure to open the log file is an error.
pub fn init(destination: &LogDestination) -> PoolResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "dbpool=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    let result = match destination {
        LogDestination::Stderr => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogDestination::File(path) => {
            let file = File::create(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .try_init()
        }
    };
    let _ = result;
    Ok(())
}
