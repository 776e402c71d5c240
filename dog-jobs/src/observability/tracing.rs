//! Subscriber setup for binaries that host a worker.

#[cfg(feature = "tracing-basic")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "tracing-basic")]
use crate::{QueueError, QueueResult};

/// Install a global `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// `json` switches to one JSON object per line.
#[cfg(feature = "tracing-basic")]
pub fn init_tracing(json: bool) -> QueueResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| QueueError::Internal(format!("tracing already initialized: {e}")))
}
