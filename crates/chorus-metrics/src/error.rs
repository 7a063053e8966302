//! Error types for the metrics runtime.

use std::net::SocketAddr;

/// Errors from constructing or operating the metrics runtime.
///
/// Per-call bookkeeping never produces these; only runtime construction
/// (the exposition listener bind) is allowed to fail the caller.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The exposition listener could not be bound. Fatal at startup:
    /// the process must not run without its scrape endpoint.
    #[error("failed to bind metrics listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Host resource statistics were unavailable for one sampler tick.
    #[error("host statistics unavailable: {0}")]
    HostStats(&'static str),
}
