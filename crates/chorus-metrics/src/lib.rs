//! Call-latency instrumentation for the Chorus voice agent.
//!
//! The voice pipeline has four measured hops: speech detection, STT,
//! LLM inference, and TTS synthesis, ending when audio reaches the
//! caller. This crate timestamps those transitions per call, converts
//! completed calls into histogram/summary observations, keeps a bounded
//! rolling history for percentile queries, and samples host CPU/memory
//! on a fixed cadence. Everything is exported on a pull-based
//! Prometheus-format endpoint.
//!
//! # Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`LatencyRecord`] | Stage timestamps for one call, derived latencies |
//! | [`CallTracker`] | Active-call map, mark API, call finalization |
//! | [`MetricsSink`] | The fixed instrument set (histograms, counters, gauges) |
//! | [`CallHistory`] | Bounded rolling buffer + [`LatencyStats`] queries |
//! | [`run_system_sampler`] | Periodic CPU/memory gauge updates |
//! | [`MetricsExporter`] | `GET /metrics` exposition listener |
//!
//! [`MetricsRuntime`] wires all of the above together with a defined
//! construction and teardown, so nothing lives in ambient global state.
//!
//! # Usage
//!
//! ```rust,ignore
//! let runtime = MetricsRuntime::start(&MetricsConfig::default()).await?;
//! let tracker = runtime.tracker();
//!
//! tracker.start_call("call-1")?;
//! tracker.mark_stt_start("call-1")?;
//! // ... pipeline runs ...
//! tracker.end_call("call-1", QualitySample::default())?;
//!
//! runtime.shutdown().await;
//! ```

mod error;
mod exporter;
mod history;
mod record;
mod registry;
mod sampler;
mod sink;
mod tracker;

pub use error::MetricsError;
pub use exporter::MetricsExporter;
pub use history::{CallHistory, LatencyStats, HISTORY_CAPACITY, STATS_WINDOW};
pub use record::{monotonic_secs, LatencyRecord, UNSET};
pub use registry::{Counter, Gauge, Histogram, Registry, Summary};
pub use sampler::{run_system_sampler, DEFAULT_SAMPLE_INTERVAL};
pub use sink::{MetricsSink, LATENCY_TARGET_MS};
pub use tracker::{CallTracker, QualitySample, TrackError, ValidationMode};

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default exposition port.
pub const DEFAULT_METRICS_PORT: u16 = 8000;

/// Configuration for [`MetricsRuntime::start`].
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Host address the exposition listener binds to.
    pub host: IpAddr,
    /// Exposition port. Use 0 to let the OS pick (tests).
    pub port: u16,
    /// Host resource sampling period.
    pub sample_interval: Duration,
    /// Tracker validation behavior.
    pub validation: ValidationMode,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_METRICS_PORT,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            validation: ValidationMode::Lenient,
        }
    }
}

/// The assembled metrics subsystem: sink, tracker, exposition listener,
/// and system sampler, with one construction point and one teardown.
pub struct MetricsRuntime {
    tracker: Arc<CallTracker>,
    sink: Arc<MetricsSink>,
    exporter: MetricsExporter,
    sampler_shutdown: CancellationToken,
    sampler_task: JoinHandle<()>,
}

impl MetricsRuntime {
    /// Builds the sink and tracker, binds the exposition listener, and
    /// spawns the system sampler.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Bind`] if the exposition port cannot be
    /// bound. The process must not run without its scrape endpoint,
    /// even though the call path itself could.
    pub async fn start(config: &MetricsConfig) -> Result<Self, MetricsError> {
        let sink = Arc::new(MetricsSink::new());
        let tracker = Arc::new(CallTracker::with_mode(sink.clone(), config.validation));

        let addr = SocketAddr::new(config.host, config.port);
        let exporter = MetricsExporter::bind(addr, sink.registry()).await?;

        let sampler_shutdown = CancellationToken::new();
        let sampler_task = tokio::spawn(run_system_sampler(
            sink.clone(),
            config.sample_interval,
            sampler_shutdown.clone(),
        ));

        Ok(Self {
            tracker,
            sink,
            exporter,
            sampler_shutdown,
            sampler_task,
        })
    }

    /// The call tracker, shared with session-event handlers.
    pub fn tracker(&self) -> Arc<CallTracker> {
        self.tracker.clone()
    }

    /// The instrument set, for components that push gauges directly.
    pub fn sink(&self) -> Arc<MetricsSink> {
        self.sink.clone()
    }

    /// Address the exposition listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.exporter.local_addr()
    }

    /// Cancels the sampler and closes the exposition listener.
    pub async fn shutdown(self) {
        self.sampler_shutdown.cancel();
        if let Err(e) = self.sampler_task.await {
            tracing::error!("system sampler join error: {}", e);
        }
        self.exporter.shutdown().await;
        tracing::info!("metrics runtime shut down");
    }
}

#[cfg(test)]
mod tests;
