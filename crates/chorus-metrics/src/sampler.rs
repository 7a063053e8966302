//! Periodic host resource sampler.
//!
//! One long-running task polls CPU utilization and used memory on a
//! fixed cadence and pushes them into the sink's gauges. A failed tick
//! is logged and the loop continues on the same cadence; the task only
//! exits when its cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use sysinfo::System;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::error::MetricsError;
use crate::sink::MetricsSink;

/// Default sampling period.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// One host reading.
#[derive(Debug, Clone, Copy)]
struct HostSample {
    cpu_percent: f64,
    memory_mb: f64,
}

/// Runs the sampler until `shutdown` is cancelled.
pub async fn run_system_sampler(
    sink: Arc<MetricsSink>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut system = System::new();
    // Prime the CPU counters; utilization is a delta between refreshes,
    // so the first reading after construction is always zero.
    system.refresh_cpu_usage();

    tracing::info!(interval_secs = interval.as_secs_f64(), "starting system sampler");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::info!("system sampler stopped");
                return;
            }
            () = sleep(interval) => {}
        }

        match sample_host(&mut system) {
            Ok(sample) => {
                sink.cpu_usage_percent.set(sample.cpu_percent);
                sink.memory_usage_mb.set(sample.memory_mb);
            }
            Err(e) => {
                tracing::warn!("system sample failed: {}", e);
            }
        }
    }
}

fn sample_host(system: &mut System) -> Result<HostSample, MetricsError> {
    system.refresh_cpu_usage();
    system.refresh_memory();

    if system.cpus().is_empty() {
        return Err(MetricsError::HostStats("no CPU data reported"));
    }
    if system.total_memory() == 0 {
        return Err(MetricsError::HostStats("no memory data reported"));
    }

    Ok(HostSample {
        cpu_percent: f64::from(system.global_cpu_usage()),
        memory_mb: system.used_memory() as f64 / (1024.0 * 1024.0),
    })
}
