//! The fixed set of instruments the pipeline reports into.
//!
//! Every instrument is created and registered exactly once, at sink
//! construction. Bucket boundaries bracket the expected range of each
//! series: stage latencies cluster well under a second, LLM inference is
//! the long tail, and quality figures (MOS, jitter, packet loss) have
//! their own natural scales.

use std::sync::Arc;

use crate::registry::{Counter, Gauge, Histogram, Registry, Summary};

/// End-to-end latency SLA threshold in milliseconds. Calls strictly under
/// this value count as meeting the target.
pub const LATENCY_TARGET_MS: f64 = 600.0;

/// Typed handles to every exported instrument.
pub struct MetricsSink {
    pub end_to_end_latency: Arc<Histogram>,
    pub stt_latency: Arc<Histogram>,
    pub llm_latency: Arc<Histogram>,
    pub tts_latency: Arc<Histogram>,
    pub mos_score: Arc<Histogram>,
    pub jitter_ms: Arc<Histogram>,
    pub packet_loss_rate: Arc<Histogram>,
    pub total_calls: Arc<Counter>,
    pub failed_call_setup: Arc<Counter>,
    pub latency_target_met: Arc<Counter>,
    pub latency_target_missed: Arc<Counter>,
    pub active_calls: Arc<Gauge>,
    pub cpu_usage_percent: Arc<Gauge>,
    pub memory_usage_mb: Arc<Gauge>,
    pub response_time_avg: Arc<Summary>,
    pub response_time_95p: Arc<Summary>,
    registry: Arc<Registry>,
}

impl MetricsSink {
    pub fn new() -> Self {
        let mut registry = Registry::new();

        let end_to_end_latency = registry.histogram(
            "voice_agent_end_to_end_latency_ms",
            "End-to-end latency from speech to audio delivery",
            &[
                50.0, 100.0, 200.0, 300.0, 400.0, 500.0, 600.0, 800.0, 1000.0, 1500.0, 2000.0,
            ],
        );
        let stt_latency = registry.histogram(
            "voice_agent_stt_latency_ms",
            "Speech-to-text processing latency",
            &[10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0],
        );
        let llm_latency = registry.histogram(
            "voice_agent_llm_latency_ms",
            "LLM processing latency",
            &[50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0],
        );
        let tts_latency = registry.histogram(
            "voice_agent_tts_latency_ms",
            "Text-to-speech processing latency",
            &[50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0],
        );

        let response_time_95p = registry.summary(
            "voice_agent_response_time_95p_ms",
            "95th percentile response time",
        );
        let response_time_avg =
            registry.summary("voice_agent_response_time_avg_ms", "Average response time");

        let total_calls = registry.counter(
            "voice_agent_total_calls",
            "Total number of calls processed",
        );
        let failed_call_setup = registry.counter(
            "voice_agent_failed_call_setup",
            "Number of failed call setups",
        );
        let active_calls = registry.gauge(
            "voice_agent_active_calls",
            "Number of currently active calls",
        );

        let mos_score = registry.histogram(
            "voice_agent_mos_score",
            "Mean Opinion Score for audio quality",
            &[1.0, 2.0, 3.0, 4.0, 5.0],
        );
        let jitter_ms = registry.histogram(
            "voice_agent_jitter_ms",
            "Audio jitter in milliseconds",
            &[0.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0],
        );
        let packet_loss_rate = registry.histogram(
            "voice_agent_packet_loss_rate",
            "Packet loss rate as percentage",
            &[0.0, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0],
        );

        let cpu_usage_percent =
            registry.gauge("voice_agent_cpu_usage_percent", "CPU usage percentage");
        let memory_usage_mb = registry.gauge("voice_agent_memory_usage_mb", "Memory usage in MB");

        let latency_target_met = registry.counter(
            "voice_agent_latency_target_met",
            "Number of calls meeting <600ms latency target",
        );
        let latency_target_missed = registry.counter(
            "voice_agent_latency_target_missed",
            "Number of calls missing <600ms latency target",
        );

        Self {
            end_to_end_latency,
            stt_latency,
            llm_latency,
            tts_latency,
            mos_score,
            jitter_ms,
            packet_loss_rate,
            total_calls,
            failed_call_setup,
            latency_target_met,
            latency_target_missed,
            active_calls,
            cpu_usage_percent,
            memory_usage_mb,
            response_time_avg,
            response_time_95p,
            registry: Arc::new(registry),
        }
    }

    /// The registry backing the exposition endpoint.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}

impl Default for MetricsSink {
    fn default() -> Self {
        Self::new()
    }
}
