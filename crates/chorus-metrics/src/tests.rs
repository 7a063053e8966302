//! Unit tests for the latency instrumentation core.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::history::{CallHistory, HISTORY_CAPACITY, STATS_WINDOW};
use crate::record::{monotonic_secs, LatencyRecord, UNSET};
use crate::sink::MetricsSink;
use crate::tracker::{CallTracker, QualitySample, TrackError, ValidationMode};
use crate::{MetricsConfig, MetricsError, MetricsExporter, MetricsRuntime};

fn tracker() -> CallTracker {
    CallTracker::new(Arc::new(MetricsSink::new()))
}

/// A synthetic completed record with the given end-to-end latency and
/// plausible stage timings inside it.
fn completed_record(end_to_end_ms: f64) -> LatencyRecord {
    let start = 10.0;
    LatencyRecord {
        speech_start: start,
        stt_start: start + 0.010,
        stt_end: start + 0.060,
        llm_start: start + 0.060,
        llm_end: start + 0.260,
        tts_start: start + 0.260,
        tts_end: start + 0.360,
        audio_delivered: start + end_to_end_ms / 1000.0,
    }
}

// ── LatencyRecord tests ──────────────────────────────────────────────

#[test]
fn new_record_sets_only_speech_start() {
    let record = LatencyRecord::new();

    assert!(record.speech_start > UNSET);
    assert_eq!(record.stt_start, UNSET);
    assert_eq!(record.stt_end, UNSET);
    assert_eq!(record.llm_start, UNSET);
    assert_eq!(record.llm_end, UNSET);
    assert_eq!(record.tts_start, UNSET);
    assert_eq!(record.tts_end, UNSET);
    assert_eq!(record.audio_delivered, UNSET);
}

#[test]
fn derived_latencies_are_pure_subtraction() {
    let record = completed_record(500.0);

    assert!((record.stt_latency_ms() - 50.0).abs() < 1e-9);
    assert!((record.llm_latency_ms() - 200.0).abs() < 1e-9);
    assert!((record.tts_latency_ms() - 100.0).abs() < 1e-9);
    assert!((record.end_to_end_latency_ms() - 500.0).abs() < 1e-9);
}

#[test]
fn unset_stage_yields_meaningless_latency_without_error() {
    // Only the start side was marked: the derived value is a large
    // negative number, not a panic. Callers in lenient deployments are
    // expected to know this.
    let record = LatencyRecord {
        stt_start: 5.0,
        ..LatencyRecord::default()
    };
    assert!(record.stt_latency_ms() < 0.0);
}

#[test]
fn monotonic_clock_never_goes_backwards() {
    let a = monotonic_secs();
    let b = monotonic_secs();
    assert!(b >= a);
}

#[test]
fn stt_marks_fifty_ms_apart_measure_fifty_ms() {
    let tracker = tracker();
    tracker.start_call("call-a").expect("start should succeed");

    tracker
        .mark_stt_start("call-a")
        .expect("mark should succeed");
    std::thread::sleep(Duration::from_millis(50));
    tracker.mark_stt_end("call-a").expect("mark should succeed");

    let record = tracker
        .active_record("call-a")
        .expect("call should be active");
    let stt_ms = record.stt_latency_ms();
    // Sleep guarantees at least 50ms; allow generous headroom for a
    // loaded test host.
    assert!(
        (45.0..150.0).contains(&stt_ms),
        "stt latency {stt_ms}ms out of range"
    );
}

// ── CallTracker lifecycle tests ──────────────────────────────────────

#[test]
fn marks_for_unknown_call_are_noops() {
    let tracker = tracker();

    tracker
        .mark_stt_start("ghost")
        .expect("lenient mark should not error");
    tracker
        .mark_audio_delivered("ghost")
        .expect("lenient mark should not error");
    tracker
        .end_call("ghost", QualitySample::default())
        .expect("lenient end should not error");

    assert_eq!(tracker.active_call_count(), 0);
    assert_eq!(tracker.history_len(), 0);
}

#[test]
fn immediate_end_measures_wall_time_between_start_and_end() {
    let tracker = tracker();

    let before = monotonic_secs();
    tracker.start_call("quick").expect("start should succeed");
    tracker
        .mark_audio_delivered("quick")
        .expect("mark should succeed");
    tracker
        .end_call("quick", QualitySample::default())
        .expect("end should succeed");
    let after = monotonic_secs();

    let record = tracker.latest_completed().expect("history should hold it");
    let e2e = record.end_to_end_latency_ms();
    assert!(e2e >= 0.0);
    assert!(e2e <= (after - before) * 1000.0);

    // Nothing else was marked: the six stage timestamps stay at the
    // sentinel, so the stage latencies are all exactly zero here.
    assert_eq!(record.stt_start, UNSET);
    assert_eq!(record.llm_end, UNSET);
    assert_eq!(record.tts_end, UNSET);
}

#[test]
fn end_without_audio_delivered_mark_yields_negative_e2e() {
    let sink = Arc::new(MetricsSink::new());
    let tracker = CallTracker::new(sink.clone());

    tracker.start_call("silent").expect("start");
    tracker
        .end_call("silent", QualitySample::default())
        .expect("end");

    // `audio_delivered` stayed at the sentinel, so the derived value is
    // `(0 - speech_start) * 1000`: a negative number, observed without
    // validation. It even counts as meeting the target, since any
    // negative value is under 600. Strict mode exists for callers who
    // cannot live with this.
    let record = tracker.latest_completed().expect("history should hold it");
    assert!(record.end_to_end_latency_ms() <= 0.0);
    assert_eq!(sink.latency_target_met.get(), 1);
}

#[test]
fn ended_call_moves_from_active_to_history() {
    let tracker = tracker();

    tracker.start_call("call-1").expect("start should succeed");
    assert_eq!(tracker.active_call_count(), 1);

    tracker
        .end_call("call-1", QualitySample::default())
        .expect("end should succeed");

    assert_eq!(tracker.active_call_count(), 0);
    assert_eq!(tracker.history_len(), 1);
}

#[test]
fn active_count_tracks_started_minus_ended() {
    let tracker = tracker();

    tracker.start_call("x").expect("start");
    tracker.mark_llm_start("x").expect("mark");
    tracker.start_call("y").expect("start");
    assert_eq!(tracker.active_call_count(), 2);

    tracker.end_call("x", QualitySample::default()).expect("end");
    assert_eq!(tracker.active_call_count(), 1);

    // A second end for the same id is a no-op and must not disturb the
    // invariant.
    tracker.end_call("x", QualitySample::default()).expect("end");
    assert_eq!(tracker.active_call_count(), 1);

    tracker.end_call("y", QualitySample::default()).expect("end");
    assert_eq!(tracker.active_call_count(), 0);
}

#[test]
fn duplicate_start_replaces_record_in_lenient_mode() {
    let sink = Arc::new(MetricsSink::new());
    let tracker = CallTracker::new(sink.clone());

    tracker.start_call("dup").expect("start");
    tracker.start_call("dup").expect("lenient duplicate start");

    assert_eq!(tracker.active_call_count(), 1);
    // Both starts count toward the call total even though one record
    // was discarded.
    assert_eq!(sink.total_calls.get(), 2);
}

#[test]
fn strict_mode_rejects_unknown_ids_and_duplicates() {
    let tracker =
        CallTracker::with_mode(Arc::new(MetricsSink::new()), ValidationMode::Strict);

    match tracker.mark_stt_start("ghost") {
        Err(TrackError::StaleOrMissingMark(id)) => assert_eq!(id, "ghost"),
        other => panic!("expected StaleOrMissingMark, got {other:?}"),
    }
    match tracker.end_call("ghost", QualitySample::default()) {
        Err(TrackError::StaleOrMissingMark(_)) => {}
        other => panic!("expected StaleOrMissingMark, got {other:?}"),
    }

    tracker.start_call("dup").expect("first start");
    match tracker.start_call("dup") {
        Err(TrackError::DuplicateCall(id)) => assert_eq!(id, "dup"),
        other => panic!("expected DuplicateCall, got {other:?}"),
    }
    // The rejected duplicate must not have clobbered the active record.
    assert_eq!(tracker.active_call_count(), 1);
}

#[test]
fn failed_call_setup_is_a_pure_counter() {
    let sink = Arc::new(MetricsSink::new());
    let tracker = CallTracker::new(sink.clone());

    tracker.record_failed_call_setup();
    tracker.record_failed_call_setup();

    assert_eq!(sink.failed_call_setup.get(), 2);
    assert_eq!(tracker.active_call_count(), 0);
}

// ── Finalization and sink observation tests ──────────────────────────

#[test]
fn hundred_calls_under_target_all_count_as_met() {
    let sink = Arc::new(MetricsSink::new());
    let tracker = CallTracker::new(sink.clone());

    for i in 0..100 {
        tracker.finalize(
            &format!("call-{i}"),
            completed_record(500.0),
            QualitySample::default(),
        );
    }

    assert_eq!(sink.latency_target_met.get(), 100);
    assert_eq!(sink.latency_target_missed.get(), 0);
    assert_eq!(sink.end_to_end_latency.count(), 100);

    let stats = tracker.latency_stats();
    assert_eq!(stats.sample_count, 100);
    assert_eq!(stats.target_met_percentage, 100.0);
    assert!((stats.avg_latency_ms - 500.0).abs() < 1e-6);
    assert!((stats.p95_latency_ms - 500.0).abs() < 1e-6);
}

#[test]
fn target_boundary_is_strictly_less_than() {
    let sink = Arc::new(MetricsSink::new());
    let tracker = CallTracker::new(sink.clone());

    // Exactly 600ms misses the target.
    tracker.finalize("edge", completed_record(600.0), QualitySample::default());
    assert_eq!(sink.latency_target_met.get(), 0);
    assert_eq!(sink.latency_target_missed.get(), 1);

    tracker.finalize("fast", completed_record(599.0), QualitySample::default());
    assert_eq!(sink.latency_target_met.get(), 1);
}

#[test]
fn quality_sample_observed_once_per_instrument() {
    let sink = Arc::new(MetricsSink::new());
    let tracker = CallTracker::new(sink.clone());

    tracker.finalize(
        "q",
        completed_record(400.0),
        QualitySample {
            mos_score: Some(4.2),
            jitter_ms: Some(15.0),
            packet_loss_rate: Some(0.1),
        },
    );

    assert_eq!(sink.mos_score.count(), 1);
    assert!((sink.mos_score.sum() - 4.2).abs() < 1e-9);
    assert_eq!(sink.jitter_ms.count(), 1);
    assert_eq!(sink.packet_loss_rate.count(), 1);
}

#[test]
fn absent_quality_values_are_not_observed() {
    let sink = Arc::new(MetricsSink::new());
    let tracker = CallTracker::new(sink.clone());

    tracker.finalize(
        "nq",
        completed_record(400.0),
        QualitySample {
            mos_score: Some(3.5),
            jitter_ms: None,
            packet_loss_rate: None,
        },
    );

    assert_eq!(sink.mos_score.count(), 1);
    assert_eq!(sink.jitter_ms.count(), 0);
    assert_eq!(sink.packet_loss_rate.count(), 0);
}

#[test]
fn summaries_mirror_end_to_end_observations() {
    let sink = Arc::new(MetricsSink::new());
    let tracker = CallTracker::new(sink.clone());

    tracker.finalize("a", completed_record(300.0), QualitySample::default());
    tracker.finalize("b", completed_record(500.0), QualitySample::default());

    assert_eq!(sink.response_time_avg.count(), 2);
    assert_eq!(sink.response_time_95p.count(), 2);
    assert!((sink.response_time_avg.sum() - 800.0).abs() < 1e-6);
}

// ── History tests ────────────────────────────────────────────────────

#[test]
fn history_evicts_exactly_the_oldest_at_capacity() {
    let mut history = CallHistory::new();

    for i in 0..HISTORY_CAPACITY {
        history.push(completed_record(100.0 + i as f64));
    }
    assert_eq!(history.len(), HISTORY_CAPACITY);
    let oldest_e2e = history
        .oldest()
        .expect("history is non-empty")
        .end_to_end_latency_ms();
    assert!((oldest_e2e - 100.0).abs() < 1e-6);

    // Entry 1001 evicts record 0 and nothing else.
    history.push(completed_record(9999.0));
    assert_eq!(history.len(), HISTORY_CAPACITY);
    let oldest_e2e = history
        .oldest()
        .expect("history is non-empty")
        .end_to_end_latency_ms();
    assert!((oldest_e2e - 101.0).abs() < 1e-6);
    let latest_e2e = history
        .latest()
        .expect("history is non-empty")
        .end_to_end_latency_ms();
    assert!((latest_e2e - 9999.0).abs() < 1e-6);
}

#[test]
fn empty_history_yields_zero_stats_without_error() {
    let history = CallHistory::new();
    let stats = history.latency_stats();

    assert_eq!(stats.sample_count, 0);
    assert_eq!(stats.avg_latency_ms, 0.0);
    assert_eq!(stats.p95_latency_ms, 0.0);
    assert_eq!(stats.p99_latency_ms, 0.0);
    assert_eq!(stats.min_latency_ms, 0.0);
    assert_eq!(stats.max_latency_ms, 0.0);
    assert_eq!(stats.target_met_percentage, 0.0);
}

#[test]
fn stats_window_covers_only_the_most_recent_hundred() {
    let mut history = CallHistory::new();

    // 50 slow calls followed by 100 fast ones: the slow batch must fall
    // outside the window entirely.
    for _ in 0..50 {
        history.push(completed_record(5000.0));
    }
    for _ in 0..STATS_WINDOW {
        history.push(completed_record(200.0));
    }

    let stats = history.latency_stats();
    assert_eq!(stats.sample_count, STATS_WINDOW);
    assert!((stats.max_latency_ms - 200.0).abs() < 1e-6);
    assert_eq!(stats.target_met_percentage, 100.0);
}

#[test]
fn percentiles_use_floor_index_without_interpolation() {
    let mut history = CallHistory::new();
    // Latencies 1..=10 ms. n=10: p95 index = floor(9.5) = 9 (the max),
    // p99 index = floor(9.9) = 9.
    for i in 1..=10 {
        history.push(completed_record(f64::from(i)));
    }

    let stats = history.latency_stats();
    assert!((stats.p95_latency_ms - 10.0).abs() < 1e-6);
    assert!((stats.p99_latency_ms - 10.0).abs() < 1e-6);
    assert!((stats.min_latency_ms - 1.0).abs() < 1e-6);
    assert!((stats.avg_latency_ms - 5.5).abs() < 1e-6);
}

#[test]
fn stats_mix_of_met_and_missed_targets() {
    let mut history = CallHistory::new();
    for _ in 0..75 {
        history.push(completed_record(400.0));
    }
    for _ in 0..25 {
        history.push(completed_record(900.0));
    }

    let stats = history.latency_stats();
    assert_eq!(stats.target_met_percentage, 75.0);
    assert!((stats.p95_latency_ms - 900.0).abs() < 1e-6);
}

// ── Registry / exposition format tests ───────────────────────────────

#[test]
fn render_includes_every_instrument_family() {
    let sink = MetricsSink::new();
    let text = sink.registry().render();

    for name in [
        "voice_agent_end_to_end_latency_ms",
        "voice_agent_stt_latency_ms",
        "voice_agent_llm_latency_ms",
        "voice_agent_tts_latency_ms",
        "voice_agent_mos_score",
        "voice_agent_jitter_ms",
        "voice_agent_packet_loss_rate",
        "voice_agent_total_calls",
        "voice_agent_failed_call_setup",
        "voice_agent_latency_target_met",
        "voice_agent_latency_target_missed",
        "voice_agent_active_calls",
        "voice_agent_cpu_usage_percent",
        "voice_agent_memory_usage_mb",
        "voice_agent_response_time_avg_ms",
        "voice_agent_response_time_95p_ms",
    ] {
        assert!(
            text.contains(&format!("# TYPE {name} ")),
            "missing TYPE line for {name}"
        );
    }
}

#[test]
fn histogram_renders_cumulative_buckets() {
    let sink = MetricsSink::new();
    sink.stt_latency.observe(15.0);
    sink.stt_latency.observe(15.0);
    sink.stt_latency.observe(90.0);
    sink.stt_latency.observe(5000.0); // beyond the largest finite bound

    let text = sink.registry().render();

    assert!(text.contains("voice_agent_stt_latency_ms_bucket{le=\"10\"} 0"));
    assert!(text.contains("voice_agent_stt_latency_ms_bucket{le=\"20\"} 2"));
    assert!(text.contains("voice_agent_stt_latency_ms_bucket{le=\"100\"} 3"));
    assert!(text.contains("voice_agent_stt_latency_ms_bucket{le=\"1000\"} 3"));
    assert!(text.contains("voice_agent_stt_latency_ms_bucket{le=\"+Inf\"} 4"));
    assert!(text.contains("voice_agent_stt_latency_ms_count 4"));
}

#[test]
fn counter_and_gauge_render_current_values() {
    let sink = MetricsSink::new();
    sink.total_calls.inc();
    sink.total_calls.inc();
    sink.active_calls.set(3.0);
    sink.cpu_usage_percent.set(12.5);

    let text = sink.registry().render();
    assert!(text.contains("voice_agent_total_calls 2\n"));
    assert!(text.contains("voice_agent_active_calls 3\n"));
    assert!(text.contains("voice_agent_cpu_usage_percent 12.5\n"));
}

// ── Exporter tests ───────────────────────────────────────────────────

#[tokio::test]
async fn metrics_endpoint_serves_exposition_text() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    let sink = MetricsSink::new();
    sink.total_calls.inc();
    let app = crate::exporter::app(sink.registry());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("request should succeed");

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let text = String::from_utf8(body.to_vec()).expect("body should be utf-8");
    assert!(text.contains("voice_agent_total_calls 1"));
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    let sink = MetricsSink::new();
    let app = crate::exporter::app(sink.registry());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("request should succeed");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn binding_an_occupied_port_is_fatal() {
    let sink = MetricsSink::new();
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);

    let first = MetricsExporter::bind(addr, sink.registry())
        .await
        .expect("first bind should succeed");

    let second = MetricsExporter::bind(first.local_addr(), sink.registry()).await;
    match second {
        Err(MetricsError::Bind { .. }) => {}
        Ok(_) => panic!("second bind on the same port should fail"),
        Err(other) => panic!("expected Bind error, got {other:?}"),
    }

    first.shutdown().await;
}

// ── Sampler / runtime tests ──────────────────────────────────────────

#[tokio::test]
async fn sampler_pushes_gauges_and_stops_on_cancel() {
    let sink = Arc::new(MetricsSink::new());
    let shutdown = CancellationToken::new();

    let task = tokio::spawn(crate::sampler::run_system_sampler(
        sink.clone(),
        Duration::from_millis(10),
        shutdown.clone(),
    ));

    // Let a few ticks land.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sink.memory_usage_mb.get() > 0.0);
    assert!(sink.cpu_usage_percent.get() >= 0.0);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("sampler should stop promptly after cancel")
        .expect("sampler task should not panic");
}

#[tokio::test]
async fn runtime_starts_and_shuts_down_cleanly() {
    let config = MetricsConfig {
        port: 0,
        sample_interval: Duration::from_millis(20),
        ..MetricsConfig::default()
    };

    let runtime = MetricsRuntime::start(&config)
        .await
        .expect("runtime should start on an ephemeral port");
    let tracker = runtime.tracker();

    tracker.start_call("rt-call").expect("start");
    tracker
        .mark_audio_delivered("rt-call")
        .expect("mark");
    tracker
        .end_call("rt-call", QualitySample::default())
        .expect("end");
    assert_eq!(tracker.history_len(), 1);

    tokio::time::timeout(Duration::from_secs(5), runtime.shutdown())
        .await
        .expect("shutdown should not hang");
}
