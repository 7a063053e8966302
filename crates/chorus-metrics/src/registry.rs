//! Typed metric instruments and Prometheus text exposition.
//!
//! Instruments are registered once at sink construction and live for the
//! process lifetime. All hot-path updates (`inc`, `set`, `observe`) are
//! lock-free atomic operations so the call-handling path never blocks on
//! a render in progress.
//!
//! [`Registry::render`] produces the text exposition format (0.0.4):
//! `# HELP` / `# TYPE` lines followed by samples, with cumulative `le`
//! buckets plus `_sum` and `_count` series for histograms.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Adds `v` to an `f64` accumulator stored as bits in an `AtomicU64`.
fn atomic_f64_add(cell: &AtomicU64, v: f64) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = (f64::from_bits(current) + v).to_bits();
        match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

/// Monotonically increasing event counter.
pub struct Counter {
    name: &'static str,
    help: &'static str,
    value: AtomicU64,
}

impl Counter {
    fn new(name: &'static str, help: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            help,
            value: AtomicU64::new(0),
        })
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    fn render(&self, out: &mut String) {
        header(out, self.name, self.help, "counter");
        out.push_str(&format!("{} {}\n", self.name, self.get()));
    }
}

/// Instantaneous value that can move in either direction.
pub struct Gauge {
    name: &'static str,
    help: &'static str,
    bits: AtomicU64,
}

impl Gauge {
    fn new(name: &'static str, help: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            help,
            bits: AtomicU64::new(0.0f64.to_bits()),
        })
    }

    pub fn set(&self, v: f64) {
        self.bits.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    fn render(&self, out: &mut String) {
        header(out, self.name, self.help, "gauge");
        out.push_str(&format!("{} {}\n", self.name, self.get()));
    }
}

/// Fixed-bucket distribution of observed values.
///
/// Bucket counts are stored per-band and accumulated into the cumulative
/// `le` form only at render time, so `observe` touches exactly one bucket.
pub struct Histogram {
    name: &'static str,
    help: &'static str,
    /// Finite upper bounds, ascending. The `+Inf` bucket is implicit.
    bounds: Vec<f64>,
    buckets: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    fn new(name: &'static str, help: &'static str, bounds: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            name,
            help,
            bounds: bounds.to_vec(),
            buckets: bounds.iter().map(|_| AtomicU64::new(0)).collect(),
            sum: AtomicU64::new(0.0f64.to_bits()),
            count: AtomicU64::new(0),
        })
    }

    /// Records one observation. Values above the largest finite bound
    /// land only in the implicit `+Inf` bucket.
    pub fn observe(&self, v: f64) {
        if let Some(band) = self.bounds.iter().position(|b| v <= *b) {
            self.buckets[band].fetch_add(1, Ordering::Relaxed);
        }
        atomic_f64_add(&self.sum, v);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> f64 {
        f64::from_bits(self.sum.load(Ordering::Relaxed))
    }

    fn render(&self, out: &mut String) {
        header(out, self.name, self.help, "histogram");
        let mut cumulative = 0u64;
        for (bound, bucket) in self.bounds.iter().zip(&self.buckets) {
            cumulative += bucket.load(Ordering::Relaxed);
            out.push_str(&format!(
                "{}_bucket{{le=\"{}\"}} {}\n",
                self.name, bound, cumulative
            ));
        }
        let total = self.count();
        out.push_str(&format!("{}_bucket{{le=\"+Inf\"}} {}\n", self.name, total));
        out.push_str(&format!("{}_sum {}\n", self.name, self.sum()));
        out.push_str(&format!("{}_count {}\n", self.name, total));
    }
}

/// Sum/count summary with no quantile tracking. Kept as a coarser
/// parallel view of series that also feed a histogram.
pub struct Summary {
    name: &'static str,
    help: &'static str,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Summary {
    fn new(name: &'static str, help: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            help,
            sum: AtomicU64::new(0.0f64.to_bits()),
            count: AtomicU64::new(0),
        })
    }

    pub fn observe(&self, v: f64) {
        atomic_f64_add(&self.sum, v);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> f64 {
        f64::from_bits(self.sum.load(Ordering::Relaxed))
    }

    fn render(&self, out: &mut String) {
        header(out, self.name, self.help, "summary");
        out.push_str(&format!("{}_sum {}\n", self.name, self.sum()));
        out.push_str(&format!("{}_count {}\n", self.name, self.count()));
    }
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} {kind}\n"));
}

enum Instrument {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    Histogram(Arc<Histogram>),
    Summary(Arc<Summary>),
}

/// Registry of every instrument exposed on the scrape endpoint.
///
/// Built once during sink construction and immutable afterwards; handed
/// to the exposition server as an `Arc`.
#[derive(Default)]
pub struct Registry {
    instruments: Vec<Instrument>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&mut self, name: &'static str, help: &'static str) -> Arc<Counter> {
        let counter = Counter::new(name, help);
        self.instruments.push(Instrument::Counter(counter.clone()));
        counter
    }

    pub fn gauge(&mut self, name: &'static str, help: &'static str) -> Arc<Gauge> {
        let gauge = Gauge::new(name, help);
        self.instruments.push(Instrument::Gauge(gauge.clone()));
        gauge
    }

    pub fn histogram(
        &mut self,
        name: &'static str,
        help: &'static str,
        bounds: &[f64],
    ) -> Arc<Histogram> {
        let histogram = Histogram::new(name, help, bounds);
        self.instruments
            .push(Instrument::Histogram(histogram.clone()));
        histogram
    }

    pub fn summary(&mut self, name: &'static str, help: &'static str) -> Arc<Summary> {
        let summary = Summary::new(name, help);
        self.instruments.push(Instrument::Summary(summary.clone()));
        summary
    }

    /// Renders the full exposition document.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for instrument in &self.instruments {
            match instrument {
                Instrument::Counter(c) => c.render(&mut out),
                Instrument::Gauge(g) => g.render(&mut out),
                Instrument::Histogram(h) => h.render(&mut out),
                Instrument::Summary(s) => s.render(&mut out),
            }
        }
        out
    }
}
