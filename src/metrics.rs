//! In-memory metrics with Prometheus text exposition.
//!
//! Series are identified by name plus label set; label order does not
//! matter. The collector only accumulates: nothing is exported unless a
//! handler asks for it.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use parking_lot::Mutex;
use serde::Serialize;

pub const REQUESTS_TOTAL: &str = "weather_requests_total";
pub const CACHE_HITS_TOTAL: &str = "weather_cache_hits_total";
pub const CACHE_MISSES_TOTAL: &str = "weather_cache_misses_total";
pub const UPSTREAM_CALLS_TOTAL: &str = "weather_upstream_calls_total";
pub const RETRIES_TOTAL: &str = "weather_retries_total";
pub const FALLBACK_TOTAL: &str = "weather_fallback_total";
pub const CIRCUIT_STATE: &str = "weather_circuit_state";
pub const CACHE_ENTRIES: &str = "weather_cache_entries";
pub const UPSTREAM_DURATION_MS: &str = "weather_upstream_duration_ms";

/// Upper bounds of the latency histogram in milliseconds. `+Inf` is implicit.
pub const HISTOGRAM_BUCKETS: [f64; 8] = [
    50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
];

type LabelSet = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SeriesKey {
    name: String,
    labels: LabelSet,
}

impl SeriesKey {
    fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        let mut labels: LabelSet = labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        labels.sort();
        Self {
            name: name.to_string(),
            labels,
        }
    }

    fn matches(&self, name: &str, filter: &[(&str, &str)]) -> bool {
        self.name == name
            && filter
                .iter()
                .all(|(k, v)| self.labels.iter().any(|(lk, lv)| lk == k && lv == v))
    }
}

#[derive(Debug, Clone)]
struct Histogram {
    /// Per-bucket counts (not cumulative); the last slot is `+Inf`.
    counts: [u64; HISTOGRAM_BUCKETS.len() + 1],
    sum: f64,
    count: u64,
}

impl Histogram {
    fn new() -> Self {
        Self {
            counts: [0; HISTOGRAM_BUCKETS.len() + 1],
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        let slot = HISTOGRAM_BUCKETS
            .iter()
            .position(|bound| value <= *bound)
            .unwrap_or(HISTOGRAM_BUCKETS.len());
        self.counts[slot] += 1;
        self.sum += value;
        self.count += 1;
    }

    fn cumulative(&self) -> Vec<(String, u64)> {
        let mut running = 0;
        self.counts
            .iter()
            .enumerate()
            .map(|(i, n)| {
                running += n;
                let le = HISTOGRAM_BUCKETS
                    .get(i)
                    .map_or_else(|| "+Inf".to_string(), ToString::to_string);
                (le, running)
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
enum Series {
    Counter(f64),
    Gauge(f64),
    Histogram(Histogram),
}

impl Series {
    const fn type_name(&self) -> &'static str {
        match self {
            Self::Counter(_) => "counter",
            Self::Gauge(_) => "gauge",
            Self::Histogram(_) => "histogram",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleValue {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramBucket {
    pub le: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramSample {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub buckets: Vec<HistogramBucket>,
    pub sum: f64,
    pub count: u64,
}

/// JSON view of every tracked series.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub counters: Vec<SampleValue>,
    pub gauges: Vec<SampleValue>,
    pub histograms: Vec<HistogramSample>,
}

/// Headline numbers embedded in the weather health report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub stale_served: u64,
    pub errors: u64,
    pub upstream_calls: u64,
    pub retries: u64,
    pub fallbacks: u64,
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    series: Mutex<BTreeMap<SeriesKey, Series>>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        self.add_counter(name, 1.0, labels);
    }

    pub fn add_counter(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let key = SeriesKey::new(name, labels);
        let mut series = self.series.lock();
        match series.get_mut(&key) {
            Some(Series::Counter(total)) => *total += value,
            _ => {
                series.insert(key, Series::Counter(value));
            }
        }
    }

    pub fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.series
            .lock()
            .insert(SeriesKey::new(name, labels), Series::Gauge(value));
    }

    pub fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let key = SeriesKey::new(name, labels);
        let mut series = self.series.lock();
        if let Some(Series::Histogram(h)) = series.get_mut(&key) {
            h.observe(value);
            return;
        }
        let mut h = Histogram::new();
        h.observe(value);
        series.insert(key, Series::Histogram(h));
    }

    /// Sum of a counter across every label set.
    #[must_use]
    pub fn counter_total(&self, name: &str) -> f64 {
        self.counter_matching(name, &[])
    }

    /// Sum of a counter across label sets containing every pair in `filter`.
    #[must_use]
    pub fn counter_matching(&self, name: &str, filter: &[(&str, &str)]) -> f64 {
        self.series
            .lock()
            .iter()
            .filter(|(key, _)| key.matches(name, filter))
            .filter_map(|(_, s)| match s {
                Series::Counter(v) => Some(*v),
                _ => None,
            })
            .sum()
    }

    #[must_use]
    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        match self.series.lock().get(&SeriesKey::new(name, labels)) {
            Some(Series::Gauge(v)) => Some(*v),
            _ => None,
        }
    }

    /// Render every series in the Prometheus text exposition format.
    #[must_use]
    pub fn export_prometheus(&self) -> String {
        let series = self.series.lock();
        let mut out = String::new();
        let mut current_name: Option<&str> = None;

        for (key, value) in series.iter() {
            if current_name != Some(key.name.as_str()) {
                let _ = writeln!(out, "# TYPE {} {}", key.name, value.type_name());
                current_name = Some(key.name.as_str());
            }
            match value {
                Series::Counter(v) | Series::Gauge(v) => {
                    let _ = writeln!(out, "{}{} {}", key.name, render_labels(&key.labels, None), v);
                }
                Series::Histogram(h) => {
                    for (le, count) in h.cumulative() {
                        let _ = writeln!(
                            out,
                            "{}_bucket{} {}",
                            key.name,
                            render_labels(&key.labels, Some(&le)),
                            count
                        );
                    }
                    let labels = render_labels(&key.labels, None);
                    let _ = writeln!(out, "{}_sum{} {}", key.name, labels, h.sum);
                    let _ = writeln!(out, "{}_count{} {}", key.name, labels, h.count);
                }
            }
        }
        out
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let series = self.series.lock();
        let mut snapshot = MetricsSnapshot::default();
        for (key, value) in series.iter() {
            let labels: BTreeMap<String, String> = key.labels.iter().cloned().collect();
            match value {
                Series::Counter(v) => snapshot.counters.push(SampleValue {
                    name: key.name.clone(),
                    labels,
                    value: *v,
                }),
                Series::Gauge(v) => snapshot.gauges.push(SampleValue {
                    name: key.name.clone(),
                    labels,
                    value: *v,
                }),
                Series::Histogram(h) => snapshot.histograms.push(HistogramSample {
                    name: key.name.clone(),
                    labels,
                    buckets: h
                        .cumulative()
                        .into_iter()
                        .map(|(le, count)| HistogramBucket { le, count })
                        .collect(),
                    sum: h.sum,
                    count: h.count,
                }),
            }
        }
        snapshot
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn summary(&self) -> MetricsSummary {
        let count = |name: &str, filter: &[(&str, &str)]| self.counter_matching(name, filter) as u64;
        MetricsSummary {
            total_requests: count(REQUESTS_TOTAL, &[]),
            cache_hits: count(CACHE_HITS_TOTAL, &[]),
            cache_misses: count(CACHE_MISSES_TOTAL, &[]),
            stale_served: count(REQUESTS_TOTAL, &[("outcome", "stale")]),
            errors: count(REQUESTS_TOTAL, &[("outcome", "error")]),
            upstream_calls: count(UPSTREAM_CALLS_TOTAL, &[]),
            retries: count(RETRIES_TOTAL, &[]),
            fallbacks: count(FALLBACK_TOTAL, &[]),
        }
    }

    /// Drop every series. Only reachable through the admin reset path.
    pub fn reset(&self) {
        self.series.lock().clear();
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn render_labels(labels: &[(String, String)], le: Option<&str>) -> String {
    let mut parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape_label_value(v)))
        .collect();
    if let Some(le) = le {
        parts.push(format!("le=\"{le}\""));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(","))
    }
}
