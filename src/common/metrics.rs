//! Replica metrics
//!
//! Counters and a processing-time histogram, rendered in the Prometheus text
//! exposition format on `/metrics`.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Histogram bucket boundaries for processing time (in milliseconds)
const PROCESSING_BUCKETS: [f64; 10] = [
    5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
];

/// Fixed-bucket histogram
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: &'static [f64],
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(boundaries: &'static [f64]) -> Self {
        Self {
            buckets: (0..=boundaries.len()).map(|_| AtomicU64::new(0)).collect(),
            boundaries,
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, elapsed: Duration) {
        let millis = elapsed.as_secs_f64() * 1000.0;
        let idx = self
            .boundaries
            .iter()
            .position(|&upper| millis <= upper)
            .unwrap_or(self.boundaries.len());

        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative `(upper bound, count)` pairs, ending with `+Inf`
    pub fn cumulative(&self) -> Vec<(f64, u64)> {
        let mut running = 0u64;
        let mut result = Vec::with_capacity(self.buckets.len());
        for (i, bucket) in self.buckets.iter().enumerate() {
            running += bucket.load(Ordering::Relaxed);
            let upper = self.boundaries.get(i).copied().unwrap_or(f64::INFINITY);
            result.push((upper, running));
        }
        result
    }

    pub fn sum_millis(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn inc(&self) -> u64 {
        self.value.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Everything a replica counts about its own traffic
#[derive(Debug)]
pub struct ReplicaMetrics {
    pub requests_received: Counter,
    pub responses_delivered: Counter,
    pub responses_suppressed: Counter,
    pub cancels_received: Counter,
    pub early_cancels: Counter,
    pub processing_time: Histogram,
}

impl ReplicaMetrics {
    pub fn new() -> Self {
        Self {
            requests_received: Counter::default(),
            responses_delivered: Counter::default(),
            responses_suppressed: Counter::default(),
            cancels_received: Counter::default(),
            early_cancels: Counter::default(),
            processing_time: Histogram::new(&PROCESSING_BUCKETS),
        }
    }

    /// Render in Prometheus text format
    pub fn to_prometheus(&self, in_flight: usize) -> String {
        let mut out = String::new();
        let counters = [
            ("hedgerpc_requests_received_total", "Query requests accepted", &self.requests_received),
            ("hedgerpc_responses_delivered_total", "Responses written", &self.responses_delivered),
            ("hedgerpc_responses_suppressed_total", "Responses dropped after cancellation", &self.responses_suppressed),
            ("hedgerpc_cancels_received_total", "Cancel signals received", &self.cancels_received),
            ("hedgerpc_early_cancels_total", "Cancel signals that arrived before their request", &self.early_cancels),
        ];
        for (name, help, counter) in counters {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{} {}", name, counter.get());
        }

        let _ = writeln!(out, "# HELP hedgerpc_in_flight Requests currently tracked by the registry");
        let _ = writeln!(out, "# TYPE hedgerpc_in_flight gauge");
        let _ = writeln!(out, "hedgerpc_in_flight {}", in_flight);

        let name = "hedgerpc_processing_ms";
        let _ = writeln!(out, "# HELP {} Simulated processing time", name);
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for (upper, count) in self.processing_time.cumulative() {
            let le = if upper.is_infinite() {
                "+Inf".to_string()
            } else {
                upper.to_string()
            };
            let _ = writeln!(out, "{}_bucket{{le=\"{}\"}} {}", name, le, count);
        }
        let _ = writeln!(out, "{}_sum {}", name, self.processing_time.sum_millis());
        let _ = writeln!(out, "{}_count {}", name, self.processing_time.count());

        out
    }
}

impl Default for ReplicaMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_buckets() {
        let histogram = Histogram::new(&PROCESSING_BUCKETS);
        histogram.observe(Duration::from_millis(3));
        histogram.observe(Duration::from_millis(75));
        histogram.observe(Duration::from_secs(60));

        let buckets = histogram.cumulative();
        assert_eq!(buckets.len(), PROCESSING_BUCKETS.len() + 1);
        assert_eq!(buckets[0], (5.0, 1));
        assert_eq!(buckets[3], (100.0, 2));
        assert_eq!(buckets.last().map(|b| b.1), Some(3));
        assert_eq!(histogram.count(), 3);
        assert!((histogram.sum_millis() - 60_078.0).abs() < 1.0);
    }

    #[test]
    fn test_counter() {
        let counter = Counter::default();
        assert_eq!(counter.inc(), 1);
        assert_eq!(counter.inc(), 2);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_prometheus_output() {
        let metrics = ReplicaMetrics::new();
        metrics.requests_received.inc();
        metrics.responses_suppressed.inc();
        metrics.processing_time.observe(Duration::from_millis(10));

        let text = metrics.to_prometheus(2);
        assert!(text.contains("hedgerpc_requests_received_total 1"));
        assert!(text.contains("hedgerpc_responses_suppressed_total 1"));
        assert!(text.contains("hedgerpc_in_flight 2"));
        assert!(text.contains("hedgerpc_processing_ms_bucket{le=\"+Inf\"} 1"));
        assert!(text.contains("hedgerpc_processing_ms_count 1"));
    }
}
