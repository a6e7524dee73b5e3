//! Page fetch latency histogram. Fetchers record, the API reads.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Values stored in milliseconds.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LatencySnapshot {
    pub samples: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub max_ms: Option<u64>,
}

impl LatencyStats {
    /// 1ms to 10 minutes, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 600_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, d: Duration) {
        let ms = d.as_millis().clamp(1, 600_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(ms);
        }
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let Ok(h) = self.inner.lock() else {
            return LatencySnapshot::empty();
        };
        if h.len() == 0 {
            return LatencySnapshot::empty();
        }
        LatencySnapshot {
            samples: h.len(),
            p50_ms: Some(h.value_at_quantile(0.5)),
            p95_ms: Some(h.value_at_quantile(0.95)),
            p99_ms: Some(h.value_at_quantile(0.99)),
            max_ms: Some(h.max()),
        }
    }
}

impl LatencySnapshot {
    fn empty() -> Self {
        Self {
            samples: 0,
            p50_ms: None,
            p95_ms: None,
            p99_ms: None,
            max_ms: None,
        }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_has_no_percentiles() {
        let stats = LatencyStats::new();
        assert_eq!(stats.snapshot().samples, 0);
        assert_eq!(stats.snapshot().p50_ms, None);
    }

    #[test]
    fn records_durations_in_milliseconds() {
        let stats = LatencyStats::new();
        for ms in [100u64, 200, 300, 400, 500] {
            stats.record(Duration::from_millis(ms));
        }
        // Sub-millisecond fetches still count as one sample.
        stats.record(Duration::from_micros(10));
        let snap = stats.snapshot();
        assert_eq!(snap.samples, 6);
        let p50 = snap.p50_ms.unwrap();
        assert!((199..=301).contains(&p50), "p50 was {p50}");
        assert!(snap.max_ms.unwrap() >= 499);
    }
}
