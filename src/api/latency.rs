//! Backend request latency, kept per endpoint.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

/// 1us to 100s.
const LOWEST_US: u64 = 1;
const HIGHEST_US: u64 = 100_000_000;
const SIGFIG: u8 = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

impl LatencySummary {
    fn from_histogram(h: &Histogram<u64>) -> Self {
        if h.len() == 0 {
            return Self::default();
        }
        let ms = |q: f64| Some(h.value_at_quantile(q) as f64 / 1_000.0);
        Self {
            samples: h.len(),
            p50_ms: ms(0.5),
            p95_ms: ms(0.95),
            p99_ms: ms(0.99),
        }
    }
}

/// Round-trip times of backend calls, recorded by the backend client and
/// read by `/stats/latency`.
#[derive(Default)]
pub struct LatencyStats {
    by_endpoint: Mutex<BTreeMap<&'static str, Histogram<u64>>>,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values outside the histogram range are clamped.
    pub fn record(&self, endpoint: &'static str, d: Duration) {
        let us = (d.as_micros().min(u128::from(HIGHEST_US)) as u64).max(LOWEST_US);
        let mut map = self.by_endpoint.lock().unwrap_or_else(PoisonError::into_inner);
        if !map.contains_key(endpoint) {
            let Ok(h) = Histogram::new_with_bounds(LOWEST_US, HIGHEST_US, SIGFIG) else {
                return;
            };
            map.insert(endpoint, h);
        }
        if let Some(h) = map.get_mut(endpoint) {
            let _ = h.record(us);
        }
    }

    /// All endpoints merged.
    pub fn summary(&self) -> LatencySummary {
        let map = self.by_endpoint.lock().unwrap_or_else(PoisonError::into_inner);
        let Ok(mut merged) = Histogram::<u64>::new_with_bounds(LOWEST_US, HIGHEST_US, SIGFIG) else {
            return LatencySummary::default();
        };
        for h in map.values() {
            let _ = merged.add(h);
        }
        LatencySummary::from_histogram(&merged)
    }

    pub fn by_endpoint(&self) -> BTreeMap<&'static str, LatencySummary> {
        let map = self.by_endpoint.lock().unwrap_or_else(PoisonError::into_inner);
        map.iter()
            .map(|(k, h)| (*k, LatencySummary::from_histogram(h)))
            .collect()
    }
}
