//! Performance monitoring: per-metric sample rings with percentiles.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Maximum samples retained per metric.
const MAX_SAMPLES: usize = 1000;

/// Summary statistics for one metric.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MetricReport {
    /// Samples currently in the ring.
    pub count: usize,
    /// Arithmetic mean.
    pub avg: f64,
    /// Minimum sample.
    pub min: f64,
    /// Maximum sample.
    pub max: f64,
    /// 50th percentile.
    pub p50: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
}

/// Collects timing samples per named metric.
///
/// Each metric keeps a bounded ring of the most recent 1000 samples;
/// older samples fall off the front.
#[derive(Clone, Default)]
pub struct PerfMonitor {
    metrics: Arc<Mutex<HashMap<String, VecDeque<f64>>>>,
}

impl PerfMonitor {
    /// Create an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample (usually milliseconds) for a metric.
    pub fn record(&self, metric: &str, value: f64) {
        if let Ok(mut metrics) = self.metrics.lock() {
            let ring = metrics.entry(metric.to_owned()).or_default();
            if ring.len() == MAX_SAMPLES {
                ring.pop_front();
            }
            ring.push_back(value);
        }
    }

    /// Start a scoped timer; the elapsed milliseconds are recorded when
    /// the returned guard drops.
    pub fn start_timer(&self, metric: &str) -> PerfTimer {
        PerfTimer {
            monitor: self.clone(),
            metric: metric.to_owned(),
            started: Instant::now(),
        }
    }

    /// Statistics for one metric, or `None` if it has no samples.
    pub fn report(&self, metric: &str) -> Option<MetricReport> {
        let metrics = self.metrics.lock().ok()?;
        let ring = metrics.get(metric)?;
        if ring.is_empty() {
            return None;
        }

        let mut sorted: Vec<f64> = ring.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        Some(MetricReport {
            count,
            avg: sum / count as f64,
            min: sorted[0],
            max: sorted[count - 1],
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        })
    }

    /// Statistics for every metric with at least one sample.
    pub fn report_all(&self) -> HashMap<String, MetricReport> {
        let names: Vec<String> = match self.metrics.lock() {
            Ok(metrics) => metrics.keys().cloned().collect(),
            Err(_) => return HashMap::new(),
        };
        names
            .into_iter()
            .filter_map(|name| self.report(&name).map(|report| (name, report)))
            .collect()
    }
}

/// Nearest-rank percentile over a sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Scoped timer guard; records elapsed milliseconds on drop.
pub struct PerfTimer {
    monitor: PerfMonitor,
    metric: String,
    started: Instant,
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.monitor.record(&self.metric, elapsed_ms);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn report_computes_summary_stats() {
        let monitor = PerfMonitor::new();
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            monitor.record("cycle", value);
        }
        let report = monitor.report("cycle").unwrap();
        assert_eq!(report.count, 5);
        assert!((report.avg - 3.0).abs() < 1e-9);
        assert!((report.min - 1.0).abs() < 1e-9);
        assert!((report.max - 5.0).abs() < 1e-9);
        assert!((report.p50 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn ring_is_bounded_at_1000_samples() {
        let monitor = PerfMonitor::new();
        for i in 0..1500 {
            monitor.record("tick", f64::from(i));
        }
        let report = monitor.report("tick").unwrap();
        assert_eq!(report.count, 1000);
        // The oldest 500 samples fell off.
        assert!((report.min - 500.0).abs() < 1e-9);
    }

    #[test]
    fn percentiles_order_correctly() {
        let monitor = PerfMonitor::new();
        for i in 1..=100 {
            monitor.record("query", f64::from(i));
        }
        let report = monitor.report("query").unwrap();
        assert!(report.p50 <= report.p95);
        assert!(report.p95 <= report.p99);
        assert!(report.p99 <= report.max);
    }

    #[test]
    fn missing_metric_reports_none() {
        let monitor = PerfMonitor::new();
        assert!(monitor.report("nothing").is_none());
    }

    #[test]
    fn timer_records_on_drop() {
        let monitor = PerfMonitor::new();
        {
            let _timer = monitor.start_timer("scoped");
        }
        let report = monitor.report("scoped").unwrap();
        assert_eq!(report.count, 1);
        assert!(report.min >= 0.0);
    }
}
