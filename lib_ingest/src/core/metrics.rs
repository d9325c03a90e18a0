//! # Rolling-Window Performance Metrics
//!
//! Answers "what does recent performance look like" without retaining
//! unbounded history. Each named metric keeps only its most recent N samples
//! in a [`MetricWindow`]; the [`PerfMonitor`] owns the windows behind a mutex
//! so any task in the process can record into it.
//!
//! Elapsed-time metrics are produced exclusively through
//! [`PerfMonitor::timed`], which returns a guard that records the elapsed
//! milliseconds when stopped *or dropped*. Dropping covers every exit path of
//! the measured operation, including early returns via `?`.
//!
//! Monitors are constructed explicitly and passed where needed. There is no
//! process-wide singleton, so tests instantiate isolated copies.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

/// Default number of samples retained per metric window.
pub const DEFAULT_WINDOW_CAPACITY: usize = 100;

/// Aggregate statistics over the current contents of one metric window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// Arithmetic mean of the retained samples.
    pub avg: f64,
    /// Smallest retained sample.
    pub min: f64,
    /// Largest retained sample.
    pub max: f64,
    /// Number of retained samples (at most the window capacity).
    pub count: usize,
}

/// Rolling numeric history for one named measurement.
#[derive(Debug)]
pub struct MetricWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl MetricWindow {
    /// Creates an empty window retaining at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample, dropping the oldest one if the window is full.
    pub fn record(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Statistics over the current window, or `None` when no samples have
    /// been recorded. An empty window never divides by zero.
    pub fn stats(&self) -> Option<WindowStats> {
        if self.samples.is_empty() {
            return None;
        }

        let count = self.samples.len();
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in &self.samples {
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }

        Some(WindowStats {
            avg: sum / count as f64,
            min,
            max,
            count,
        })
    }

    /// Number of samples currently retained.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no samples have been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Owner of all named metric windows for one component or process.
///
/// Windows are created lazily on the first `record` for a name and live as
/// long as the monitor itself.
#[derive(Debug)]
pub struct PerfMonitor {
    windows: Mutex<HashMap<String, MetricWindow>>,
    window_capacity: usize,
}

impl PerfMonitor {
    /// Creates a monitor using [`DEFAULT_WINDOW_CAPACITY`] samples per metric.
    pub fn new() -> Self {
        Self::with_window_capacity(DEFAULT_WINDOW_CAPACITY)
    }

    /// Creates a monitor retaining `capacity` samples per metric.
    pub fn with_window_capacity(capacity: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window_capacity: capacity.max(1),
        }
    }

    /// Records one sample for the named metric.
    pub fn record(&self, name: &str, value: f64) {
        let mut windows = self.windows.lock().expect("metrics lock poisoned");
        windows
            .entry(name.to_string())
            .or_insert_with(|| MetricWindow::new(self.window_capacity))
            .record(value);
    }

    /// Statistics for the named metric, or `None` when nothing has been
    /// recorded under that name.
    pub fn stats(&self, name: &str) -> Option<WindowStats> {
        let windows = self.windows.lock().expect("metrics lock poisoned");
        windows.get(name).and_then(|w| w.stats())
    }

    /// Starts an elapsed-time measurement for the named metric.
    ///
    /// The returned guard records the elapsed milliseconds when [`MetricTimer::stop`]
    /// is called, or on drop if it never is. This is the only way elapsed-time
    /// samples are produced.
    pub fn timed(&self, name: &str) -> MetricTimer<'_> {
        MetricTimer {
            monitor: self,
            name: name.to_string(),
            started: Instant::now(),
            armed: true,
        }
    }
}

impl Default for PerfMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// In-flight elapsed-time measurement. Records exactly once, on `stop` or on
/// drop, whichever comes first.
#[derive(Debug)]
pub struct MetricTimer<'a> {
    monitor: &'a PerfMonitor,
    name: String,
    started: Instant,
    armed: bool,
}

impl MetricTimer<'_> {
    /// Stops the timer and records the elapsed time in milliseconds.
    pub fn stop(mut self) {
        self.record_elapsed();
    }

    fn record_elapsed(&mut self) {
        if self.armed {
            self.armed = false;
            let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
            self.monitor.record(&self.name, elapsed_ms);
        }
    }
}

impl Drop for MetricTimer<'_> {
    fn drop(&mut self) {
        self.record_elapsed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_retains_only_last_n() {
        // 1. Record more samples than the window holds
        let mut window = MetricWindow::new(4);
        for i in 0..10 {
            window.record(i as f64);
        }

        // 2. Only the last 4 samples survive
        let stats = window.stats().expect("window has samples");
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 6.0);
        assert_eq!(stats.max, 9.0);
        assert_eq!(stats.avg, 7.5);
    }

    #[test]
    fn test_empty_window_reports_no_data() {
        let window = MetricWindow::new(10);
        assert!(window.stats().is_none());

        let monitor = PerfMonitor::new();
        assert!(monitor.stats("never_recorded").is_none());
    }

    #[test]
    fn test_monitor_window_capacity_applies_per_name() {
        let monitor = PerfMonitor::with_window_capacity(3);
        for i in 0..20 {
            monitor.record("latency", i as f64);
        }
        monitor.record("other", 1.0);

        let latency = monitor.stats("latency").unwrap();
        assert_eq!(latency.count, 3);
        assert_eq!(latency.min, 17.0);

        let other = monitor.stats("other").unwrap();
        assert_eq!(other.count, 1);
        assert_eq!(other.avg, 1.0);
    }

    #[test]
    fn test_timer_records_once_on_stop() {
        let monitor = PerfMonitor::new();
        let timer = monitor.timed("op");
        timer.stop();

        let stats = monitor.stats("op").unwrap();
        assert_eq!(stats.count, 1);
        assert!(stats.min >= 0.0);
    }

    #[test]
    fn test_timer_records_on_drop_and_error_paths() {
        let monitor = PerfMonitor::new();

        // Simulate a measured operation that bails out early: the guard is
        // dropped without an explicit stop.
        fn failing_op(monitor: &PerfMonitor) -> Result<(), ()> {
            let _timer = monitor.timed("op");
            Err(())
        }
        assert!(failing_op(&monitor).is_err());

        let stats = monitor.stats("op").unwrap();
        assert_eq!(stats.count, 1);
    }
}
