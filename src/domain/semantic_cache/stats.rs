//! Hit/miss statistics

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Number of response-time samples kept per path
const DEFAULT_SAMPLE_WINDOW: usize = 100;

/// Outcome of the most recent lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEvent {
    Hit,
    Miss,
}

/// Point-in-time view of the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub total_queries: u64,
    /// Percentage rounded to one decimal
    pub hit_rate: f64,
    /// Estimated USD saved by hits
    pub total_savings: f64,
    pub last_event: Option<CacheEvent>,
    /// Mean producer time on misses, milliseconds
    pub avg_response_time_ms: f64,
    /// Mean lookup time on hits, milliseconds
    pub avg_cached_response_time_ms: f64,
}

#[derive(Debug, Default)]
struct StatsInner {
    hits: u64,
    misses: u64,
    total_savings: f64,
    last_event: Option<CacheEvent>,
    response_times: VecDeque<Duration>,
    cached_response_times: VecDeque<Duration>,
}

/// Thread-safe cache counters.
///
/// All counters sit behind one lock so `reset` and `snapshot` are atomic
/// with respect to concurrent recording.
#[derive(Debug)]
pub struct StatsTracker {
    inner: Mutex<StatsInner>,
    window: usize,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_SAMPLE_WINDOW)
    }

    /// Keep at most `window` timing samples per path
    pub fn with_window(window: usize) -> Self {
        Self {
            inner: Mutex::new(StatsInner::default()),
            window: window.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatsInner> {
        // Counters stay meaningful even if a recorder panicked mid-update
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a cache hit, the estimated savings and how long the lookup took
    pub fn record_hit(&self, saved: f64, elapsed: Duration) {
        let mut inner = self.lock();
        inner.hits += 1;
        inner.total_savings += saved.max(0.0);
        inner.last_event = Some(CacheEvent::Hit);
        push_sample(&mut inner.cached_response_times, elapsed, self.window);
    }

    /// Record a cache miss and how long the producer took
    pub fn record_miss(&self, elapsed: Duration) {
        let mut inner = self.lock();
        inner.misses += 1;
        inner.last_event = Some(CacheEvent::Miss);
        push_sample(&mut inner.response_times, elapsed, self.window);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.lock();
        let total = inner.hits + inner.misses;

        let hit_rate = if total == 0 {
            0.0
        } else {
            (inner.hits as f64 / total as f64 * 1000.0).round() / 10.0
        };

        StatsSnapshot {
            hits: inner.hits,
            misses: inner.misses,
            total_queries: total,
            hit_rate,
            total_savings: inner.total_savings,
            last_event: inner.last_event,
            avg_response_time_ms: average_ms(&inner.response_times),
            avg_cached_response_time_ms: average_ms(&inner.cached_response_times),
        }
    }

    /// Human-readable multi-line summary
    pub fn report(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        let _ = writeln!(out, "Semantic Cache Statistics");
        let _ = writeln!(out, "-------------------------");
        let _ = writeln!(out, "Total queries:            {}", snapshot.total_queries);
        let _ = writeln!(out, "Cache hits:               {}", snapshot.hits);
        let _ = writeln!(out, "Cache misses:             {}", snapshot.misses);
        let _ = writeln!(out, "Hit rate:                 {:.1}%", snapshot.hit_rate);
        let _ = writeln!(out, "Estimated savings:        ${:.4}", snapshot.total_savings);
        let _ = writeln!(
            out,
            "Avg response time:        {:.2}ms",
            snapshot.avg_response_time_ms
        );
        let _ = write!(
            out,
            "Avg cached response time: {:.2}ms",
            snapshot.avg_cached_response_time_ms
        );

        out
    }

    /// Zero every counter and drop all samples
    pub fn reset(&self) {
        *self.lock() = StatsInner::default();
    }
}

fn push_sample(samples: &mut VecDeque<Duration>, sample: Duration, window: usize) {
    if samples.len() == window {
        samples.pop_front();
    }
    samples.push_back(sample);
}

fn average_ms(samples: &VecDeque<Duration>) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let total: f64 = samples.iter().map(|d| d.as_secs_f64() * 1000.0).sum();
    total / samples.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_snapshot() {
        let stats = StatsTracker::new().snapshot();

        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate, 0.0);
        assert!(stats.last_event.is_none());
        assert_eq!(stats.avg_response_time_ms, 0.0);
    }

    #[test]
    fn test_hit_rate_rounded_to_one_decimal() {
        let tracker = StatsTracker::new();
        tracker.record_hit(0.0, Duration::from_millis(1));
        tracker.record_miss(Duration::from_millis(10));
        tracker.record_miss(Duration::from_millis(10));

        let stats = tracker.snapshot();

        assert_eq!(stats.total_queries, 3);
        assert_eq!(stats.hit_rate, 33.3);
        assert_eq!(stats.last_event, Some(CacheEvent::Miss));
    }

    #[test]
    fn test_savings_and_timings() {
        let tracker = StatsTracker::new();
        tracker.record_hit(0.5, Duration::from_millis(2));
        tracker.record_hit(0.25, Duration::from_millis(4));
        tracker.record_miss(Duration::from_millis(100));

        let stats = tracker.snapshot();

        assert!((stats.total_savings - 0.75).abs() < 1e-12);
        assert!((stats.avg_cached_response_time_ms - 3.0).abs() < 1e-9);
        assert!((stats.avg_response_time_ms - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_window_is_bounded() {
        let tracker = StatsTracker::with_window(2);
        tracker.record_miss(Duration::from_millis(1000));
        tracker.record_miss(Duration::from_millis(10));
        tracker.record_miss(Duration::from_millis(20));

        assert!((tracker.snapshot().avg_response_time_ms - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let tracker = StatsTracker::new();
        tracker.record_hit(1.0, Duration::from_millis(1));
        tracker.record_miss(Duration::from_millis(1));

        tracker.reset();
        let stats = tracker.snapshot();

        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.total_savings, 0.0);
        assert!(stats.last_event.is_none());
        assert_eq!(stats.avg_cached_response_time_ms, 0.0);
    }

    #[test]
    fn test_report_contains_counters() {
        let tracker = StatsTracker::new();
        tracker.record_hit(0.01, Duration::from_millis(1));

        let report = tracker.report();

        assert!(report.contains("Cache hits:               1"));
        assert!(report.contains("Hit rate:                 100.0%"));
        assert!(report.lines().count() > 5);
    }

    #[test]
    fn test_concurrent_recording() {
        let tracker = Arc::new(StatsTracker::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if i % 2 == 0 {
                            tracker.record_hit(0.0, Duration::from_micros(5));
                        } else {
                            tracker.record_miss(Duration::from_micros(5));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = tracker.snapshot();
        assert_eq!(stats.hits, 400);
        assert_eq!(stats.misses, 400);
        assert_eq!(stats.hit_rate, 50.0);
    }
}
