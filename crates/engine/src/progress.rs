//! Progress accounting safe under parallel mutation.
//!
//! Many workers bump the counters; observers read a consistent-enough
//! snapshot. Each individual counter is monotonic over the lifetime of one
//! orchestration, which is the only cross-thread guarantee callers get.
//! `total` is `-1` while enumeration is still discovering the key space;
//! renderers must never divide by it.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use kvbulk_config::constants::PROGRESS_REPORT_INTERVAL;

/// Point-in-time view of one orchestration's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub fetched: u64,
    pub processed: u64,
    pub matched: u64,
    pub deleted: u64,
    /// Total items when known, `-1` while enumeration is still running.
    pub total: i64,
    /// Live worker count of the pool driving the operation.
    pub workers: u64,
}

impl ProgressSnapshot {
    /// Completion ratio, if the total is known and positive.
    pub fn ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.processed as f64 / self.total as f64)
    }
}

/// Callback receiving snapshots. May block; is invoked from worker threads.
pub type ProgressFn = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Monotonic counters shared by every producer of one orchestration.
pub struct ProgressTracker {
    fetched: AtomicU64,
    processed: AtomicU64,
    matched: AtomicU64,
    deleted: AtomicU64,
    total: AtomicI64,
    workers: AtomicU64,
    report_every: u64,
    last_reported: AtomicU64,
    callback: Option<ProgressFn>,
    /// Serializes callback invocations; the snapshot is taken under this
    /// lock so no observer ever sees a counter go backwards.
    report_lock: std::sync::Mutex<()>,
}

impl ProgressTracker {
    /// Create a tracker reporting to `callback` at most once per
    /// [`PROGRESS_REPORT_INTERVAL`] processed items.
    pub fn new(callback: Option<ProgressFn>) -> Self {
        Self::with_interval(callback, PROGRESS_REPORT_INTERVAL)
    }

    /// Create a tracker with a custom report cadence.
    pub fn with_interval(callback: Option<ProgressFn>, report_every: u64) -> Self {
        Self {
            fetched: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            matched: AtomicU64::new(0),
            deleted: AtomicU64::new(0),
            total: AtomicI64::new(-1),
            workers: AtomicU64::new(0),
            report_every: report_every.max(1),
            last_reported: AtomicU64::new(0),
            callback,
            report_lock: std::sync::Mutex::new(()),
        }
    }

    pub fn add_fetched(&self, n: u64) {
        self.fetched.fetch_add(n, Ordering::Release);
    }

    /// Bump the processed counter and report if a cadence boundary was
    /// crossed.
    pub fn add_processed(&self, n: u64) {
        self.processed.fetch_add(n, Ordering::Release);
        self.maybe_report();
    }

    pub fn add_matched(&self, n: u64) {
        self.matched.fetch_add(n, Ordering::Release);
    }

    pub fn add_deleted(&self, n: u64) {
        self.deleted.fetch_add(n, Ordering::Release);
    }

    /// Publish the discovered total once enumeration has finished.
    pub fn set_total(&self, total: i64) {
        self.total.store(total, Ordering::Release);
    }

    /// Record the live worker count (a gauge, not a counter).
    pub fn set_workers(&self, workers: u64) {
        self.workers.store(workers, Ordering::Release);
    }

    /// Read the current counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            fetched: self.fetched.load(Ordering::Acquire),
            processed: self.processed.load(Ordering::Acquire),
            matched: self.matched.load(Ordering::Acquire),
            deleted: self.deleted.load(Ordering::Acquire),
            total: self.total.load(Ordering::Acquire),
            workers: self.workers.load(Ordering::Acquire),
        }
    }

    /// Invoke the callback unconditionally with a fresh snapshot.
    pub fn report_now(&self) {
        if let Some(callback) = &self.callback {
            let _guard = self
                .report_lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            callback(self.snapshot());
        }
    }

    /// Invoke the callback if at least `report_every` items completed since
    /// the last report. The compare-exchange makes sure exactly one of the
    /// racing producers reports per boundary.
    fn maybe_report(&self) {
        let Some(callback) = &self.callback else {
            return;
        };
        let processed = self.processed.load(Ordering::Acquire);
        let last = self.last_reported.load(Ordering::Acquire);
        if processed.saturating_sub(last) < self.report_every {
            return;
        }
        if self
            .last_reported
            .compare_exchange(last, processed, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let _guard = self
                .report_lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            callback(self.snapshot());
        }
    }

    /// Final report at completion, regardless of cadence.
    pub fn finish(&self) {
        self.report_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_total_sentinel_never_produces_ratio() {
        let tracker = ProgressTracker::new(None);
        assert_eq!(tracker.snapshot().total, -1);
        assert!(tracker.snapshot().ratio().is_none());
        tracker.set_total(0);
        assert!(tracker.snapshot().ratio().is_none());
        tracker.set_total(10);
        tracker.add_processed(5);
        assert_eq!(tracker.snapshot().ratio(), Some(0.5));
    }

    #[test]
    fn test_report_cadence() {
        let snapshots: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = snapshots.clone();
        let tracker = ProgressTracker::with_interval(
            Some(Arc::new(move |s| sink.lock().unwrap().push(s))),
            100,
        );

        for _ in 0..250 {
            tracker.add_processed(1);
        }
        tracker.finish();

        let seen = snapshots.lock().unwrap();
        // Two cadence reports (at 100 and 200) plus the forced final one.
        assert_eq!(seen.len(), 3);
        assert_eq!(seen.last().unwrap().processed, 250);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_counters_monotonic_under_concurrency() {
        let snapshots: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = snapshots.clone();
        let tracker = Arc::new(ProgressTracker::with_interval(
            Some(Arc::new(move |s| sink.lock().unwrap().push(s))),
            10,
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..500 {
                    tracker.add_fetched(1);
                    tracker.add_processed(1);
                    tracker.add_matched(1);
                    tracker.add_deleted(1);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        tracker.finish();

        let seen = snapshots.lock().unwrap();
        for pair in seen.windows(2) {
            assert!(pair[1].fetched >= pair[0].fetched);
            assert!(pair[1].processed >= pair[0].processed);
            assert!(pair[1].matched >= pair[0].matched);
            assert!(pair[1].deleted >= pair[0].deleted);
        }
        assert_eq!(seen.last().unwrap().deleted, 4000);
    }
}
