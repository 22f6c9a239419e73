//! Scan progress reporting.

use std::time::{Duration, Instant};

/// Progress information during a bucket scan.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    /// Bucket being scanned.
    pub bucket: String,
    /// Prefix the scan is scoped to (`""` for the whole bucket).
    pub prefix: String,
    /// List calls completed so far.
    pub pages_fetched: u32,
    /// Objects seen so far.
    pub objects_seen: u64,
    /// Bytes summed so far.
    pub bytes_seen: u64,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Calculate scan rate in objects per second.
    pub fn objects_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.objects_seen as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Running totals for one scan.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    bucket: String,
    prefix: String,
    pages_fetched: u32,
    objects_seen: u64,
    bytes_seen: u64,
}

impl ProgressTracker {
    pub fn new(bucket: &str, prefix: &str) -> Self {
        Self {
            start_time: Instant::now(),
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            pages_fetched: 0,
            objects_seen: 0,
            bytes_seen: 0,
        }
    }

    pub fn record_page(&mut self, objects: u64, bytes: u64) {
        self.pages_fetched += 1;
        self.objects_seen += objects;
        self.bytes_seen += bytes;
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            pages_fetched: self.pages_fetched,
            objects_seen: self.objects_seen,
            bytes_seen: self.bytes_seen,
            elapsed: self.start_time.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_accumulates() {
        let mut tracker = ProgressTracker::new("b", "docs/");
        tracker.record_page(3, 300);
        tracker.record_page(1, 50);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.pages_fetched, 2);
        assert_eq!(snapshot.objects_seen, 4);
        assert_eq!(snapshot.bytes_seen, 350);
        assert_eq!(snapshot.prefix, "docs/");
    }

    #[test]
    fn test_rate_without_elapsed_time() {
        assert_eq!(ScanProgress::default().objects_per_second(), 0.0);
    }
}
