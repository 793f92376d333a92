//! Run statistics module
//! Counts events and bytes written and reports generation rates

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Statistics collector for a generation run.
#[derive(Debug)]
pub struct Stats {
    events_written: AtomicU64,
    bytes_written: AtomicU64,
    start_time: Instant,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            events_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one written event and its serialized size.
    pub fn count_event(&self, bytes: usize) {
        self.events_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn events(&self) -> u64 {
        self.events_written.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Average event rate since the run started.
    pub fn events_per_second(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.events() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log a progress line.
    pub fn print_progress(&self) {
        info!(
            "Generated {} events ({:.1}/s, {:.2} MB)",
            self.events(),
            self.events_per_second(),
            self.bytes() as f64 / 1_048_576.0
        );
    }

    /// Log the end-of-run summary.
    pub fn print_final(&self) {
        let elapsed = self.start_time.elapsed();
        info!(
            "Run complete: {} events in {:.2}s ({:.1}/s, {:.2} MB)",
            self.events(),
            elapsed.as_secs_f64(),
            self.events_per_second(),
            self.bytes() as f64 / 1_048_576.0
        );
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_counting() {
        let stats = Stats::new();
        assert_eq!(stats.events(), 0);
        assert_eq!(stats.bytes(), 0);

        stats.count_event(256);
        stats.count_event(512);

        assert_eq!(stats.events(), 2);
        assert_eq!(stats.bytes(), 768);
    }

    #[test]
    fn test_stats_rate() {
        let stats = Stats::new();
        std::thread::sleep(Duration::from_millis(10));
        stats.count_event(100);
        assert!(stats.events_per_second() > 0.0);
    }
}
