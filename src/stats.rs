//! Transfer statistics for single files and whole runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Statistics for a single downloaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    /// Bytes written to disk.
    pub size: u64,
    /// Time from the first to the last chunk.
    pub elapsed: Duration,
    /// Average speed in bytes per second.
    pub average_speed: u64,
    /// Highest running-average speed observed, in bytes per second.
    pub peak_speed: u64,
}

/// Statistics for an entire run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Files transferred over the network.
    pub files_downloaded: usize,
    /// Tracks that needed no transfer (already on disk or already handled).
    pub files_skipped: usize,
    /// Total bytes written.
    pub total_bytes: u64,
    /// Wall time of the run.
    pub elapsed: Duration,
    /// Highest per-file peak speed.
    pub peak_speed: u64,
}

impl SessionStats {
    /// Returns the average download speed in bytes per second.
    #[must_use]
    pub fn average_speed(&self) -> u64 {
        bytes_per_sec(self.total_bytes, self.elapsed)
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn bytes_per_sec(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (bytes as f64 / secs) as u64
    } else {
        0
    }
}

/// Tracks one file while its chunks arrive.
pub struct DownloadStatsTracker {
    start_time: Instant,
    downloaded: AtomicU64,
    peak_speed: AtomicU64,
}

impl Default for DownloadStatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadStatsTracker {
    /// Starts tracking now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            downloaded: AtomicU64::new(0),
            peak_speed: AtomicU64::new(0),
        }
    }

    /// Records received bytes and returns the current average speed.
    pub fn record_bytes(&self, bytes: u64) -> u64 {
        let total = self.downloaded.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let speed = bytes_per_sec(total, self.start_time.elapsed());
        self.peak_speed.fetch_max(speed, Ordering::Relaxed);
        speed
    }

    /// Bytes recorded so far.
    #[must_use]
    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    /// Returns the peak speed recorded.
    #[must_use]
    pub fn peak_speed(&self) -> u64 {
        self.peak_speed.load(Ordering::Relaxed)
    }

    /// Converts this tracker into final file statistics.
    #[must_use]
    pub fn finish(&self) -> FileStats {
        let elapsed = self.start_time.elapsed();
        let size = self.downloaded();
        FileStats {
            size,
            elapsed,
            average_speed: bytes_per_sec(size, elapsed),
            peak_speed: self.peak_speed(),
        }
    }
}

/// Accumulates run statistics as album reports come in.
pub struct SessionStatsBuilder {
    stats: SessionStats,
    start_time: Instant,
}

impl Default for SessionStatsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStatsBuilder {
    /// Creates a new session stats builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stats: SessionStats::default(),
            start_time: Instant::now(),
        }
    }

    /// Records a completed file download.
    pub fn add_download(&mut self, file_stats: &FileStats) {
        self.stats.files_downloaded += 1;
        self.stats.total_bytes += file_stats.size;
        self.stats.peak_speed = self.stats.peak_speed.max(file_stats.peak_speed);
    }

    /// Records a track that needed no transfer.
    pub const fn add_skipped(&mut self) {
        self.stats.files_skipped += 1;
    }

    /// Builds the final session statistics.
    #[must_use]
    pub fn build(mut self) -> SessionStats {
        self.stats.elapsed = self.start_time.elapsed();
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_stats_average_speed() {
        let stats = SessionStats {
            total_bytes: 1000,
            elapsed: Duration::from_secs(2),
            ..SessionStats::default()
        };
        assert_eq!(stats.average_speed(), 500);
        assert_eq!(SessionStats::default().average_speed(), 0);
    }

    #[test]
    fn tracker_accumulates_bytes() {
        let tracker = DownloadStatsTracker::new();
        tracker.record_bytes(100);
        tracker.record_bytes(250);
        let stats = tracker.finish();
        assert_eq!(stats.size, 350);
        assert_eq!(tracker.downloaded(), 350);
    }

    #[test]
    fn session_builder_counts_downloads_and_skips() {
        let mut builder = SessionStatsBuilder::new();
        builder.add_skipped();
        builder.add_download(&FileStats {
            size: 500,
            elapsed: Duration::from_secs(1),
            average_speed: 500,
            peak_speed: 600,
        });
        builder.add_download(&FileStats {
            size: 300,
            elapsed: Duration::from_secs(1),
            average_speed: 300,
            peak_speed: 900,
        });

        let stats = builder.build();
        assert_eq!(stats.files_downloaded, 2);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.total_bytes, 800);
        assert_eq!(stats.peak_speed, 900);
    }
}
