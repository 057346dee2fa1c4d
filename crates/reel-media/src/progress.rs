//! FFmpeg progress parsing and render progress reporting.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::info;

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Seconds of output written so far.
    pub fn out_time_secs(&self) -> f64 {
        self.out_time_ms.max(0) as f64 / 1000.0
    }

    /// Progress percentage given the expected output length in seconds.
    pub fn percentage(&self, total_secs: f64) -> f64 {
        if self.is_complete {
            return 100.0;
        }
        if total_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs() / total_secs * 100.0).min(100.0)
    }

    /// Estimate time remaining in seconds.
    pub fn eta_seconds(&self, total_secs: f64) -> Option<f64> {
        if self.speed <= 0.0 || self.out_time_ms <= 0 {
            return None;
        }
        let remaining = total_secs - self.out_time_secs();
        if remaining <= 0.0 {
            return Some(0.0);
        }
        Some(remaining / self.speed)
    }
}

/// Logs render progress at fixed percentage steps.
///
/// Cheap to clone; clones share the last reported step.
#[derive(Debug, Clone)]
pub struct ProgressLogger {
    label: String,
    total_secs: f64,
    step: u32,
    last_reported: Arc<AtomicU32>,
}

impl ProgressLogger {
    pub fn new(label: impl Into<String>, total_secs: f64) -> Self {
        Self {
            label: label.into(),
            total_secs,
            step: 10,
            last_reported: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Report `progress`; returns the percentage logged, if this update crossed a step.
    pub fn observe(&self, progress: &FfmpegProgress) -> Option<u32> {
        let pct = progress.percentage(self.total_secs).floor() as u32;
        let bucket = pct / self.step * self.step;
        let previous = self.last_reported.fetch_max(bucket, Ordering::Relaxed);
        if bucket <= previous {
            return None;
        }
        info!(
            render = %self.label,
            percent = bucket,
            eta_secs = progress.eta_seconds(self.total_secs).unwrap_or(0.0),
            "Render progress"
        );
        Some(bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };

        assert!((progress.percentage(10.0) - 50.0).abs() < 0.01);
        assert!((progress.percentage(5.0) - 100.0).abs() < 0.01);
        assert_eq!(progress.percentage(0.0), 0.0);
    }

    #[test]
    fn test_eta_calculation() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            speed: 2.0,
            ..Default::default()
        };

        // 5 seconds remaining at 2x speed
        let eta = progress.eta_seconds(10.0).unwrap();
        assert!((eta - 2.5).abs() < 0.01);
    }

    #[test]
    fn test_logger_reports_each_step_once() {
        let logger = ProgressLogger::new("compilation", 100.0);
        let at = |secs: i64| FfmpegProgress {
            out_time_ms: secs * 1000,
            ..Default::default()
        };

        assert_eq!(logger.observe(&at(5)), None);
        assert_eq!(logger.observe(&at(12)), Some(10));
        assert_eq!(logger.observe(&at(15)), None);
        assert_eq!(logger.observe(&at(47)), Some(40));
        assert_eq!(logger.observe(&at(30)), None);
    }
}
