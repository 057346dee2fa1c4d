//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; a recorder is installed by the
//! binary. Without one, every call is a no-op.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FFMPEG_DURATION_SECONDS: &str = "reel_ffmpeg_duration_seconds";
    pub const FFMPEG_RUNS_TOTAL: &str = "reel_ffmpeg_runs_total";
    pub const CLIPS_PREPARED_TOTAL: &str = "reel_clips_prepared_total";
    pub const CLIPS_SKIPPED_TOTAL: &str = "reel_clips_skipped_total";
    pub const FRAMES_EXTRACTED_TOTAL: &str = "reel_frames_extracted_total";
    pub const THUMBNAIL_STRATEGY_TOTAL: &str = "reel_thumbnail_strategy_total";
    pub const RENDER_DURATION_SECONDS: &str = "reel_render_duration_seconds";
    pub const SHORTS_CREATED_TOTAL: &str = "reel_shorts_created_total";
}

/// Record one FFmpeg invocation.
pub fn record_ffmpeg_run(operation: &'static str, success: bool, duration_secs: f64) {
    let labels = [
        ("operation", operation.to_string()),
        ("status", if success { "ok" } else { "error" }.to_string()),
    ];
    counter!(names::FFMPEG_RUNS_TOTAL, &labels).increment(1);
    histogram!(names::FFMPEG_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_clip_prepared() {
    counter!(names::CLIPS_PREPARED_TOTAL).increment(1);
}

pub fn record_clip_skipped(stage: &'static str) {
    counter!(names::CLIPS_SKIPPED_TOTAL, "stage" => stage).increment(1);
}

pub fn record_frames_extracted(count: usize) {
    counter!(names::FRAMES_EXTRACTED_TOTAL).increment(count as u64);
}

pub fn record_thumbnail_strategy(strategy: &'static str) {
    counter!(names::THUMBNAIL_STRATEGY_TOTAL, "strategy" => strategy).increment(1);
}

/// Record a whole top-level render (compilation or short).
pub fn record_render(kind: &'static str, duration_secs: f64) {
    histogram!(names::RENDER_DURATION_SECONDS, "kind" => kind).record(duration_secs);
}

pub fn record_short_created(source: &'static str) {
    counter!(names::SHORTS_CREATED_TOTAL, "source" => source).increment(1);
}
