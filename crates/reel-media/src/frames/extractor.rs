//! Candidate frame sampling.
//!
//! Positions are spread evenly over a clip after skipping roughly one second
//! at each end, where fades and end cards usually live. Each position is
//! decoded by a single FFmpeg call writing one RGB24 frame to stdout.

use std::path::Path;

use image::RgbImage;
use tracing::{debug, info, warn};

use reel_models::{SourceClip, TITLE_SLIDE_SECS};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::frames::Frame;
use crate::metrics;
use crate::pool::RenderPool;
use crate::probe::{probe_video, VideoInfo};

/// Clips shorter than this are not sampled.
pub const MIN_SAMPLE_DURATION_SECS: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Frames requested per clip
    pub frames_per_clip: usize,
    /// Minimum spacing between kept samples, in seconds
    pub min_frame_interval: f64,
    /// Longest edge of decoded frames
    pub max_dimension: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            frames_per_clip: 5,
            min_frame_interval: 1.0,
            max_dimension: 1280,
        }
    }
}

/// Frame indices to sample from a clip of `frame_count` frames.
///
/// One frame returns the midpoint. Otherwise `n` positions are spread over
/// `[skip, frame_count - skip]` with `skip = floor(fps)`, clamped to the
/// last frame and thinned so that neighbours are at least
/// `min_interval_secs` apart. The result is strictly increasing.
pub fn sample_positions(frame_count: u64, fps: f64, n: usize, min_interval_secs: f64) -> Vec<u64> {
    if n == 0 || frame_count == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![frame_count / 2];
    }

    let skip = fps.max(0.0).floor() as u64;
    let usable = frame_count as i64 - 2 * skip as i64;
    if usable <= 0 {
        return Vec::new();
    }

    let last_frame = frame_count - 1;
    let min_gap = (min_interval_secs.max(0.0) * fps).round() as u64;

    let mut positions: Vec<u64> = Vec::with_capacity(n);
    for i in 0..n {
        let offset = (i as f64 * usable as f64 / (n - 1) as f64).floor() as u64;
        let pos = (skip + offset).min(last_frame);
        match positions.last() {
            Some(&prev) if pos <= prev || pos - prev < min_gap => continue,
            _ => positions.push(pos),
        }
    }
    positions
}

/// Output size for a decoded frame: the longest edge capped at
/// `max_dimension`, both sides even.
fn decode_size(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height).max(1);
    let scale = (max_dimension as f64 / longest as f64).min(1.0);
    let even = |v: f64| ((v.round() as u32) / 2 * 2).max(2);
    (even(width as f64 * scale), even(height as f64 * scale))
}

/// Samples candidate frames from clips.
#[derive(Debug, Clone, Default)]
pub struct FrameExtractor {
    config: ExtractorConfig,
    runner: FfmpegRunner,
    pool: RenderPool,
}

impl FrameExtractor {
    pub fn new(config: ExtractorConfig, runner: FfmpegRunner, pool: RenderPool) -> Self {
        Self {
            config,
            runner,
            pool,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Sample candidate frames from one clip.
    ///
    /// Clips under two seconds, or too short once the edges are skipped,
    /// yield an empty list. Frames that fail to decode are dropped.
    pub async fn extract(&self, path: &Path, clip_id: &str) -> MediaResult<Vec<Frame>> {
        let info = probe_video(path).await?;
        if info.fps <= 0.0 || info.frame_count == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "{} reports no frames",
                path.display()
            )));
        }

        let duration = info.frame_count as f64 / info.fps;
        if duration < MIN_SAMPLE_DURATION_SECS {
            info!(
                clip_id = %clip_id,
                duration = duration,
                "Clip too short for frame sampling"
            );
            return Ok(Vec::new());
        }

        let positions = sample_positions(
            info.frame_count,
            info.fps,
            self.config.frames_per_clip,
            self.config.min_frame_interval,
        );
        let timestamps: Vec<f64> = positions.iter().map(|p| *p as f64 / info.fps).collect();

        let frames = self.decode_all(path, clip_id, &info, &timestamps).await;
        debug!(
            clip_id = %clip_id,
            requested = positions.len(),
            decoded = frames.len(),
            "Sampled frames"
        );
        Ok(frames)
    }

    /// Sample every clip in turn; a clip that cannot be opened is skipped.
    pub async fn extract_many(&self, clips: &[SourceClip]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for clip in clips {
            match self.extract(&clip.local_path, &clip.id).await {
                Ok(mut sampled) => frames.append(&mut sampled),
                Err(MediaError::Cancelled) => break,
                Err(e) => warn!(clip_id = %clip.id, "Frame sampling failed: {}", e),
            }
        }
        frames
    }

    /// Sample a rendered compilation.
    ///
    /// Skips the title slide, then takes up to three more frames at the
    /// quartiles of longer videos.
    pub async fn extract_from_compilation(&self, path: &Path) -> MediaResult<Vec<Frame>> {
        let info = probe_video(path).await?;
        let timestamps = compilation_timestamps(info.duration);
        let clip_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "compilation".to_string());
        Ok(self.decode_all(path, &clip_id, &info, &timestamps).await)
    }

    async fn decode_all(
        &self,
        path: &Path,
        clip_id: &str,
        info: &VideoInfo,
        timestamps: &[f64],
    ) -> Vec<Frame> {
        let (width, height) = decode_size(info.width, info.height, self.config.max_dimension);
        let mut frames = Vec::with_capacity(timestamps.len());
        for &timestamp in timestamps {
            match self.decode_frame(path, timestamp, width, height).await {
                Ok(image) => frames.push(Frame::new(clip_id, timestamp, image)),
                Err(e) => debug!(
                    clip_id = %clip_id,
                    timestamp = timestamp,
                    "Dropping undecodable frame: {}", e
                ),
            }
        }
        metrics::record_frames_extracted(frames.len());
        frames
    }

    async fn decode_frame(
        &self,
        path: &Path,
        timestamp: f64,
        width: u32,
        height: u32,
    ) -> MediaResult<RgbImage> {
        let cmd = FfmpegCommand::to_stdout()
            .add_input(path)
            .seek(timestamp)
            .single_frame()
            .video_filter(format!("scale={}:{}", width, height))
            .output_args(["-pix_fmt", "rgb24", "-f", "rawvideo"]);

        let bytes = self.pool.run(self.runner.run_capture(&cmd)).await?;
        let expected = (width * height * 3) as usize;
        if bytes.len() < expected {
            return Err(MediaError::InvalidVideo(format!(
                "short frame at {:.2}s: {} of {} bytes",
                timestamp,
                bytes.len(),
                expected
            )));
        }
        RgbImage::from_raw(width, height, bytes[..expected].to_vec())
            .ok_or_else(|| MediaError::internal("raw frame buffer size mismatch"))
    }
}

/// Sample times for a rendered compilation.
pub fn compilation_timestamps(duration: f64) -> Vec<f64> {
    let mut timestamps = Vec::with_capacity(4);
    if duration > TITLE_SLIDE_SECS + 1.0 {
        timestamps.push(TITLE_SLIDE_SECS + 0.5);
    }
    if duration > 20.0 {
        timestamps.extend([duration * 0.25, duration * 0.5, duration * 0.75]);
    }
    timestamps
}
