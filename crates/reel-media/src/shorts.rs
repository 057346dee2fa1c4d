//! Vertical short-form output.
//!
//! Shorts keep the leading window of their source, are centre-cropped to
//! 9:16 when the source is landscape, and carry a creator caption plus a
//! call-to-action band. Branding is best effort: when the branded render
//! fails, the plain reframe is written instead.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use reel_models::{BrandingConfig, EncodingConfig, SourceClip};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils;
use crate::metrics;
use crate::overlay::{Color, DrawList, FillRect, TextLayer};
use crate::pool::RenderPool;
use crate::probe::{probe_video, VideoInfo};
use crate::settings::MediaSettings;
use crate::trim::{leading_window, TrimPolicy, TrimWindow};

/// Longest short, in seconds.
pub const SHORTS_MAX_SECS: f64 = 59.0;

/// Caption font size, in thousandths of the frame height.
const CAPTION_PER_MILLE: u32 = 35;

/// Frame size after reframing a `width` x `height` source.
///
/// Landscape sources are cropped to `height * 9/16` (even); anything else
/// keeps its size.
pub fn reframed_size(width: u32, height: u32) -> (u32, u32) {
    if width > height {
        let target = (height as u64 * 9 / 16) as u32 / 2 * 2;
        (target.max(2), height)
    } else {
        (width, height)
    }
}

/// Creates vertical shorts.
#[derive(Debug, Clone)]
pub struct ShortsAdapter {
    branding: BrandingConfig,
    encoding: EncodingConfig,
    runner: FfmpegRunner,
    pool: RenderPool,
    max_duration: f64,
    include_branding: bool,
    scratch_root: Option<PathBuf>,
}

impl ShortsAdapter {
    pub fn new(settings: &MediaSettings, runner: FfmpegRunner, pool: RenderPool) -> Self {
        Self {
            branding: settings.branding.clone(),
            encoding: settings.shorts_encoding.clone(),
            runner: runner.for_operation("short"),
            pool,
            max_duration: SHORTS_MAX_SECS,
            include_branding: true,
            scratch_root: settings.scratch_root.clone(),
        }
    }

    pub fn with_max_duration(mut self, secs: f64) -> Self {
        self.max_duration = secs;
        self
    }

    pub fn with_branding(mut self, include: bool) -> Self {
        self.include_branding = include;
        self
    }

    /// Short from a rendered compilation, credited to the brand.
    pub async fn create_short_from_compilation(&self, compilation: &Path, output: &Path) -> MediaResult<PathBuf> {
        let creator = self.branding.brand_name.clone();
        self.create(compilation, None, &creator, output, "compilation").await
    }

    /// Short from one source clip, credited to its author.
    pub async fn create_short_from_clip(&self, clip: &SourceClip, output: &Path) -> MediaResult<PathBuf> {
        let creator = clip
            .handle()
            .map(str::to_string)
            .unwrap_or_else(|| self.branding.fallback_creator.clone());
        self.create(&clip.local_path, Some(clip.duration), &creator, output, "clip")
            .await
    }

    /// One short per clip, in order.
    ///
    /// Clips whose file is missing or whose render fails are skipped.
    pub async fn create_shorts_from_clips<F>(&self, clips: &[SourceClip], output_for: F) -> Vec<PathBuf>
    where
        F: Fn(&SourceClip) -> PathBuf,
    {
        let mut written = Vec::new();
        for clip in clips {
            if !clip.local_path.is_file() {
                warn!(clip_id = %clip.id, path = %clip.local_path.display(), "Skipping short, file missing");
                continue;
            }
            match self.create_short_from_clip(clip, &output_for(clip)).await {
                Ok(path) => written.push(path),
                Err(MediaError::Cancelled) => break,
                Err(e) => warn!(clip_id = %clip.id, "Short failed: {}", e),
            }
        }
        written
    }

    /// Leading window of a source.
    ///
    /// The probed length wins, then the descriptor's. With neither known the
    /// window spans the cap and FFmpeg stops at the end of the stream.
    pub fn window_for(&self, probed: f64, descriptor: Option<f64>) -> TrimWindow {
        let known = [Some(probed), descriptor]
            .into_iter()
            .flatten()
            .find(|d| d.is_finite() && *d > 0.0);
        match known {
            Some(duration) => TrimPolicy::Leading.window(duration, Some(self.max_duration)),
            None => leading_window(self.max_duration),
        }
    }

    /// Renders to attempt, in order: the branded one (when branding is on),
    /// then the plain reframe used when branding fails.
    pub fn render_plan(
        &self,
        source: &Path,
        info: &VideoInfo,
        window: TrimWindow,
        creator: &str,
        output: &Path,
    ) -> (Option<FfmpegCommand>, FfmpegCommand) {
        let branded = self
            .include_branding
            .then(|| self.build_command(source, info, window, Some(creator), output));
        (branded, self.build_command(source, info, window, None, output))
    }

    async fn create(
        &self,
        source: &Path,
        descriptor_duration: Option<f64>,
        creator: &str,
        output: &Path,
        kind: &'static str,
    ) -> MediaResult<PathBuf> {
        if !source.is_file() {
            return Err(MediaError::FileNotFound(source.to_path_buf()));
        }
        let started = Instant::now();
        let info = probe_video(source).await?;
        let window = self.window_for(info.duration, descriptor_duration);
        if info.duration <= 0.0 {
            warn!(
                source = %source.display(),
                cap = window.duration(),
                "Source length unknown, reading up to the cap"
            );
        } else if !window.is_full(info.duration) {
            info!(
                source = %source.display(),
                from = info.duration,
                to = window.duration(),
                "Truncating short"
            );
        }

        let scratch = fs_utils::scratch_dir(self.scratch_root.as_deref(), "reel-short-")?;
        let rendered = scratch.path().join("short.mp4");
        let (branded_cmd, plain_cmd) = self.render_plan(source, &info, window, creator, &rendered);

        let branded = match branded_cmd {
            Some(cmd) => match self.pool.run(self.runner.run(&cmd)).await {
                Ok(()) => true,
                Err(e @ (MediaError::Cancelled | MediaError::FfmpegNotFound | MediaError::Timeout(_))) => {
                    return Err(e)
                }
                Err(e) => {
                    warn!("Branding failed, writing plain short: {}", e);
                    false
                }
            },
            None => false,
        };
        if !branded {
            self.pool.run(self.runner.run(&plain_cmd)).await?;
        }

        fs_utils::publish(&rendered, output).await?;
        metrics::record_short_created(kind);
        metrics::record_render("short", started.elapsed().as_secs_f64());
        info!(path = %output.display(), branded = branded, "Short written");
        Ok(output.to_path_buf())
    }

    /// FFmpeg invocation for one short; `creator` adds the branding layers.
    pub fn build_command(
        &self,
        source: &Path,
        info: &VideoInfo,
        window: TrimWindow,
        creator: Option<&str>,
        output: &Path,
    ) -> FfmpegCommand {
        let (width, height) = reframed_size(info.width, info.height);
        let mut filters = Vec::new();
        if info.is_landscape() {
            filters.push(format!(
                "crop={}:{}:{}:0",
                width,
                height,
                (info.width - width) / 2
            ));
        }
        if let Some(creator) = creator {
            filters.push(self.overlays(creator, width, height).to_filter_chain());
        }
        filters.push("scale=trunc(iw/2)*2:trunc(ih/2)*2,format=yuv420p,setsar=1".to_string());

        FfmpegCommand::new(source, output)
            .duration(window.duration())
            .video_filter(filters.join(","))
            .map("0:v")
            .map("0:a?")
            .encoding(&self.encoding)
            .output_args(["-movflags", "+faststart"])
    }

    /// Creator caption at the top and the call-to-action band near the bottom.
    pub fn overlays(&self, creator: &str, width: u32, height: u32) -> DrawList {
        let font_size = (height * CAPTION_PER_MILLE / 1000).max(1);
        let mut list = DrawList::new(self.branding.font_file.as_deref());

        list.text(
            TextLayer::new(format!("@{}", creator), font_size, Color::WHITE)
                .centered_at((height * 5 / 100).to_string())
                .with_border(1, Color::BLACK),
        );

        let band_w = width * 95 / 100;
        let band_h = height * 9 / 100;
        let band_center = (height * 85 / 100) as i64;
        list.fill(FillRect {
            x: (width - band_w) as i64 / 2,
            y: band_center - band_h as i64 / 2,
            width: band_w,
            height: band_h,
            color: Color::BLACK.with_alpha(0.7),
        });
        list.text(
            TextLayer::new(
                &self.branding.shorts_call_to_action,
                font_size,
                Color::from_hex_or(&self.branding.shorts_call_to_action_color, Color::rgb(255, 0, 0)),
            )
            .centered_on(width as i64 / 2, band_center)
            .with_border(2, Color::WHITE),
        );
        list
    }
}
