//! Thumbnail composition.
//!
//! The composer walks an ordered list of strategies and returns the first
//! thumbnail that gets written. Raster layers (background, insets, top band)
//! are painted in-process; text layers are burned in by one FFmpeg drawtext
//! pass while encoding the JPEG. A failed text pass fails the strategy, so
//! the ladder moves on; only the last rung falls back to the bare raster.

pub mod caption;
pub mod raster;

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::{info, warn};

use reel_models::{BrandingConfig, CanvasSize};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::frames::Frame;
use crate::fs_utils;
use crate::metrics;
use crate::overlay::{Color, DrawList, TextLayer};
use crate::pool::RenderPool;

pub use caption::{derive_captions, Captions};

/// JPEG quality of the in-process encoder.
pub const JPEG_QUALITY: u8 = 95;
/// FFmpeg `-q:v` for the text pass (roughly 95% quality).
const FFMPEG_JPEG_QSCALE: &str = "2";
/// Frames used by the full composition: one background, up to three insets.
const MAX_FRAMES: usize = 4;

/// One way of producing a thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailStrategy {
    /// Blurred top frame, inset tiles, title band and wordmark
    FullComposition,
    /// Gradient with wordmark and captions; needs no frames
    BrandFallback,
}

impl ThumbnailStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThumbnailStrategy::FullComposition => "full",
            ThumbnailStrategy::BrandFallback => "fallback",
        }
    }
}

/// A raster plus the text to burn into it.
struct Layers {
    raster: RgbImage,
    text: DrawList,
}

#[derive(Debug, Clone)]
pub struct ThumbnailComposer {
    canvas: CanvasSize,
    branding: BrandingConfig,
    runner: FfmpegRunner,
    pool: RenderPool,
    strategies: Vec<ThumbnailStrategy>,
    scratch_root: Option<PathBuf>,
}

impl ThumbnailComposer {
    pub fn new(canvas: CanvasSize, branding: BrandingConfig, runner: FfmpegRunner, pool: RenderPool) -> Self {
        Self {
            canvas,
            branding,
            runner,
            pool,
            strategies: vec![ThumbnailStrategy::FullComposition, ThumbnailStrategy::BrandFallback],
            scratch_root: None,
        }
    }

    /// Keep scratch files under `root`.
    pub fn with_scratch_root(mut self, root: Option<PathBuf>) -> Self {
        self.scratch_root = root;
        self
    }

    /// Replace the degradation ladder.
    pub fn with_strategies(mut self, strategies: Vec<ThumbnailStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn strategies(&self) -> &[ThumbnailStrategy] {
        &self.strategies
    }

    /// Compose a thumbnail from frames ranked best first.
    ///
    /// Returns the written path, or `None` when every strategy failed.
    /// Never returns an error.
    pub async fn compose(
        &self,
        ranked: &[Frame],
        title: &str,
        today: NaiveDate,
        output: &Path,
    ) -> Option<PathBuf> {
        self.compose_with(ranked, title, today, output)
            .await
            .map(|_| output.to_path_buf())
    }

    /// Walk the ladder and report which strategy wrote `output`.
    async fn compose_with(
        &self,
        ranked: &[Frame],
        title: &str,
        today: NaiveDate,
        output: &Path,
    ) -> Option<ThumbnailStrategy> {
        let captions = derive_captions(title, &self.branding.brand_name, today);
        let frames: Vec<RgbImage> = ranked.iter().take(MAX_FRAMES).map(|f| f.image.clone()).collect();

        for (index, strategy) in self.strategies.iter().enumerate() {
            let last_rung = index + 1 == self.strategies.len();
            match self.try_strategy(*strategy, &frames, &captions, output, last_rung).await {
                Ok(()) => {
                    metrics::record_thumbnail_strategy(strategy.as_str());
                    info!(
                        strategy = strategy.as_str(),
                        path = %output.display(),
                        "Thumbnail written"
                    );
                    return Some(*strategy);
                }
                Err(e) => warn!(strategy = strategy.as_str(), "Thumbnail strategy failed: {}", e),
            }
        }
        metrics::record_thumbnail_strategy("none");
        None
    }

    async fn try_strategy(
        &self,
        strategy: ThumbnailStrategy,
        frames: &[RgbImage],
        captions: &Captions,
        output: &Path,
        textless_ok: bool,
    ) -> MediaResult<()> {
        let canvas = self.canvas;
        let raster = match strategy {
            ThumbnailStrategy::FullComposition => {
                if frames.is_empty() {
                    return Err(MediaError::InvalidVideo("no frames to compose".to_string()));
                }
                let frames = frames.to_vec();
                self.pool
                    .run_blocking(move || full_raster(&frames, canvas))
                    .await?
            }
            ThumbnailStrategy::BrandFallback => {
                self.pool
                    .run_blocking(move || {
                        raster::vertical_gradient(canvas.width, canvas.height, [20, 20, 30])
                    })
                    .await?
            }
        };
        let text = match strategy {
            ThumbnailStrategy::FullComposition => full_text(&self.branding, captions, canvas),
            ThumbnailStrategy::BrandFallback => fallback_text(&self.branding, captions, canvas),
        };
        self.write(Layers { raster, text }, output, textless_ok).await
    }

    /// Encode to scratch, then publish to `output`.
    ///
    /// When the text pass fails the raster alone is written if `textless_ok`,
    /// otherwise the error is returned.
    async fn write(&self, layers: Layers, output: &Path, textless_ok: bool) -> MediaResult<()> {
        let scratch = fs_utils::scratch_dir(self.scratch_root.as_deref(), "reel-thumb-")?;
        let base = scratch.path().join("base.png");
        let rendered = scratch.path().join("thumbnail.jpg");

        let raster = layers.raster;
        let base_path = base.clone();
        let raster = self
            .pool
            .run_blocking(move || raster.save(&base_path).map(|_| raster))
            .await??;

        let cmd = FfmpegCommand::new(&base, &rendered)
            .video_filter(layers.text.to_filter_chain())
            .output_args(["-frames:v", "1", "-q:v", FFMPEG_JPEG_QSCALE]);

        if let Err(e) = self.runner.run(&cmd).await {
            if !textless_ok {
                return Err(e);
            }
            warn!("Thumbnail text pass failed, writing without text: {}", e);
            let target = rendered.clone();
            self.pool
                .run_blocking(move || encode_jpeg(&raster, &target))
                .await??;
        }

        fs_utils::publish(&rendered, output).await
    }
}

fn encode_jpeg(image: &RgbImage, path: &Path) -> MediaResult<()> {
    let file = std::fs::File::create(path)?;
    let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY);
    encoder.encode_image(image)?;
    Ok(())
}

/// Background, insets and top band.
fn full_raster(frames: &[RgbImage], canvas: CanvasSize) -> RgbImage {
    let (w, h) = (canvas.width, canvas.height);
    let mut image = raster::background(&frames[0], w, h);

    let insets = &frames[1..];
    for (frame, slot) in insets.iter().zip(raster::inset_slots(w, h, insets.len())) {
        raster::draw_inset(&mut image, frame, slot);
    }

    raster::blend_top_band(
        &mut image,
        h / 3,
        Color::BLACK.with_alpha(raster::TOP_BAND_ALPHA as f64),
    );
    image
}

fn wordmark(list: &mut DrawList, branding: &BrandingConfig, size: u32, left_x: i64, right_x: i64, y: i64) {
    list.text(
        TextLayer::new(
            &branding.wordmark_left,
            size,
            Color::from_hex_or(&branding.wordmark_left_color, Color::WHITE),
        )
        .at(left_x.to_string(), y.to_string()),
    );
    list.text(
        TextLayer::new(
            &branding.wordmark_right,
            size,
            Color::from_hex_or(&branding.wordmark_right_color, Color::WHITE),
        )
        .at(format!("{}-text_w", right_x), y.to_string()),
    );
}

fn full_text(branding: &BrandingConfig, captions: &Captions, canvas: CanvasSize) -> DrawList {
    let (w, h) = (canvas.width as i64, canvas.height as i64);
    let mut list = DrawList::new(branding.font_file.as_deref());

    wordmark(&mut list, branding, canvas.width / 10, w * 5 / 100, w * 95 / 100, h / 2);

    let title_size = if captions.title.chars().count() > 30 {
        canvas.width / 25
    } else {
        canvas.width / 20
    };
    list.text(
        TextLayer::new(&captions.title, title_size, Color::WHITE)
            .centered_on(w / 2, h / 6)
            .with_shadow(2, Color::BLACK),
    );
    list.text(
        TextLayer::new(&captions.subtitle, canvas.width / 30, Color::rgb(220, 220, 220))
            .centered_on(w / 2, h / 6 + title_size as i64)
            .with_shadow(2, Color::BLACK),
    );
    list
}

fn fallback_text(branding: &BrandingConfig, captions: &Captions, canvas: CanvasSize) -> DrawList {
    let (w, h) = (canvas.width as i64, canvas.height as i64);
    let mut list = DrawList::new(branding.font_file.as_deref());

    let mark_size = canvas.width / 8;
    wordmark(
        &mut list,
        branding,
        mark_size,
        w * 15 / 100,
        w * 85 / 100,
        h / 2 - mark_size as i64 / 2,
    );

    let title_size = (canvas.width / 15).clamp(60, 120);
    list.text(
        TextLayer::new(&captions.title, title_size, Color::WHITE)
            .centered_on(w / 2, h / 4)
            .with_shadow(3, Color::BLACK),
    );
    list.text(
        TextLayer::new(&captions.subtitle, (canvas.width / 25).min(48), Color::rgb(200, 200, 200))
            .centered_on(w / 2, h / 4 + title_size as i64),
    );
    list.text(
        TextLayer::new(&branding.tagline, (canvas.width / 20).min(72), Color::WHITE)
            .centered_on(w / 2, h * 3 / 4),
    );
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
    }

    fn composer() -> ThumbnailComposer {
        ThumbnailComposer::new(
            CanvasSize::new(320, 180),
            BrandingConfig::default(),
            FfmpegRunner::new(),
            RenderPool::default(),
        )
    }

    fn frame(shade: u8) -> Frame {
        Frame::new("clip", 1.0, RgbImage::from_pixel(64, 36, Rgb([shade, shade / 2, 40])))
    }

    #[tokio::test]
    async fn test_zero_frames_uses_fallback() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("thumb.jpg");

        let written = composer().compose(&[], "Funny cats", today(), &output).await;

        assert_eq!(written.as_deref(), Some(output.as_path()));
        let image = image::open(&output).unwrap();
        assert_eq!((image.width(), image.height()), (320, 180));
    }

    #[tokio::test]
    async fn test_full_composition_with_frames() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("nested").join("thumb.jpg");
        let frames = vec![frame(200), frame(150), frame(100), frame(50), frame(10)];

        let written = composer().compose(&frames, "Top 5", today(), &output).await;

        assert!(written.is_some());
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_empty_ladder_returns_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("thumb.jpg");

        let composer = composer().with_strategies(vec![ThumbnailStrategy::FullComposition]);
        assert!(composer.compose(&[], "x", today(), &output).await.is_none());
        assert!(!output.exists());
    }

    fn failing_text_pass() -> ThumbnailComposer {
        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();
        ThumbnailComposer::new(
            CanvasSize::new(320, 180),
            BrandingConfig::default(),
            FfmpegRunner::new().with_cancel(rx),
            RenderPool::default(),
        )
    }

    #[tokio::test]
    async fn test_failed_text_pass_moves_down_the_ladder() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("thumb.jpg");
        let frames = vec![frame(200), frame(120)];

        let used = failing_text_pass()
            .compose_with(&frames, "Top 2", today(), &output)
            .await;

        assert_eq!(used, Some(ThumbnailStrategy::BrandFallback));
        let image = image::open(&output).unwrap();
        assert_eq!((image.width(), image.height()), (320, 180));
    }

    #[tokio::test]
    async fn test_last_rung_keeps_the_bare_raster() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("thumb.jpg");
        let composer = failing_text_pass().with_strategies(vec![ThumbnailStrategy::FullComposition]);

        let used = composer
            .compose_with(&[frame(200)], "Top 1", today(), &output)
            .await;

        assert_eq!(used, Some(ThumbnailStrategy::FullComposition));
        assert!(output.is_file());
    }

    #[test]
    fn test_full_raster_dimensions() {
        let frames: Vec<RgbImage> = (0..4).map(|i| frame(i * 60).image).collect();
        let image = full_raster(&frames, CanvasSize::new(1280, 720));
        assert_eq!(image.dimensions(), (1280, 720));
        // Inset border survives the band, which only covers the top third
        let slot = raster::inset_slots(1280, 720, 1)[0];
        assert_eq!(image.get_pixel(slot.x, slot.y), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_full_text_layers() {
        let captions = derive_captions("Top moments from a very long month of clips", "Brand", today());
        let list = full_text(&BrandingConfig::default(), &captions, CanvasSize::new(1280, 720));
        // Tik, Tok, title, subtitle
        assert_eq!(list.len(), 4);
        let chain = list.to_filter_chain();
        // Long titles use the smaller size
        assert!(chain.contains(&format!("fontsize={}", 1280 / 25)));
        assert!(chain.contains("fontcolor=0xFF0050"));
        assert!(chain.contains("x=1216-text_w"));
    }

    #[test]
    fn test_fallback_text_layers() {
        let captions = derive_captions("", "Brand", today());
        let list = fallback_text(&BrandingConfig::default(), &captions, CanvasSize::new(1280, 720));
        // Tik, Tok, title, subtitle, tagline
        assert_eq!(list.len(), 5);
        assert!(list.to_filter_chain().contains("text=Weekly Top"));
    }
}
