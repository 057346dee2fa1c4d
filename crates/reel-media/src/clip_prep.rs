//! Branded per-clip layout.
//!
//! A vertical source is fitted into the centre of the landscape canvas. The
//! leftover margins become solid side panels carrying the two wordmark
//! halves, and the channel captions run along the bottom. Every prepared
//! clip is a normalised intermediate (canvas size, constant frame rate,
//! yuv420p, stereo AAC at one sample rate) so later stages can concatenate
//! or cross-fade them without another layout pass.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use reel_models::encoding::{AUDIO_SAMPLE_RATE, CANVAS_FPS};
use reel_models::{BrandingConfig, CanvasSize, EncodingConfig, SourceClip};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::overlay::{Color, DrawList, FillRect, TextLayer};
use crate::pool::RenderPool;
use crate::probe::{get_duration, probe_video, VideoInfo};
use crate::settings::MediaSettings;
use crate::trim::{TrimPolicy, TrimWindow};

/// Generated stereo silence at the canvas sample rate.
pub(crate) fn silence_source() -> String {
    format!("anullsrc=r={}:cl=stereo", AUDIO_SAMPLE_RATE)
}

/// Audio normalisation applied to every intermediate.
pub(crate) fn audio_normalise(gain: f64) -> String {
    format!(
        "volume={:.3},aresample={},aformat=channel_layouts=stereo",
        gain, AUDIO_SAMPLE_RATE
    )
}

/// Video normalisation applied to every intermediate.
pub(crate) fn video_normalise() -> String {
    format!("fps={},format=yuv420p,setsar=1", CANVAS_FPS)
}

/// Checks that need neither FFmpeg nor FFprobe: the file exists and the
/// descriptor carries a usable length.
pub(crate) fn check_source(clip: &SourceClip) -> MediaResult<()> {
    if !clip.local_path.is_file() {
        return Err(MediaError::FileNotFound(clip.local_path.clone()));
    }
    clip.validate().map_err(|e| MediaError::InvalidVideo(e.to_string()))
}

/// A clip rendered onto the canvas, ready to be joined.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedClip {
    pub path: PathBuf,
    pub duration: f64,
}

impl PreparedClip {
    /// Read back the rendered length so transition offsets follow what the
    /// encoder actually wrote. Keeps `nominal` when the file can't be read.
    pub(crate) async fn measured(path: &Path, nominal: f64) -> Self {
        let duration = match get_duration(path).await {
            Ok(d) if d.is_finite() && d > 0.0 => d,
            Ok(_) => nominal,
            Err(e) => {
                warn!(path = %path.display(), "Could not measure render, using {:.3}s: {}", nominal, e);
                nominal
            }
        };
        Self {
            path: path.to_path_buf(),
            duration,
        }
    }
}

/// Per-clip options taken from the compilation request.
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    /// Longer clips keep their centred window
    pub max_duration: Option<f64>,
    /// Draw "@author" at the top
    pub creator_caption: bool,
    /// Audio gain multiplier
    pub volume: f64,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            max_duration: None,
            creator_caption: true,
            volume: 1.0,
        }
    }
}

/// Geometry of the branded layout on one canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipLayout {
    pub canvas: CanvasSize,
    /// Width of the centred 9:16 region (even)
    pub inset_width: u32,
    /// Left edge of the centred region
    pub inset_x: u32,
    /// Width of each side panel
    pub panel_width: u32,
    /// Font size of the wordmark halves
    pub wordmark_size: u32,
}

impl ClipLayout {
    pub fn compute(canvas: CanvasSize) -> Self {
        let target = (canvas.height as u64 * 9 / 16) as u32;
        let inset_width = (target / 2 * 2).min(canvas.width);
        let inset_x = (canvas.width - inset_width) / 2;
        let panel_width = inset_x;
        let wordmark_size = ((panel_width as f64 * 0.5).min(canvas.height as f64 * 0.3)) as u32;
        Self {
            canvas,
            inset_width,
            inset_x,
            panel_width,
            wordmark_size,
        }
    }

    /// Horizontal centre of the left panel.
    pub fn left_panel_center(&self) -> i64 {
        self.panel_width as i64 / 2
    }

    /// Horizontal centre of the right panel.
    pub fn right_panel_center(&self) -> i64 {
        self.canvas.width as i64 - self.panel_width as i64 / 2
    }
}

/// Fits source clips onto the branded canvas.
#[derive(Debug, Clone)]
pub struct ClipPreparer {
    layout: ClipLayout,
    branding: BrandingConfig,
    encoding: EncodingConfig,
    runner: FfmpegRunner,
    pool: RenderPool,
}

impl ClipPreparer {
    pub fn new(settings: &MediaSettings, runner: FfmpegRunner, pool: RenderPool) -> Self {
        Self {
            layout: ClipLayout::compute(settings.canvas),
            branding: settings.branding.clone(),
            encoding: settings.intermediate_encoding.clone(),
            runner: runner.for_operation("prepare_clip"),
            pool,
        }
    }

    pub fn layout(&self) -> &ClipLayout {
        &self.layout
    }

    /// Render one source clip to `output`.
    ///
    /// Any failure is scoped to this clip; the caller records it and moves on.
    pub async fn prepare(
        &self,
        clip: &SourceClip,
        options: &PrepareOptions,
        output: &Path,
    ) -> MediaResult<PreparedClip> {
        if let Err(e) = check_source(clip) {
            metrics::record_clip_skipped("prepare");
            return Err(e);
        }

        let started = Instant::now();
        let result = self.render(clip, options, output).await;
        match &result {
            Ok(prepared) => {
                metrics::record_clip_prepared();
                info!(
                    clip_id = %clip.id,
                    duration = prepared.duration,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Prepared clip"
                );
            }
            Err(e) => {
                metrics::record_clip_skipped("prepare");
                warn!(clip_id = %clip.id, "Clip preparation failed: {}", e);
            }
        }
        result
    }

    async fn render(
        &self,
        clip: &SourceClip,
        options: &PrepareOptions,
        output: &Path,
    ) -> MediaResult<PreparedClip> {
        let info = probe_video(&clip.local_path).await?;
        let duration = if info.duration > 0.0 { info.duration } else { clip.duration };
        if !duration.is_finite() || duration <= 0.0 {
            return Err(MediaError::InvalidVideo(format!(
                "{} has no usable duration",
                clip.local_path.display()
            )));
        }

        let window = TrimPolicy::Centered.window(duration, options.max_duration);
        if !window.is_full(duration) {
            info!(
                clip_id = %clip.id,
                from = duration,
                to = window.duration(),
                "Trimming clip to its centre"
            );
        }

        let cmd = self.build_command(clip, &info, window, options, output);
        self.pool.run(self.runner.run(&cmd)).await?;

        Ok(PreparedClip::measured(output, window.duration()).await)
    }

    /// FFmpeg invocation for one clip.
    pub fn build_command(
        &self,
        clip: &SourceClip,
        info: &VideoInfo,
        window: TrimWindow,
        options: &PrepareOptions,
        output: &Path,
    ) -> FfmpegCommand {
        let canvas = self.layout.canvas;
        let duration = window.duration();

        let mut cmd = FfmpegCommand::to_output(output).lavfi_input(format!(
            "color=c=black:s={}x{}:r={}:d={:.3}",
            canvas.width, canvas.height, CANVAS_FPS, duration
        ));
        cmd = cmd.add_input(&clip.local_path);
        if window.start > 0.0 {
            cmd = cmd.seek(window.start);
        }
        cmd = cmd.duration(duration);

        let audio_map = if info.has_audio {
            "[a]".to_string()
        } else {
            cmd = cmd.lavfi_input(silence_source());
            "2:a".to_string()
        };

        let author = if options.creator_caption { clip.handle() } else { None };
        let graph = self.filter_graph(author, info.has_audio, options.volume);

        cmd.filter_complex(graph)
            .map("[v]")
            .map(audio_map)
            .output_duration(duration)
            .encoding(&self.encoding)
    }

    /// Full filter graph: panels, inset, branding text and normalisation.
    pub fn filter_graph(&self, author: Option<&str>, has_audio: bool, volume: f64) -> String {
        let layout = &self.layout;
        let height = layout.canvas.height;

        let mut graph = format!(
            "[0:v]{}[bg];[1:v]scale=-2:{h},crop=w=min(iw\\,{w}):h={h},setsar=1[inset];\
             [bg][inset]overlay=x=(W-w)/2:y=0:shortest=1,{},{}[v]",
            self.panels().to_filter_chain(),
            self.overlays(author).to_filter_chain(),
            video_normalise(),
            h = height,
            w = layout.inset_width,
        );
        if has_audio {
            graph.push_str(&format!(";[1:a]{}[a]", audio_normalise(volume)));
        }
        graph
    }

    fn panels(&self) -> DrawList {
        let layout = &self.layout;
        let color = Color::from_hex_or(&self.branding.panel_color, Color::BLACK);
        let mut list = DrawList::new(self.branding.font_file.as_deref());
        if layout.panel_width > 0 {
            list.fill(FillRect {
                x: 0,
                y: 0,
                width: layout.panel_width,
                height: layout.canvas.height,
                color,
            })
            .fill(FillRect {
                x: (layout.canvas.width - layout.panel_width) as i64,
                y: 0,
                width: layout.panel_width,
                height: layout.canvas.height,
                color,
            });
        }
        list
    }

    /// Text layers drawn over the composed frame, bottom to top.
    pub fn overlays(&self, author: Option<&str>) -> DrawList {
        let layout = &self.layout;
        let branding = &self.branding;
        let (w, h) = (layout.canvas.width as i64, layout.canvas.height as i64);
        let mut list = DrawList::new(branding.font_file.as_deref());

        if layout.panel_width > 0 && layout.wordmark_size > 0 {
            list.text(
                TextLayer::new(
                    &branding.wordmark_left,
                    layout.wordmark_size,
                    Color::from_hex_or(&branding.wordmark_left_color, Color::WHITE),
                )
                .centered_on(layout.left_panel_center(), h / 2),
            );
            list.text(
                TextLayer::new(
                    &branding.wordmark_right,
                    layout.wordmark_size,
                    Color::from_hex_or(&branding.wordmark_right_color, Color::WHITE),
                )
                .centered_on(layout.right_panel_center(), h / 2),
            );
        }

        list.text(TextLayer::new(&branding.watermark, 24, Color::WHITE).at("w-text_w-10", "10"));

        if let Some(author) = author {
            list.text(TextLayer::new(format!("@{}", author), 36, Color::WHITE).centered_at("30"));
        }

        if !branding.channel_handle.trim().is_empty() {
            list.text(
                TextLayer::new(format!("@{}", branding.channel_handle), 48, Color::WHITE)
                    .centered_at((h - 100).to_string()),
            );
        }
        list.text(
            TextLayer::new(&branding.call_to_action, 30, Color::WHITE)
                .centered_at((h - 50).to_string()),
        );
        list.text(
            TextLayer::new(
                &branding.glyph,
                36,
                Color::from_hex_or(&branding.glyph_color, Color::WHITE),
            )
            .at((w - 50).to_string(), (h - 50).to_string()),
        );
        list
    }

    /// Scale and pad an arbitrary video (intro or outro) onto the canvas.
    pub async fn normalize(&self, source: &Path, output: &Path) -> MediaResult<PreparedClip> {
        if !source.is_file() {
            return Err(MediaError::FileNotFound(source.to_path_buf()));
        }
        let info = probe_video(source).await?;
        if info.duration <= 0.0 {
            return Err(MediaError::InvalidVideo(format!(
                "{} has no usable duration",
                source.display()
            )));
        }
        let cmd = self.build_normalize_command(source, &info, output);
        self.pool.run(self.runner.run(&cmd)).await?;
        Ok(PreparedClip::measured(output, info.duration).await)
    }

    fn build_normalize_command(&self, source: &Path, info: &VideoInfo, output: &Path) -> FfmpegCommand {
        let canvas = self.layout.canvas;
        let video = format!(
            "[0:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,{}[v]",
            video_normalise(),
            w = canvas.width,
            h = canvas.height,
        );

        let mut cmd = FfmpegCommand::new(source, output);
        let (graph, audio_map) = if info.has_audio {
            (format!("{};[0:a]{}[a]", video, audio_normalise(1.0)), "[a]")
        } else {
            cmd = cmd.lavfi_input(silence_source());
            (video, "1:a")
        };

        cmd.filter_complex(graph)
            .map("[v]")
            .map(audio_map)
            .output_duration(info.duration)
            .encoding(&self.encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preparer() -> ClipPreparer {
        ClipPreparer::new(&MediaSettings::default(), FfmpegRunner::new(), RenderPool::default())
    }

    fn info(has_audio: bool) -> VideoInfo {
        VideoInfo {
            duration: 20.0,
            width: 1080,
            height: 1920,
            fps: 30.0,
            frame_count: 600,
            has_audio,
        }
    }

    #[test]
    fn test_layout_on_hd_canvas() {
        let layout = ClipLayout::compute(CanvasSize::new(1920, 1080));
        assert_eq!(layout.inset_width, 606);
        assert_eq!(layout.inset_x, 657);
        assert_eq!(layout.panel_width, 657);
        // min(657 * 0.5, 1080 * 0.3)
        assert_eq!(layout.wordmark_size, 324);
        assert_eq!(layout.left_panel_center(), 328);
        assert_eq!(layout.right_panel_center(), 1920 - 328);
    }

    #[test]
    fn test_layout_on_narrow_canvas_has_no_panels() {
        let layout = ClipLayout::compute(CanvasSize::new(360, 720));
        assert_eq!(layout.inset_width, 360);
        assert_eq!(layout.panel_width, 0);
    }

    #[test]
    fn test_overlay_order() {
        let chain = preparer().overlays(Some("dancer")).to_filter_chain();
        let positions: Vec<usize> = [
            "text=Tik",
            "text=Tok",
            "text=TikTok:",
            "text=@dancer",
            "text=@TikTokWeeklyTop",
            "text=SUBSCRIBE",
            "text=\u{266B}",
        ]
        .iter()
        .map(|needle| chain.find(needle).unwrap_or_else(|| panic!("missing {}", needle)))
        .collect();
        assert!(positions.windows(2).all(|p| p[0] < p[1]), "{}", chain);
        assert!(chain.contains("y=980"));
        assert!(chain.contains("y=1030"));
    }

    #[test]
    fn test_creator_caption_is_optional() {
        let list = preparer().overlays(None);
        assert_eq!(list.len(), 6);
        assert!(!list.to_filter_chain().contains("text=@dancer"));
    }

    #[test]
    fn test_filter_graph_shape() {
        let graph = preparer().filter_graph(None, true, 0.5);
        assert!(graph.starts_with("[0:v]drawbox=x=0:y=0:w=657:h=1080"));
        assert!(graph.contains("scale=-2:1080,crop=w=min(iw\\,606):h=1080"));
        assert!(graph.contains("overlay=x=(W-w)/2:y=0:shortest=1"));
        assert!(graph.contains("fps=30,format=yuv420p,setsar=1[v]"));
        assert!(graph.ends_with("[1:a]volume=0.500,aresample=44100,aformat=channel_layouts=stereo[a]"));

        let silent = preparer().filter_graph(None, false, 1.0);
        assert!(!silent.contains("[1:a]"));
    }

    #[test]
    fn test_command_trims_centre_window() {
        let clip = SourceClip::new("c1", "/media/c1.mp4", 20.0).with_author("@dancer");
        let window = TrimPolicy::Centered.window(20.0, Some(8.0));
        let cmd = preparer().build_command(
            &clip,
            &info(true),
            window,
            &PrepareOptions::default(),
            Path::new("/tmp/out.mp4"),
        );
        let args = cmd.build_args().join(" ");
        assert!(args.contains("-ss 6.000 -t 8.000 -i /media/c1.mp4"));
        assert!(args.contains("-map [v] -map [a]"));
        assert!(args.contains("text=@dancer"));
    }

    #[test]
    fn test_command_without_audio_uses_silence() {
        let clip = SourceClip::new("c2", "/media/c2.mp4", 5.0);
        let window = TrimPolicy::Centered.window(5.0, None);
        let cmd = preparer().build_command(
            &clip,
            &info(false),
            window,
            &PrepareOptions::default(),
            Path::new("/tmp/out.mp4"),
        );
        let args = cmd.build_args().join(" ");
        assert!(!args.contains("-ss"));
        assert!(args.contains("-f lavfi -i anullsrc=r=44100:cl=stereo"));
        assert!(args.contains("-map 2:a"));
        assert_eq!(cmd.input_count(), 3);
    }

    #[tokio::test]
    async fn test_missing_file_is_per_item_failure() {
        let clip = SourceClip::new("gone", "/nonexistent/clip.mp4", 10.0);
        let err = preparer()
            .prepare(&clip, &PrepareOptions::default(), Path::new("/tmp/never.mp4"))
            .await
            .unwrap_err();
        assert!(err.is_per_item());
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_descriptor_without_duration_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"bytes").unwrap();
        let output = dir.path().join("out.mp4");

        for duration in [0.0, -3.0, f64::NAN] {
            let clip = SourceClip::new("zero", &path, duration);
            let err = preparer()
                .prepare(&clip, &PrepareOptions::default(), &output)
                .await
                .unwrap_err();
            assert!(matches!(err, MediaError::InvalidVideo(_)), "{}", err);
            assert!(err.is_per_item());
        }
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_unreadable_render_keeps_nominal_length() {
        let dir = tempfile::TempDir::new().unwrap();
        let garbage = dir.path().join("garbage.mp4");
        std::fs::write(&garbage, b"not a video").unwrap();

        let missing = PreparedClip::measured(&dir.path().join("missing.mp4"), 4.5).await;
        assert_eq!(missing.duration, 4.5);

        let unreadable = PreparedClip::measured(&garbage, 3.0).await;
        assert_eq!(unreadable.duration, 3.0);
        assert_eq!(unreadable.path, garbage);
    }
}
