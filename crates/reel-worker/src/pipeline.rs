//! One batch run: compile, then thumbnail, then optional shorts.
//!
//! The compilation is the only stage whose failure fails the run. A missing
//! thumbnail or short is logged and the run still succeeds. Every stage
//! keeps its scratch files under one per-run directory that is removed
//! when the run ends, whatever the outcome.

use std::path::{Path, PathBuf};

use chrono::Local;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::Instrument;

use reel_media::{
    CompilationAssembler, FfmpegRunner, FrameExtractor, FrameScorer, MediaSettings, RenderPool,
    ShortsAdapter, ThumbnailComposer,
};
use reel_models::{CompilationReport, CompilationRequest, SourceClip};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::output_paths::{default_title, OutputPaths};

/// Which shorts a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortsMode {
    #[default]
    None,
    /// One short per clip used in the compilation
    Clips,
    /// One short from the start of the compilation
    Compilation,
}

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// JSON array of clip descriptors
    pub manifest: PathBuf,
    pub title: Option<String>,
    /// Overrides the configured maximum
    pub max_videos: Option<usize>,
    pub shorts: ShortsMode,
}

/// What a run wrote.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub title: String,
    pub compilation: CompilationReport,
    pub thumbnail: Option<PathBuf>,
    pub shorts: Vec<PathBuf>,
}

/// Read a clip manifest.
///
/// Relative media paths are resolved against the manifest's directory.
pub async fn load_manifest(path: &Path) -> WorkerResult<Vec<SourceClip>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| WorkerError::manifest(path, e.to_string()))?;
    let mut clips: Vec<SourceClip> =
        serde_json::from_str(&raw).map_err(|e| WorkerError::manifest(path, e.to_string()))?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    for clip in &mut clips {
        if clip.local_path.is_relative() {
            clip.local_path = base.join(&clip.local_path);
        }
    }
    Ok(clips)
}

/// Clips the compilation used, in plan order.
///
/// Only the selected prefix is considered, and each reported id claims one
/// clip, so a dropped clip never stands in for a used one with the same id.
pub fn used_clips(request: &CompilationRequest, report: &CompilationReport) -> Vec<SourceClip> {
    let mut remaining = report.clips_used.iter().peekable();
    request
        .selected()
        .iter()
        .filter(|clip| {
            let claimed = remaining.peek().is_some_and(|id| **id == clip.id);
            if claimed {
                remaining.next();
            }
            claimed
        })
        .cloned()
        .collect()
}

/// Runs the compile, thumbnail and shorts stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: WorkerConfig,
    settings: MediaSettings,
    runner: FfmpegRunner,
    pool: RenderPool,
}

impl Pipeline {
    pub fn new(config: WorkerConfig, settings: MediaSettings) -> Self {
        let runner = FfmpegRunner::new().with_optional_timeout(settings.ffmpeg_timeout);
        let pool = RenderPool::new(config.pool_size);
        Self {
            config,
            settings,
            runner,
            pool,
        }
    }

    /// Stop between steps once `cancel_rx` reads `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.runner = self.runner.with_cancel(cancel_rx);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Compilation request for `clips` under the worker configuration.
    pub fn compilation_request(
        &self,
        clips: Vec<SourceClip>,
        title: &str,
        max_videos: Option<usize>,
    ) -> CompilationRequest {
        let mut request = CompilationRequest::new(clips)
            .with_title(title)
            .with_bounds(
                self.config.min_videos,
                max_videos.unwrap_or(self.config.max_videos),
            );
        request.max_clip_duration = self.config.max_clip_duration;
        request.transition = self.config.transition;
        request.intro = self.config.intro.clone();
        request.outro = self.config.outro.clone();
        request.creator_captions = self.config.creator_captions;
        request
    }

    /// Execute one run.
    pub async fn run(&self, request: &RunRequest) -> WorkerResult<RunSummary> {
        let logger = RunLogger::new("compile");
        let span = logger.create_span();
        self.run_inner(request, logger).instrument(span).await
    }

    async fn run_inner(&self, request: &RunRequest, logger: RunLogger) -> WorkerResult<RunSummary> {
        let clips = load_manifest(&request.manifest).await?;
        logger.log_start(&format!(
            "{} clips from {}",
            clips.len(),
            request.manifest.display()
        ));

        let now = Local::now();
        let title = request
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| default_title(now.date_naive()));
        let outputs = OutputPaths::new(&self.config.output_dir, now);

        let run_scratch = reel_media::fs_utils::scratch_dir(
            Some(self.config.work_dir.as_path()),
            &format!("run-{}-", logger.run_id()),
        )?;
        let mut settings = self.settings.clone();
        settings.scratch_root = Some(run_scratch.path().to_path_buf());

        let compilation_request = self.compilation_request(clips, &title, request.max_videos);
        let assembler = CompilationAssembler::new(
            settings.clone(),
            self.runner.clone(),
            self.pool.clone(),
        );
        let report = match assembler
            .assemble(&compilation_request, &outputs.compilation(Some(&title)))
            .await
        {
            Ok(report) => report,
            Err(e) => {
                logger.log_error(&format!("compilation failed: {}", e));
                return Err(e.into());
            }
        };
        for skipped in &report.skipped {
            logger.log_warning(&format!("clip {} skipped: {}", skipped.id, skipped.reason));
        }
        logger.log_progress(&format!(
            "compilation {} ({:.1}s, {} clips)",
            report.output_path.display(),
            report.duration,
            report.clips_used.len()
        ));

        let used = used_clips(&compilation_request, &report);

        let thumbnail = self
            .thumbnail(&settings, &used, &report, &title, &outputs, &logger.for_operation("thumbnail"))
            .await;

        let shorts = if self.runner.is_cancelled() {
            Vec::new()
        } else {
            self.shorts(&settings, request.shorts, &used, &report, &title, &outputs, &logger.for_operation("shorts"))
                .await?
        };

        logger.log_completion(&format!(
            "compilation, {} thumbnail, {} shorts",
            if thumbnail.is_some() { "1" } else { "no" },
            shorts.len()
        ));

        Ok(RunSummary {
            run_id: logger.run_id().to_string(),
            title,
            compilation: report,
            thumbnail,
            shorts,
        })
    }

    /// Sample the clips used, rank the frames and compose the thumbnail.
    ///
    /// Falls back to sampling the finished compilation when the clips give
    /// no frames.
    async fn thumbnail(
        &self,
        settings: &MediaSettings,
        clips: &[SourceClip],
        report: &CompilationReport,
        title: &str,
        outputs: &OutputPaths,
        logger: &RunLogger,
    ) -> Option<PathBuf> {
        let extractor =
            FrameExtractor::new(self.config.extractor(), self.runner.clone(), self.pool.clone());
        let mut frames = extractor.extract_many(clips).await;
        if frames.is_empty() {
            frames = match extractor.extract_from_compilation(&report.output_path).await {
                Ok(frames) => frames,
                Err(e) => {
                    logger.log_warning(&format!("compilation frames unavailable: {}", e));
                    Vec::new()
                }
            };
        }
        logger.log_progress(&format!("{} candidate frames", frames.len()));

        let scorer = FrameScorer::new(settings.scoring.clone());
        #[cfg(feature = "opencv")]
        let scorer = scorer.with_opencv();
        let ranked = match scorer.rank_frames(frames, &self.pool).await {
            Ok(ranked) => ranked.into_iter().map(|scored| scored.frame).collect(),
            Err(e) => {
                logger.log_warning(&format!("frame scoring failed: {}", e));
                Vec::new()
            }
        };

        let composer = ThumbnailComposer::new(
            settings.thumbnail_canvas,
            settings.branding.clone(),
            self.runner.clone(),
            self.pool.clone(),
        )
        .with_scratch_root(settings.scratch_root.clone());
        let output = outputs.thumbnail(Some(title));
        let written = composer
            .compose(&ranked, title, Local::now().date_naive(), &output)
            .await;
        if written.is_none() {
            logger.log_warning("no thumbnail written");
        }
        written
    }

    #[allow(clippy::too_many_arguments)]
    async fn shorts(
        &self,
        settings: &MediaSettings,
        mode: ShortsMode,
        clips: &[SourceClip],
        report: &CompilationReport,
        title: &str,
        outputs: &OutputPaths,
        logger: &RunLogger,
    ) -> WorkerResult<Vec<PathBuf>> {
        let adapter = ShortsAdapter::new(settings, self.runner.clone(), self.pool.clone())
            .with_max_duration(self.config.shorts_max_secs)
            .with_branding(self.config.shorts_branding);
        match mode {
            ShortsMode::None => Ok(Vec::new()),
            ShortsMode::Compilation => {
                let output = outputs.compilation_short(Some(title));
                match adapter
                    .create_short_from_compilation(&report.output_path, &output)
                    .await
                {
                    Ok(path) => Ok(vec![path]),
                    Err(reel_media::MediaError::Cancelled) => Err(WorkerError::Cancelled),
                    Err(e) => {
                        logger.log_warning(&format!("compilation short failed: {}", e));
                        Ok(Vec::new())
                    }
                }
            }
            ShortsMode::Clips => {
                let written = adapter
                    .create_shorts_from_clips(clips, |clip| outputs.clip_short(&clip.id))
                    .await;
                logger.log_progress(&format!("{} of {} clip shorts", written.len(), clips.len()));
                Ok(written)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{TransitionChoice, TransitionKind, TransitionSpec};
    use tempfile::TempDir;

    fn pipeline(config: WorkerConfig) -> Pipeline {
        Pipeline::new(config, MediaSettings::default())
    }

    #[test]
    fn test_manifest_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("clips.json");
        std::fs::write(
            &manifest,
            r#"[
                {"id": "a", "author": "dancer", "duration": 12.5, "local_path": "videos/a.mp4"},
                {"id": "b", "duration": 8.0, "local_path": "/abs/b.mp4"}
            ]"#,
        )
        .unwrap();

        let clips = tokio_test::block_on(load_manifest(&manifest)).unwrap();
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].local_path, dir.path().join("videos/a.mp4"));
        assert_eq!(clips[0].handle(), Some("dancer"));
        assert_eq!(clips[1].local_path, PathBuf::from("/abs/b.mp4"));
    }

    #[tokio::test]
    async fn test_bad_manifest_is_a_manifest_error() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("clips.json");
        std::fs::write(&manifest, "{not json").unwrap();

        let err = load_manifest(&manifest).await.unwrap_err();
        assert!(matches!(err, WorkerError::Manifest { .. }));
        assert!(err.is_input_error());

        let missing = load_manifest(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(missing, WorkerError::Manifest { .. }));
    }

    #[test]
    fn test_request_carries_worker_settings() {
        let config = WorkerConfig {
            min_videos: 2,
            max_videos: 40,
            max_clip_duration: Some(15.0),
            creator_captions: false,
            transition: Some(TransitionSpec::new(
                TransitionChoice::Concrete(TransitionKind::Crossfade),
                0.8,
            )),
            ..Default::default()
        };
        let clips = vec![SourceClip::new("a", "/a.mp4", 10.0)];

        let request = pipeline(config.clone()).compilation_request(clips.clone(), "Weekly", None);
        assert_eq!(request.min_videos, 2);
        assert_eq!(request.max_videos, 40);
        assert_eq!(request.max_clip_duration, Some(15.0));
        assert!(!request.creator_captions);
        assert_eq!(request.title.as_deref(), Some("Weekly"));
        assert!(request.transition.is_some());

        let capped = pipeline(config).compilation_request(clips, "Weekly", Some(5));
        assert_eq!(capped.max_videos, 5);
    }

    #[test]
    fn test_used_clips_come_from_the_selected_prefix() {
        let clips = vec![
            SourceClip::new("a", "/a.mp4", 5.0),
            SourceClip::new("b", "/b.mp4", 5.0),
            SourceClip::new("c", "/c.mp4", 5.0),
            SourceClip::new("a", "/a-repost.mp4", 5.0),
        ];
        let request = CompilationRequest::new(clips).with_bounds(1, 3);
        let report = CompilationReport {
            output_path: PathBuf::from("/out.mp4"),
            duration: 10.0,
            clips_used: vec!["a".to_string(), "c".to_string()],
            skipped: Vec::new(),
            plan: Vec::new(),
        };

        let used = used_clips(&request, &report);
        let paths: Vec<_> = used.iter().map(|c| c.local_path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/a.mp4"), PathBuf::from("/c.mp4")]);
    }

    #[tokio::test]
    async fn test_too_few_clips_fails_without_outputs() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("clips.json");
        std::fs::write(
            &manifest,
            r#"[{"id": "a", "duration": 10.0, "local_path": "a.mp4"}]"#,
        )
        .unwrap();
        let config = WorkerConfig {
            work_dir: dir.path().join("work"),
            output_dir: dir.path().join("out"),
            ..Default::default()
        };

        let err = pipeline(config)
            .run(&RunRequest {
                manifest,
                title: Some("Weekly".to_string()),
                max_videos: None,
                shorts: ShortsMode::Clips,
            })
            .await
            .unwrap_err();

        assert!(err.is_input_error());
        assert!(!dir.path().join("out").exists());
        // Run scratch is gone once the run ends
        let leftovers = std::fs::read_dir(dir.path().join("work")).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
