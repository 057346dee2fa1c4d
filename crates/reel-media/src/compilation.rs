//! Compilation assembly.
//!
//! The plan is `[title slide] [intro] clips.. [outro]`. Each item is
//! rendered to a normalised intermediate in a scratch directory owned by
//! the call, then the items are joined in one final render. Hard cuts go
//! through the concat demuxer; transitions go through a [`TransitionChain`].
//! The final file is written to scratch and only moved to the target after
//! FFmpeg succeeds.

use std::path::Path;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info, warn};

use reel_models::encoding::CANVAS_FPS;
use reel_models::{
    CompilationReport, CompilationRequest, PlanItemKind, SkippedClip, SourceClip, TransitionSpec,
    TITLE_SLIDE_SECS,
};

use crate::clip_prep::{
    check_source, silence_source, video_normalise, ClipPreparer, PrepareOptions, PreparedClip,
};
use crate::command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils;
use crate::metrics;
use crate::overlay::{Color, DrawList, TextLayer};
use crate::pool::RenderPool;
use crate::probe::get_duration;
use crate::progress::ProgressLogger;
use crate::settings::MediaSettings;
use crate::transition::{TransitionChain, TransitionEngine};

/// Font size of the title slide text.
const TITLE_FONT_SIZE: u32 = 70;

/// One rendered plan item.
#[derive(Debug, Clone)]
struct PlanItem {
    kind: PlanItemKind,
    clip: PreparedClip,
}

/// Concat demuxer list for `paths`.
pub fn concat_list(paths: &[&Path]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

/// Split `selected` into clips worth rendering and clips skipped up front.
fn screen(selected: &[SourceClip]) -> (Vec<&SourceClip>, Vec<SkippedClip>) {
    let mut usable = Vec::with_capacity(selected.len());
    let mut skipped = Vec::new();
    for clip in selected {
        match check_source(clip) {
            Ok(()) => usable.push(clip),
            Err(e) => {
                metrics::record_clip_skipped("prepare");
                warn!(clip_id = %clip.id, "Skipping clip: {}", e);
                skipped.push(SkippedClip {
                    id: clip.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    (usable, skipped)
}

/// Builds compilations from source clips.
#[derive(Debug, Clone)]
pub struct CompilationAssembler {
    settings: MediaSettings,
    preparer: ClipPreparer,
    runner: FfmpegRunner,
    pool: RenderPool,
    seed: Option<u64>,
}

impl CompilationAssembler {
    pub fn new(settings: MediaSettings, runner: FfmpegRunner, pool: RenderPool) -> Self {
        let preparer = ClipPreparer::new(&settings, runner.clone(), pool.clone());
        Self {
            settings,
            preparer,
            runner,
            pool,
            seed: None,
        }
    }

    /// Fix the RNG used for random transitions.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn preparer(&self) -> &ClipPreparer {
        &self.preparer
    }

    /// Build the compilation described by `request` at `output`.
    ///
    /// Too few clips fails before anything is rendered. Clips that fail
    /// preparation are skipped and listed in the report.
    pub async fn assemble(
        &self,
        request: &CompilationRequest,
        output: &Path,
    ) -> MediaResult<CompilationReport> {
        request.validate()?;
        if request.clips.len() < request.min_videos {
            return Err(MediaError::InsufficientClips {
                required: request.min_videos,
                available: request.clips.len(),
            });
        }

        let selected = request.selected();
        if selected.len() < request.clips.len() {
            info!(
                available = request.clips.len(),
                kept = selected.len(),
                "Dropping clips past the maximum"
            );
        }
        let (candidates, mut skipped) = screen(selected);
        if candidates.is_empty() {
            return Err(MediaError::NoUsableContent);
        }
        check_ffmpeg()?;

        let started = Instant::now();
        let scratch = fs_utils::scratch_dir(self.settings.scratch_root.as_deref(), "reel-compile-")?;
        let mut items: Vec<PlanItem> = Vec::new();
        let mut clips_used = Vec::new();

        if let Some(title) = request.title.as_deref().filter(|t| !t.trim().is_empty()) {
            let path = scratch.path().join("title.mp4");
            match self.title_slide(title, &path).await {
                Ok(clip) => items.push(PlanItem {
                    kind: PlanItemKind::TitleSlide,
                    clip,
                }),
                Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
                Err(e) => warn!("Title slide failed, continuing without it: {}", e),
            }
        }

        if let Some(intro) = &request.intro {
            self.push_bookend(&mut items, PlanItemKind::Intro, intro, &scratch).await?;
        }

        let options = PrepareOptions {
            max_duration: request.max_clip_duration,
            creator_caption: request.creator_captions,
            volume: request.volume,
        };
        for (index, clip) in candidates.into_iter().enumerate() {
            if self.runner.is_cancelled() {
                info!(prepared = clips_used.len(), "Cancelled between clips");
                return Err(MediaError::Cancelled);
            }
            let path = scratch.path().join(format!("clip_{:03}.mp4", index));
            match self.preparer.prepare(clip, &options, &path).await {
                Ok(prepared) => {
                    clips_used.push(clip.id.clone());
                    items.push(PlanItem {
                        kind: PlanItemKind::Clip,
                        clip: prepared,
                    });
                }
                Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
                Err(e) => skipped.push(SkippedClip {
                    id: clip.id.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        if clips_used.is_empty() {
            return Err(MediaError::NoUsableContent);
        }

        if let Some(outro) = &request.outro {
            self.push_bookend(&mut items, PlanItemKind::Outro, outro, &scratch).await?;
        }

        let rendered = scratch.path().join("compilation.mp4");
        let planned = match &request.transition {
            Some(spec) => self.render_with_transitions(&items, spec, &rendered).await?,
            None => self.render_concat(&items, scratch.path(), &rendered).await?,
        };

        fs_utils::publish(&rendered, output).await?;
        let duration = match get_duration(output).await {
            Ok(d) => d,
            Err(e) => {
                warn!("Could not probe finished compilation: {}", e);
                planned
            }
        };

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_render("compilation", elapsed);
        info!(
            path = %output.display(),
            duration = duration,
            clips = clips_used.len(),
            skipped = skipped.len(),
            elapsed_secs = elapsed,
            "Compilation written"
        );

        Ok(CompilationReport {
            output_path: output.to_path_buf(),
            duration,
            clips_used,
            skipped,
            plan: items.iter().map(|item| item.kind).collect(),
        })
    }

    /// Normalise an intro or outro; a failure only drops the item.
    async fn push_bookend(
        &self,
        items: &mut Vec<PlanItem>,
        kind: PlanItemKind,
        source: &Path,
        scratch: &TempDir,
    ) -> MediaResult<()> {
        let name = match kind {
            PlanItemKind::Intro => "intro.mp4",
            _ => "outro.mp4",
        };
        match self.preparer.normalize(source, &scratch.path().join(name)).await {
            Ok(clip) => items.push(PlanItem { kind, clip }),
            Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
            Err(e) => warn!(source = %source.display(), "Skipping {:?}: {}", kind, e),
        }
        Ok(())
    }

    /// Black slide with the centred title over silence.
    async fn title_slide(&self, title: &str, output: &Path) -> MediaResult<PreparedClip> {
        let canvas = self.settings.canvas;
        let mut text = DrawList::new(self.settings.branding.font_file.as_deref());
        text.text(
            TextLayer::new(title, TITLE_FONT_SIZE, Color::WHITE)
                .centered_on(canvas.width as i64 / 2, canvas.height as i64 / 2),
        );

        let cmd = FfmpegCommand::to_output(output)
            .lavfi_input(format!(
                "color=c=black:s={}x{}:r={}:d={:.3}",
                canvas.width, canvas.height, CANVAS_FPS, TITLE_SLIDE_SECS
            ))
            .lavfi_input(silence_source())
            .filter_complex(format!("[0:v]{},{}[v]", text.to_filter_chain(), video_normalise()))
            .map("[v]")
            .map("1:a")
            .output_duration(TITLE_SLIDE_SECS)
            .encoding(&self.settings.intermediate_encoding);

        self.pool
            .run(self.runner.clone().for_operation("title_slide").run(&cmd))
            .await?;
        Ok(PreparedClip::measured(output, TITLE_SLIDE_SECS).await)
    }

    /// Join every item with hard cuts through the concat demuxer.
    async fn render_concat(&self, items: &[PlanItem], scratch: &Path, output: &Path) -> MediaResult<f64> {
        let list_path = scratch.join("concat.txt");
        let paths: Vec<&Path> = items.iter().map(|item| item.clip.path.as_path()).collect();
        fs::write(&list_path, concat_list(&paths)).await?;

        let duration: f64 = items.iter().map(|item| item.clip.duration).sum();
        let cmd = FfmpegCommand::to_output(output)
            .add_input(&list_path)
            .input_args(["-f", "concat", "-safe", "0"])
            .map("0:v")
            .map("0:a")
            .encoding(&self.settings.compilation_encoding)
            .output_args(["-movflags", "+faststart"]);

        self.run_final(&cmd, duration).await?;
        Ok(duration)
    }

    /// Join clips with transitions; bookends and failed pairs get hard cuts.
    async fn render_with_transitions(
        &self,
        items: &[PlanItem],
        spec: &TransitionSpec,
        output: &Path,
    ) -> MediaResult<f64> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut chain = TransitionChain::start(items[0].clip.duration);
        let mut cmd = FfmpegCommand::to_output(output).add_input(&items[0].clip.path);
        for pair in items.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            cmd = cmd.add_input(&next.clip.path);
            if prev.kind != PlanItemKind::Clip || next.kind != PlanItemKind::Clip {
                chain.push_cut(next.clip.duration);
                continue;
            }
            let kind = TransitionEngine::resolve(spec, &mut rng);
            if let Err(e) = chain.push(next.clip.duration, kind, spec.duration) {
                warn!(kind = %kind, "Falling back to a hard cut: {}", e);
                chain.push_cut(next.clip.duration);
            } else {
                debug!(kind = %kind, "Transition");
            }
        }

        let graph = chain.finish();
        let cmd = cmd
            .filter_complex(&graph.graph)
            .map(&graph.video)
            .map(&graph.audio)
            .encoding(&self.settings.compilation_encoding)
            .output_args(["-movflags", "+faststart"]);

        self.run_final(&cmd, graph.duration).await?;
        Ok(graph.duration)
    }

    async fn run_final(&self, cmd: &FfmpegCommand, expected_secs: f64) -> MediaResult<()> {
        let logger = ProgressLogger::new("compilation", expected_secs);
        let runner = self.runner.clone().for_operation("compilation");
        self.pool
            .run(runner.run_with_progress(cmd, move |p| {
                logger.observe(&p);
            }))
            .await
    }
}
