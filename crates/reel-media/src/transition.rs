//! Transitions between prepared clips.
//!
//! Overlapping kinds use `xfade` for video and `acrossfade` for audio, so the
//! pair loses one transition length. `Fade` fades the outgoing clip out and
//! the incoming clip in, then concatenates, so nothing is lost.
//! [`TransitionChain`] strings any number of clips together in one graph;
//! the assembler uses it to render a whole body in a single pass.

use std::path::Path;

use rand::Rng;
use tracing::info;

use reel_models::{EncodingConfig, TransitionKind, TransitionSpec};

use crate::clip_prep::PreparedClip;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::pool::RenderPool;

/// Incoming clip revealed through a box that grows from the centre.
///
/// `P` runs from 1 to 0 over the transition; `A` is the outgoing frame.
const ZOOM_OUT_EXPR: &str =
    "if(between(X\\,W/2*P\\,W-W/2*P)*between(Y\\,H/2*P\\,H-H/2*P)\\,B\\,A)";

/// `xfade` transition for an overlapping kind.
pub fn xfade_transition(kind: TransitionKind) -> Option<&'static str> {
    match kind {
        TransitionKind::Fade => None,
        TransitionKind::Crossfade => Some("fade"),
        TransitionKind::SlideLeft => Some("slideleft"),
        TransitionKind::SlideRight => Some("slideright"),
        TransitionKind::ZoomIn => Some("zoomin"),
        TransitionKind::ZoomOut => Some("custom"),
    }
}

/// Reject durations that are not positive or not shorter than both clips.
pub fn validate_duration(transition: f64, first: f64, second: f64) -> MediaResult<()> {
    if !transition.is_finite() || transition <= 0.0 {
        return Err(MediaError::invalid_transition(format!(
            "duration must be positive, got {}",
            transition
        )));
    }
    if transition >= first || transition >= second {
        return Err(MediaError::invalid_transition(format!(
            "{:.2}s does not fit clips of {:.2}s and {:.2}s",
            transition, first, second
        )));
    }
    Ok(())
}

/// A rendered filter graph with its output labels.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainGraph {
    pub graph: String,
    pub video: String,
    pub audio: String,
    pub duration: f64,
}

/// Builds one filter graph joining inputs `0..n` in order.
///
/// Every input must carry one video and one audio stream.
#[derive(Debug, Clone)]
pub struct TransitionChain {
    filters: Vec<String>,
    video: String,
    audio: String,
    /// Length of the joined stream so far
    duration: f64,
    /// Length of the most recently added clip
    last_clip: f64,
    inputs: usize,
}

impl TransitionChain {
    /// Start a chain with input 0.
    pub fn start(duration: f64) -> Self {
        Self {
            filters: Vec::new(),
            video: "0:v".to_string(),
            audio: "0:a".to_string(),
            duration,
            last_clip: duration,
            inputs: 1,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.inputs
    }

    pub fn is_empty(&self) -> bool {
        self.inputs == 0
    }

    /// Append the next input with a hard cut.
    pub fn push_cut(&mut self, duration: f64) {
        let n = self.inputs;
        let (v, a) = (format!("vc{}", n), format!("ac{}", n));
        self.filters.push(format!(
            "[{}][{}][{n}:v][{n}:a]concat=n=2:v=1:a=1[{}][{}]",
            self.video, self.audio, v, a
        ));
        self.advance(v, a, self.duration + duration, duration);
    }

    /// Append the next input joined by `kind`.
    ///
    /// An invalid duration leaves the chain untouched.
    pub fn push(&mut self, duration: f64, kind: TransitionKind, transition: f64) -> MediaResult<()> {
        validate_duration(transition, self.last_clip, duration)?;
        let n = self.inputs;

        match xfade_transition(kind) {
            None => {
                let fade_start = (self.duration - transition).max(0.0);
                let (fv, fa) = (format!("vo{}", n), format!("ao{}", n));
                let (iv, ia) = (format!("vi{}", n), format!("ai{}", n));
                let (v, a) = (format!("vf{}", n), format!("af{}", n));
                self.filters.push(format!(
                    "[{}]fade=t=out:st={:.3}:d={:.3}[{}]",
                    self.video, fade_start, transition, fv
                ));
                self.filters.push(format!(
                    "[{}]afade=t=out:st={:.3}:d={:.3}[{}]",
                    self.audio, fade_start, transition, fa
                ));
                self.filters.push(format!("[{n}:v]fade=t=in:st=0:d={:.3}[{}]", transition, iv));
                self.filters.push(format!("[{n}:a]afade=t=in:st=0:d={:.3}[{}]", transition, ia));
                self.filters.push(format!(
                    "[{}][{}][{}][{}]concat=n=2:v=1:a=1[{}][{}]",
                    fv, fa, iv, ia, v, a
                ));
                self.advance(v, a, self.duration + duration, duration);
            }
            Some(name) => {
                let offset = self.duration - transition;
                let (v, a) = (format!("vx{}", n), format!("ax{}", n));
                let expr = if kind == TransitionKind::ZoomOut {
                    format!(":expr={}", ZOOM_OUT_EXPR)
                } else {
                    String::new()
                };
                self.filters.push(format!(
                    "[{}][{n}:v]xfade=transition={}{}:duration={:.3}:offset={:.3}[{}]",
                    self.video, name, expr, transition, offset, v
                ));
                self.filters.push(format!(
                    "[{}][{n}:a]acrossfade=d={:.3}:c1=tri:c2=tri[{}]",
                    self.audio, transition, a
                ));
                self.advance(v, a, self.duration + duration - transition, duration);
            }
        }
        Ok(())
    }

    fn advance(&mut self, video: String, audio: String, duration: f64, clip: f64) {
        self.video = video;
        self.audio = audio;
        self.duration = duration;
        self.last_clip = clip;
        self.inputs += 1;
    }

    /// Close the graph with `[vout]` and `[aout]` labels.
    pub fn finish(mut self) -> ChainGraph {
        self.filters.push(format!("[{}]null[vout]", self.video));
        self.filters.push(format!("[{}]anull[aout]", self.audio));
        ChainGraph {
            graph: self.filters.join(";"),
            video: "[vout]".to_string(),
            audio: "[aout]".to_string(),
            duration: self.duration,
        }
    }
}

/// Splices prepared clips.
#[derive(Debug, Clone)]
pub struct TransitionEngine {
    encoding: EncodingConfig,
    runner: FfmpegRunner,
    pool: RenderPool,
}

impl TransitionEngine {
    pub fn new(encoding: EncodingConfig, runner: FfmpegRunner, pool: RenderPool) -> Self {
        Self {
            encoding,
            runner: runner.for_operation("transition"),
            pool,
        }
    }

    /// Pick the concrete kind for one use of `spec`.
    pub fn resolve<R: Rng + ?Sized>(spec: &TransitionSpec, rng: &mut R) -> TransitionKind {
        spec.resolve(rng)
    }

    /// Join two prepared clips into `output`.
    pub async fn splice(
        &self,
        first: &PreparedClip,
        second: &PreparedClip,
        kind: TransitionKind,
        duration: f64,
        output: &Path,
    ) -> MediaResult<PreparedClip> {
        let mut chain = TransitionChain::start(first.duration);
        chain.push(second.duration, kind, duration)?;
        let graph = chain.finish();

        let cmd = FfmpegCommand::to_output(output)
            .add_input(&first.path)
            .add_input(&second.path)
            .filter_complex(&graph.graph)
            .map(&graph.video)
            .map(&graph.audio)
            .encoding(&self.encoding);

        info!(
            kind = %kind,
            transition = duration,
            combined = graph.duration,
            "Splicing clips"
        );
        self.pool.run(self.runner.run(&cmd)).await?;

        Ok(PreparedClip::measured(output, graph.duration).await)
    }
}
