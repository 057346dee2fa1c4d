#![deny(unreachable_patterns)]
//! FFmpeg-driven compilation and thumbnail pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs and filter graphs
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation support via tokio
//! - Frame sampling and quality scoring
//! - Thumbnail composition with a text-only fallback
//! - Branded per-clip layout, transitions and compilation assembly
//! - Vertical shorts from compilations or single clips

pub mod clip_prep;
pub mod command;
pub mod compilation;
pub mod error;
pub mod frames;
pub mod fs_utils;
pub mod metrics;
pub mod overlay;
pub mod pool;
pub mod probe;
pub mod progress;
pub mod settings;
pub mod shorts;
pub mod thumbnail;
pub mod transition;
pub mod trim;

pub use clip_prep::{ClipLayout, ClipPreparer, PrepareOptions, PreparedClip};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compilation::CompilationAssembler;
pub use error::{MediaError, MediaResult};
pub use frames::{
    ExtractorConfig, FaceDetector, Frame, FrameExtractor, FrameScore, FrameScorer,
    SaliencyEstimator, ScoredFrame,
};
pub use overlay::{Color, DrawCommand, DrawList, FillRect, TextLayer};
pub use pool::RenderPool;
pub use probe::{get_duration, probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressLogger};
pub use settings::MediaSettings;
pub use shorts::{ShortsAdapter, SHORTS_MAX_SECS};
pub use thumbnail::{ThumbnailComposer, ThumbnailStrategy};
pub use transition::{TransitionChain, TransitionEngine};
pub use trim::{TrimPolicy, TrimWindow};
