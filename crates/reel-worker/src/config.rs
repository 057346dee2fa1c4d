//! Worker configuration.

use std::path::{Path, PathBuf};

use reel_media::{ExtractorConfig, MediaSettings, SHORTS_MAX_SECS};
use reel_models::{TransitionChoice, TransitionSpec, DEFAULT_TRANSITION_SECS};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Fewest clips a compilation accepts
    pub min_videos: usize,
    /// Most clips a compilation uses
    pub max_videos: usize,
    /// Per-clip cap in seconds
    pub max_clip_duration: Option<f64>,
    pub intro: Option<PathBuf>,
    pub outro: Option<PathBuf>,
    /// Whether creator handles are drawn over clips
    pub creator_captions: bool,
    /// Transition between body clips; hard cuts when `None`
    pub transition: Option<TransitionSpec>,
    /// Scratch space; one subdirectory per run
    pub work_dir: PathBuf,
    /// Root for compilations, thumbnails and shorts
    pub output_dir: PathBuf,
    /// Frames sampled per clip for the thumbnail
    pub frames_per_clip: usize,
    /// Minimum spacing between sampled frames, in seconds
    pub min_frame_interval: f64,
    /// Longest short, in seconds
    pub shorts_max_secs: f64,
    /// Whether shorts carry the creator caption and call-to-action band
    pub shorts_branding: bool,
    /// Concurrent blocking jobs and renders
    pub pool_size: usize,
    /// Kill FFmpeg after this many seconds
    pub ffmpeg_timeout: Option<u64>,
    /// Prometheus text snapshot written at the end of a run
    pub metrics_file: Option<PathBuf>,
    /// Media settings file (JSON, TOML or YAML)
    pub settings_file: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            min_videos: 3,
            max_videos: 200,
            max_clip_duration: None,
            intro: None,
            outro: None,
            creator_captions: true,
            transition: None,
            work_dir: PathBuf::from("/tmp/reel"),
            output_dir: PathBuf::from("data/output"),
            frames_per_clip: 5,
            min_frame_interval: 1.0,
            shorts_max_secs: SHORTS_MAX_SECS,
            shorts_branding: true,
            pool_size: 1,
            ffmpeg_timeout: None,
            metrics_file: None,
            settings_file: None,
        }
    }
}

/// Parse a transition setting; `none` (or empty) means hard cuts.
pub fn parse_transition(value: &str, duration: f64) -> WorkerResult<Option<TransitionSpec>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let choice: TransitionChoice = value.parse()?;
    Ok(Some(TransitionSpec::new(choice, duration)))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty()).map(PathBuf::from)
}

impl WorkerConfig {
    /// Create config from environment variables.
    ///
    /// Unparseable numbers fall back to their defaults; an unknown
    /// transition name is an error.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();
        let transition_secs = env_parse("REEL_TRANSITION_SECS").unwrap_or(DEFAULT_TRANSITION_SECS);
        let transition = match std::env::var("REEL_TRANSITION") {
            Ok(value) => parse_transition(&value, transition_secs)?,
            Err(_) => defaults.transition,
        };

        let config = Self {
            min_videos: env_parse("REEL_MIN_VIDEOS").unwrap_or(defaults.min_videos),
            max_videos: env_parse("REEL_MAX_VIDEOS").unwrap_or(defaults.max_videos),
            max_clip_duration: env_parse("REEL_MAX_CLIP_SECS"),
            intro: env_path("REEL_INTRO"),
            outro: env_path("REEL_OUTRO"),
            creator_captions: env_parse("REEL_CREATOR_CAPTIONS").unwrap_or(defaults.creator_captions),
            transition,
            work_dir: env_path("REEL_WORK_DIR").unwrap_or(defaults.work_dir),
            output_dir: env_path("REEL_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            frames_per_clip: env_parse("REEL_FRAMES_PER_CLIP").unwrap_or(defaults.frames_per_clip),
            min_frame_interval: env_parse("REEL_MIN_FRAME_INTERVAL")
                .unwrap_or(defaults.min_frame_interval),
            shorts_max_secs: env_parse("REEL_SHORTS_MAX_SECS").unwrap_or(defaults.shorts_max_secs),
            shorts_branding: env_parse("REEL_SHORTS_BRANDING").unwrap_or(defaults.shorts_branding),
            pool_size: env_parse("REEL_POOL_SIZE").unwrap_or(defaults.pool_size),
            ffmpeg_timeout: env_parse("REEL_FFMPEG_TIMEOUT_SECS"),
            metrics_file: env_path("REEL_METRICS_FILE"),
            settings_file: env_path("REEL_CONFIG_FILE"),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_videos == 0 || self.min_videos > self.max_videos {
            return Err(WorkerError::config_error(format!(
                "clip bounds must satisfy min <= max and max > 0 (min={}, max={})",
                self.min_videos, self.max_videos
            )));
        }
        if self.frames_per_clip == 0 {
            return Err(WorkerError::config_error("frames per clip must be at least 1"));
        }
        if let Some(cap) = self.max_clip_duration {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(WorkerError::config_error("per-clip cap must be positive"));
            }
        }
        if !self.shorts_max_secs.is_finite() || self.shorts_max_secs <= 0.0 {
            return Err(WorkerError::config_error("shorts cap must be positive"));
        }
        Ok(())
    }

    /// Frame sampling settings.
    pub fn extractor(&self) -> ExtractorConfig {
        ExtractorConfig {
            frames_per_clip: self.frames_per_clip,
            min_frame_interval: self.min_frame_interval,
            ..Default::default()
        }
    }

    /// Media settings from the settings file, or defaults when none is set.
    ///
    /// `REEL_MEDIA__*` environment variables override file values, e.g.
    /// `REEL_MEDIA__BRANDING__CHANNEL_HANDLE`. The worker timeout applies
    /// when the file sets none.
    pub fn media_settings(&self) -> WorkerResult<MediaSettings> {
        let mut settings = load_media_settings(self.settings_file.as_deref())?;
        if settings.ffmpeg_timeout.is_none() {
            settings.ffmpeg_timeout = self.ffmpeg_timeout;
        }
        settings.validate()?;
        Ok(settings)
    }
}

/// Layer an optional settings file and `REEL_MEDIA__*` variables over the defaults.
pub fn load_media_settings(path: Option<&Path>) -> WorkerResult<MediaSettings> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        if !path.is_file() {
            return Err(WorkerError::config_error(format!(
                "settings file not found: {}",
                path.display()
            )));
        }
        builder = builder.add_source(config::File::from(path));
    }
    let merged = builder
        .add_source(
            config::Environment::with_prefix("REEL_MEDIA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(merged.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{CanvasSize, TransitionKind};
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.min_videos, 3);
        assert_eq!(config.max_videos, 200);
        assert!(config.transition.is_none());
        assert!(config.creator_captions);
        assert_eq!(config.work_dir, PathBuf::from("/tmp/reel"));
        assert_eq!(config.shorts_max_secs, 59.0);
        assert!(config.shorts_branding);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_shorts_cap_rejected() {
        let config = WorkerConfig {
            shorts_max_secs: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_transition() {
        assert_eq!(parse_transition("none", 1.0).unwrap(), None);
        assert_eq!(parse_transition("", 1.0).unwrap(), None);
        assert_eq!(
            parse_transition("random", 0.5).unwrap(),
            Some(TransitionSpec::random(0.5))
        );
        assert_eq!(
            parse_transition("slide-left", 1.0).unwrap(),
            Some(TransitionSpec::new(
                TransitionChoice::Concrete(TransitionKind::SlideLeft),
                1.0
            ))
        );
        assert!(parse_transition("spin", 1.0).is_err());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let config = WorkerConfig {
            min_videos: 10,
            max_videos: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_extractor_settings() {
        let config = WorkerConfig {
            frames_per_clip: 3,
            min_frame_interval: 2.0,
            ..Default::default()
        };
        let extractor = config.extractor();
        assert_eq!(extractor.frames_per_clip, 3);
        assert_eq!(extractor.min_frame_interval, 2.0);
    }

    #[test]
    fn test_settings_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"canvas": {{"width": 1280, "height": 720}}, "branding": {{"channel_handle": "ReelsDaily"}}}}"#
        )
        .unwrap();

        let settings = load_media_settings(Some(file.path())).unwrap();
        assert_eq!(settings.canvas, CanvasSize::new(1280, 720));
        assert_eq!(settings.branding.channel_handle, "ReelsDaily");
        assert_eq!(settings.branding.tagline, "Weekly Top");
    }

    #[test]
    fn test_missing_settings_file_is_an_error() {
        let err = load_media_settings(Some(Path::new("/definitely/missing.toml"))).unwrap_err();
        assert!(matches!(err, WorkerError::ConfigError(_)));
    }

    #[test]
    fn test_worker_timeout_fills_gap() {
        let config = WorkerConfig {
            ffmpeg_timeout: Some(900),
            ..Default::default()
        };
        let settings = config.media_settings().unwrap();
        assert_eq!(settings.ffmpeg_timeout, Some(900));
    }
}
