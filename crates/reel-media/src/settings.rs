//! Settings handed to the pipeline components.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use reel_models::{BrandingConfig, CanvasSize, EncodingConfig, ScoringConfig};

use crate::error::MediaResult;

/// Canvas, branding, encoding and scoring configuration for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    /// Compilation canvas (16:9)
    pub canvas: CanvasSize,
    /// Thumbnail raster size
    pub thumbnail_canvas: CanvasSize,
    pub branding: BrandingConfig,
    /// Final compilation render
    pub compilation_encoding: EncodingConfig,
    /// Per-clip intermediates and title slides
    pub intermediate_encoding: EncodingConfig,
    /// Vertical shorts
    pub shorts_encoding: EncodingConfig,
    pub scoring: ScoringConfig,
    /// Kill FFmpeg after this many seconds
    pub ffmpeg_timeout: Option<u64>,
    /// Parent of per-operation scratch directories; the system temp dir when unset
    pub scratch_root: Option<PathBuf>,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            canvas: CanvasSize::landscape_hd(),
            thumbnail_canvas: CanvasSize::thumbnail(),
            branding: BrandingConfig::default(),
            compilation_encoding: EncodingConfig::for_compilation(),
            intermediate_encoding: EncodingConfig::for_intermediate(),
            shorts_encoding: EncodingConfig::for_shorts(),
            scoring: ScoringConfig::default(),
            ffmpeg_timeout: None,
            scratch_root: None,
        }
    }
}

impl MediaSettings {
    pub fn validate(&self) -> MediaResult<()> {
        self.canvas.validate()?;
        self.thumbnail_canvas.validate()?;
        self.branding.validate()?;
        self.scoring.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = MediaSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.canvas, CanvasSize::new(1920, 1080));
        assert_eq!(settings.thumbnail_canvas, CanvasSize::new(1280, 720));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: MediaSettings =
            serde_json::from_str(r#"{"canvas": {"width": 1280, "height": 720}, "ffmpeg_timeout": 600}"#)
                .unwrap();
        assert_eq!(settings.canvas, CanvasSize::new(1280, 720));
        assert_eq!(settings.ffmpeg_timeout, Some(600));
        assert_eq!(settings.branding, BrandingConfig::default());
    }

    #[test]
    fn test_odd_canvas_is_rejected() {
        let settings = MediaSettings {
            canvas: CanvasSize::new(1921, 1080),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
