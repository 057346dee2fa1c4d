//! Encoder presets for the three kinds of render the pipeline produces.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Frame rate every intermediate is normalised to
pub const CANVAS_FPS: u32 = 30;
/// Audio sample rate every intermediate is normalised to
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;

/// How the video encoder spends bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RateControl {
    /// Constant quality
    Crf(u8),
    /// Fixed target such as `4000k`
    Bitrate(String),
}

/// Encoder settings applied to one render.
///
/// Missing fields in a settings file fall back to the compilation preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EncodingConfig {
    /// Video encoder, `libx264` unless overridden
    pub codec: String,
    /// x264 speed preset
    pub preset: String,
    pub rate: RateControl,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Appended after everything else
    pub extra_args: Vec<String>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self::for_compilation()
    }
}

impl EncodingConfig {
    /// The published long-form compilation: fixed 4 Mb/s video, 192k audio.
    pub fn for_compilation() -> Self {
        Self {
            codec: "libx264".to_string(),
            preset: "medium".to_string(),
            rate: RateControl::Bitrate("4000k".to_string()),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            extra_args: Vec::new(),
        }
    }

    /// Scratch intermediates; fast and visually lossless.
    pub fn for_intermediate() -> Self {
        Self {
            preset: "veryfast".to_string(),
            rate: RateControl::Crf(18),
            ..Self::for_compilation()
        }
    }

    /// Vertical shorts.
    pub fn for_shorts() -> Self {
        Self {
            preset: "ultrafast".to_string(),
            rate: RateControl::Crf(23),
            audio_bitrate: "128k".to_string(),
            ..Self::for_compilation()
        }
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        self.rate = RateControl::Crf(crf);
        self
    }

    /// Output arguments for FFmpeg, always yuv420p.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let (rate_flag, rate_value) = match &self.rate {
            RateControl::Crf(crf) => ("-crf", crf.to_string()),
            RateControl::Bitrate(bitrate) => ("-b:v", bitrate.clone()),
        };
        let mut args: Vec<String> = [
            "-c:v",
            self.codec.as_str(),
            "-preset",
            self.preset.as_str(),
            rate_flag,
            rate_value.as_str(),
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            self.audio_codec.as_str(),
            "-b:a",
            self.audio_bitrate.as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_compilation_uses_fixed_bitrate() {
        let args = EncodingConfig::for_compilation().to_ffmpeg_args();
        assert!(has_pair(&args, "-b:v", "4000k"));
        assert!(has_pair(&args, "-b:a", "192k"));
        assert!(has_pair(&args, "-preset", "medium"));
        assert!(!args.contains(&"-crf".to_string()));
    }

    #[test]
    fn test_shorts_and_intermediates_use_crf() {
        let shorts = EncodingConfig::for_shorts().to_ffmpeg_args();
        assert!(has_pair(&shorts, "-preset", "ultrafast"));
        assert!(has_pair(&shorts, "-crf", "23"));
        assert!(has_pair(&shorts, "-b:a", "128k"));

        let scratch = EncodingConfig::for_intermediate().with_crf(20).to_ffmpeg_args();
        assert!(has_pair(&scratch, "-crf", "20"));
        assert!(!scratch.contains(&"-b:v".to_string()));
    }

    #[test]
    fn test_partial_settings_fill_from_compilation_preset() {
        let config: EncodingConfig =
            serde_json::from_str(r#"{"preset": "slow", "rate": {"crf": 21}}"#).unwrap();
        assert_eq!(config.preset, "slow");
        assert_eq!(config.rate, RateControl::Crf(21));
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.audio_bitrate, "192k");
    }
}
