//! Canvas geometry and channel branding.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ModelError, ModelResult};

/// Output canvas dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Long-form 16:9 canvas.
    pub const fn landscape_hd() -> Self {
        Self::new(1920, 1080)
    }

    /// Thumbnail canvas.
    pub const fn thumbnail() -> Self {
        Self::new(1280, 720)
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.width < 16 || self.height < 16 {
            return Err(ModelError::invalid_config(format!(
                "canvas {}x{} is too small",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(ModelError::invalid_config(format!(
                "canvas {}x{} must have even dimensions",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::landscape_hd()
    }
}

/// Channel branding shown on clips, shorts and thumbnails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BrandingConfig {
    /// Display name used in synthesized titles and short captions
    pub brand_name: String,
    /// Channel handle, without `@`
    pub channel_handle: String,
    /// Persistent call-to-action under the channel handle
    pub call_to_action: String,
    /// First half of the two-tone wordmark
    pub wordmark_left: String,
    pub wordmark_left_color: String,
    /// Second half of the two-tone wordmark
    pub wordmark_right: String,
    pub wordmark_right_color: String,
    /// Corner watermark text
    pub watermark: String,
    /// Small glyph in the bottom-right corner
    pub glyph: String,
    pub glyph_color: String,
    /// Side panel fill colour
    pub panel_color: String,
    /// Tagline on the text-only thumbnail
    pub tagline: String,
    /// Call-to-action band text on shorts
    pub shorts_call_to_action: String,
    pub shorts_call_to_action_color: String,
    /// Creator label for single-clip shorts without an author
    pub fallback_creator: String,
    /// TrueType font; FFmpeg's default sans font is used when unset
    pub font_file: Option<PathBuf>,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            brand_name: "TikTok Weekly Top".to_string(),
            channel_handle: "TikTokWeeklyTop".to_string(),
            call_to_action: "SUBSCRIBE FOR MORE TIKTOK COMPILATIONS".to_string(),
            wordmark_left: "Tik".to_string(),
            wordmark_left_color: "#ff0050".to_string(),
            wordmark_right: "Tok".to_string(),
            wordmark_right_color: "#00f2ea".to_string(),
            watermark: "TikTok".to_string(),
            glyph: "\u{266B}".to_string(),
            glyph_color: "#00f2ea".to_string(),
            panel_color: "#000000".to_string(),
            tagline: "Weekly Top".to_string(),
            shorts_call_to_action: "WATCH FULL VIDEO ON YOUTUBE".to_string(),
            shorts_call_to_action_color: "#ff0000".to_string(),
            fallback_creator: "TikTok Creator".to_string(),
            font_file: None,
        }
    }
}

impl BrandingConfig {
    /// Check that every colour parses.
    pub fn validate(&self) -> ModelResult<()> {
        for color in [
            &self.wordmark_left_color,
            &self.wordmark_right_color,
            &self.glyph_color,
            &self.panel_color,
            &self.shorts_call_to_action_color,
        ] {
            if parse_hex_color(color).is_none() {
                return Err(ModelError::invalid_config(format!(
                    "invalid colour '{}', expected #rrggbb",
                    color
                )));
            }
        }
        Ok(())
    }
}

/// Parse `#rrggbb` (leading `#` optional) into RGB components.
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff0050"), Some([255, 0, 80]));
        assert_eq!(parse_hex_color("00f2ea"), Some([0, 242, 234]));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn test_default_branding_is_valid() {
        assert!(BrandingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_branding_rejects_bad_colour() {
        let branding = BrandingConfig {
            panel_color: "black".to_string(),
            ..Default::default()
        };
        assert!(branding.validate().is_err());
    }

    #[test]
    fn test_canvas_validation() {
        assert!(CanvasSize::landscape_hd().validate().is_ok());
        assert!(CanvasSize::new(1919, 1080).validate().is_err());
        assert!(CanvasSize::new(8, 8).validate().is_err());
    }

    #[test]
    fn test_partial_branding_deserializes_with_defaults() {
        let branding: BrandingConfig =
            serde_json::from_str(r#"{"channel_handle":"MyChannel"}"#).unwrap();
        assert_eq!(branding.channel_handle, "MyChannel");
        assert_eq!(branding.wordmark_left, "Tik");
    }
}
