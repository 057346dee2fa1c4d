//! Source clip descriptors handed over by the acquisition side.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ModelError, ModelResult};

/// Engagement counters captured at acquisition time.
///
/// Carried through untouched; the media pipeline never reads them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EngagementStats {
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub views: u64,
}

/// One short source clip as described by the acquisition collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceClip {
    /// Stable identifier of the clip on its origin platform
    pub id: String,

    /// Creator handle, without a leading `@`
    #[serde(default)]
    pub author: String,

    /// Free-form description text
    #[serde(default)]
    pub description: String,

    /// Native duration in seconds
    pub duration: f64,

    /// Native width in pixels
    #[serde(default)]
    pub width: u32,

    /// Native height in pixels
    #[serde(default)]
    pub height: u32,

    /// Local media path of the downloaded clip
    pub local_path: PathBuf,

    /// Where the clip was fetched from
    #[serde(default)]
    pub origin_url: Option<String>,

    #[serde(default)]
    pub stats: EngagementStats,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl SourceClip {
    /// Create a descriptor with only the fields the pipeline needs.
    pub fn new(id: impl Into<String>, local_path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            id: id.into(),
            author: String::new(),
            description: String::new(),
            duration,
            width: 0,
            height: 0,
            local_path: local_path.into(),
            origin_url: None,
            stats: EngagementStats::default(),
            created_at: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Author handle trimmed of any leading `@`, or `None` when blank.
    pub fn handle(&self) -> Option<&str> {
        let handle = self.author.trim().trim_start_matches('@');
        (!handle.is_empty()).then_some(handle)
    }

    /// Whether the clip is wider than it is tall.
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    /// Check the descriptor invariant: positive duration and a readable path.
    pub fn validate(&self) -> ModelResult<()> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(ModelError::invalid_clip(
                &self.id,
                format!("duration must be positive, got {}", self.duration),
            ));
        }
        if !self.local_path.is_file() {
            return Err(ModelError::invalid_clip(
                &self.id,
                format!("media file not readable: {}", self.local_path.display()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_strips_at_sign() {
        let clip = SourceClip::new("a", "/tmp/a.mp4", 10.0).with_author("@dancer");
        assert_eq!(clip.handle(), Some("dancer"));

        let anonymous = SourceClip::new("b", "/tmp/b.mp4", 10.0).with_author("  ");
        assert_eq!(anonymous.handle(), None);
    }

    #[test]
    fn test_validate_rejects_bad_duration() {
        let clip = SourceClip::new("a", "/definitely/missing.mp4", 0.0);
        let err = clip.validate().unwrap_err();
        assert!(matches!(err, ModelError::InvalidClip { .. }));
        assert!(err.to_string().contains("duration"));
    }

    #[test]
    fn test_validate_rejects_missing_file() {
        let clip = SourceClip::new("a", "/definitely/missing.mp4", 12.0);
        let err = clip.validate().unwrap_err();
        assert!(err.to_string().contains("not readable"));
    }

    #[test]
    fn test_deserialize_minimal_manifest_entry() {
        let json = r#"{"id":"7301","duration":14.5,"local_path":"/data/7301.mp4","author":"cat"}"#;
        let clip: SourceClip = serde_json::from_str(json).unwrap();
        assert_eq!(clip.id, "7301");
        assert_eq!(clip.author, "cat");
        assert_eq!(clip.stats, EngagementStats::default());
        assert!(clip.created_at.is_none());
    }

    #[test]
    fn test_is_landscape() {
        let clip = SourceClip::new("a", "/tmp/a.mp4", 5.0).with_dimensions(1920, 1080);
        assert!(clip.is_landscape());
        let clip = clip.with_dimensions(1080, 1920);
        assert!(!clip.is_landscape());
    }
}
