//! Compilation requests and reports.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clip::SourceClip;
use crate::error::{ModelError, ModelResult};
use crate::transition::TransitionSpec;

/// Length of the generated title slide, in seconds.
pub const TITLE_SLIDE_SECS: f64 = 3.0;

/// Everything the assembler needs to build one compilation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompilationRequest {
    /// Candidate clips in playback order
    pub clips: Vec<SourceClip>,
    /// Title shown on the title slide; no slide when `None`
    pub title: Option<String>,
    /// Fewest descriptors accepted
    pub min_videos: usize,
    /// Most clips used; extras are dropped from the end
    pub max_videos: usize,
    /// Optional per-clip cap in seconds
    #[serde(default)]
    pub max_clip_duration: Option<f64>,
    /// Transition between body clips; hard cuts when `None`
    #[serde(default)]
    pub transition: Option<TransitionSpec>,
    #[serde(default)]
    pub intro: Option<PathBuf>,
    #[serde(default)]
    pub outro: Option<PathBuf>,
    /// Whether the creator handle is drawn over each clip
    #[serde(default = "default_true")]
    pub creator_captions: bool,
    /// Audio gain applied to every body clip
    #[serde(default = "default_gain")]
    pub volume: f64,
}

fn default_true() -> bool {
    true
}

fn default_gain() -> f64 {
    1.0
}

impl CompilationRequest {
    pub fn new(clips: Vec<SourceClip>) -> Self {
        Self {
            clips,
            title: None,
            min_videos: 3,
            max_videos: 200,
            max_clip_duration: None,
            transition: None,
            intro: None,
            outro: None,
            creator_captions: true,
            volume: 1.0,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_bounds(mut self, min_videos: usize, max_videos: usize) -> Self {
        self.min_videos = min_videos;
        self.max_videos = max_videos;
        self
    }

    /// Clips that fit under `max_videos`; later ones are dropped.
    pub fn selected(&self) -> &[SourceClip] {
        &self.clips[..self.clips.len().min(self.max_videos)]
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.max_videos == 0 || self.min_videos > self.max_videos {
            return Err(ModelError::invalid_config(format!(
                "clip bounds must satisfy min <= max and max > 0 (min={}, max={})",
                self.min_videos, self.max_videos
            )));
        }
        if let Some(cap) = self.max_clip_duration {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(ModelError::invalid_config("per-clip cap must be positive"));
            }
        }
        if let Some(transition) = &self.transition {
            if !transition.duration.is_finite() || transition.duration <= 0.0 {
                return Err(ModelError::invalid_config("transition duration must be positive"));
            }
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(ModelError::invalid_config("volume must be non-negative"));
        }
        Ok(())
    }
}

/// Kind of an item in a compilation plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanItemKind {
    TitleSlide,
    Intro,
    Clip,
    Outro,
}

/// A clip the assembler could not use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SkippedClip {
    pub id: String,
    pub reason: String,
}

/// Result of a successful compilation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompilationReport {
    pub output_path: PathBuf,
    /// Probed duration of the written file, in seconds
    pub duration: f64,
    /// Ids of the clips in the body, in playback order
    pub clips_used: Vec<String>,
    pub skipped: Vec<SkippedClip>,
    pub plan: Vec<PlanItemKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = CompilationRequest::new(Vec::new());
        assert_eq!(request.min_videos, 3);
        assert_eq!(request.max_videos, 200);
        assert!(request.transition.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let request = CompilationRequest::new(Vec::new()).with_bounds(5, 2);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_selected_keeps_the_leading_clips() {
        let clips = (0..5)
            .map(|i| SourceClip::new(format!("c{}", i), format!("/c{}.mp4", i), 4.0))
            .collect();
        let request = CompilationRequest::new(clips).with_bounds(1, 3);
        let ids: Vec<&str> = request.selected().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c0", "c1", "c2"]);

        let short = CompilationRequest::new(Vec::new()).with_bounds(1, 3);
        assert!(short.selected().is_empty());
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let json = r#"{"clips":[],"title":"Top 10","min_videos":1,"max_videos":10}"#;
        let request: CompilationRequest = serde_json::from_str(json).unwrap();
        assert!(request.creator_captions);
        assert_eq!(request.volume, 1.0);
        assert_eq!(request.title.as_deref(), Some("Top 10"));
    }
}
