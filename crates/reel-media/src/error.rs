//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Not enough clips: {available} available, {required} required")]
    InsufficientClips { required: usize, available: usize },

    #[error("No usable content: every clip failed preparation")]
    NoUsableContent,

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Detection failed: {0}")]
    DetectionFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::InvalidTransition(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Input was too thin to attempt the operation; nothing was written.
    pub fn is_insufficiency(&self) -> bool {
        matches!(
            self,
            MediaError::InsufficientClips { .. }
                | MediaError::FileNotFound(_)
                | MediaError::InvalidVideo(_)
        )
    }

    /// Failure scoped to one frame, clip or transition; callers skip and continue.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            MediaError::FfmpegFailed { .. }
                | MediaError::FfprobeFailed { .. }
                | MediaError::FileNotFound(_)
                | MediaError::InvalidVideo(_)
                | MediaError::InvalidTransition(_)
                | MediaError::DetectionFailed(_)
                | MediaError::Image(_)
        )
    }
}

impl From<reel_models::ModelError> for MediaError {
    fn from(err: reel_models::ModelError) -> Self {
        MediaError::InvalidSettings(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let insufficient = MediaError::InsufficientClips {
            required: 3,
            available: 2,
        };
        assert!(insufficient.is_insufficiency());
        assert!(!insufficient.is_per_item());
        assert_eq!(
            insufficient.to_string(),
            "Not enough clips: 2 available, 3 required"
        );

        let clip_failure = MediaError::ffmpeg_failed("boom", None, Some(1));
        assert!(clip_failure.is_per_item());
        assert!(!MediaError::NoUsableContent.is_per_item());
        assert!(!MediaError::Cancelled.is_per_item());
    }
}
