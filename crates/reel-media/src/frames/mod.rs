//! Candidate frame sampling and scoring.

pub mod extractor;
pub mod scorer;

#[cfg(feature = "opencv")]
pub mod opencv_support;

use image::RgbImage;

pub use extractor::{sample_positions, ExtractorConfig, FrameExtractor};
pub use scorer::{FaceDetector, FrameScore, FrameScorer, SaliencyEstimator, ScoredFrame};

/// A decoded RGB8 sample from one clip.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Id of the clip the frame came from
    pub clip_id: String,
    /// Offset into the clip, in seconds
    pub timestamp: f64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(clip_id: impl Into<String>, timestamp: f64, image: RgbImage) -> Self {
        Self {
            clip_id: clip_id.into(),
            timestamp,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
