//! Composite engagement score for candidate frames.
//!
//! Four components, each in [0, 1]:
//! - brightness: mean luma, ideal inside a configured band
//! - contrast: luma standard deviation against an empirical ceiling
//! - saliency: a pluggable estimate, or an HSV heuristic
//! - faces: detected face count, saturating at a configured count
//!
//! Scoring never fails. A missing or failing detector contributes 0.

use std::sync::Arc;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::warn;

use reel_models::ScoringConfig;

use crate::error::MediaResult;
use crate::frames::Frame;
use crate::pool::RenderPool;

/// Estimates how visually distinctive a frame is.
pub trait SaliencyEstimator: Send + Sync {
    /// Mean saliency in [0, 1], or `None` when the estimator cannot run here.
    fn estimate(&self, image: &RgbImage) -> MediaResult<Option<f64>>;
}

/// Counts faces in a frame.
pub trait FaceDetector: Send + Sync {
    fn count_faces(&self, image: &RgbImage) -> MediaResult<usize>;
}

/// Per-component breakdown of a frame score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameScore {
    pub total: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub saliency: f64,
    pub face: f64,
}

/// A frame paired with its score.
#[derive(Debug, Clone)]
pub struct ScoredFrame {
    pub frame: Frame,
    pub score: FrameScore,
}

/// Luma and HSV statistics gathered in one pass.
#[derive(Debug, Clone, Copy, Default)]
struct PixelStats {
    mean_luma: f64,
    luma_std: f64,
    mean_saturation: f64,
    mean_value: f64,
}

impl PixelStats {
    fn collect(image: &RgbImage) -> Option<Self> {
        let count = image.width() as f64 * image.height() as f64;
        if count == 0.0 {
            return None;
        }

        let mut luma_sum = 0.0;
        let mut luma_sq_sum = 0.0;
        let mut sat_sum = 0.0;
        let mut val_sum = 0.0;
        for pixel in image.pixels() {
            let [r, g, b] = pixel.0;
            let (r, g, b) = (r as f64, g as f64, b as f64);
            // ITU-R BT.601
            let luma = 0.299 * r + 0.587 * g + 0.114 * b;
            luma_sum += luma;
            luma_sq_sum += luma * luma;

            let (_, s, v) = rgb_to_hsv(r / 255.0, g / 255.0, b / 255.0);
            sat_sum += s;
            val_sum += v;
        }

        let mean = luma_sum / count;
        let variance = (luma_sq_sum / count - mean * mean).max(0.0);
        Some(Self {
            mean_luma: mean,
            luma_std: variance.sqrt(),
            mean_saturation: sat_sum / count,
            mean_value: val_sum / count,
        })
    }
}

/// Convert RGB in [0, 1] to HSV (hue in degrees, S and V in [0, 1]).
pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max == 0.0 { 0.0 } else { delta / max };

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    (h, s, v)
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Scores frames for thumbnail potential.
#[derive(Clone, Default)]
pub struct FrameScorer {
    config: ScoringConfig,
    saliency: Option<Arc<dyn SaliencyEstimator>>,
    faces: Option<Arc<dyn FaceDetector>>,
}

impl std::fmt::Debug for FrameScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScorer")
            .field("config", &self.config)
            .field("saliency", &self.saliency.is_some())
            .field("faces", &self.faces.is_some())
            .finish()
    }
}

impl FrameScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            saliency: None,
            faces: None,
        }
    }

    pub fn with_saliency(mut self, estimator: Arc<dyn SaliencyEstimator>) -> Self {
        self.saliency = Some(estimator);
        self
    }

    pub fn with_face_detector(mut self, detector: Arc<dyn FaceDetector>) -> Self {
        self.faces = Some(detector);
        self
    }

    /// Scorer with the OpenCV detectors when they can be loaded.
    #[cfg(feature = "opencv")]
    pub fn with_opencv(self) -> Self {
        use crate::frames::opencv_support::{HaarFaceDetector, FineGrainedSaliency};

        let scorer = self.with_saliency(Arc::new(FineGrainedSaliency));
        match HaarFaceDetector::from_default_cascade() {
            Ok(detector) => scorer.with_face_detector(Arc::new(detector)),
            Err(e) => {
                warn!("Face detector unavailable, face score disabled: {}", e);
                scorer
            }
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one image. Deterministic for identical pixels and detectors.
    pub fn score_image(&self, image: &RgbImage) -> FrameScore {
        let Some(stats) = PixelStats::collect(image) else {
            return FrameScore::default();
        };

        let brightness = self.brightness_score(stats.mean_luma / 255.0);
        let contrast = unit(stats.luma_std / self.config.contrast_ceiling);
        let saliency = self.saliency_score(image, &stats);
        let face = self.face_score(image);

        let c = &self.config;
        let total = unit(
            c.brightness_weight * brightness
                + c.contrast_weight * contrast
                + c.face_weight * face
                + c.saliency_weight * saliency,
        );

        FrameScore {
            total,
            brightness,
            contrast,
            saliency,
            face,
        }
    }

    pub fn score_frame(&self, frame: &Frame) -> FrameScore {
        self.score_image(&frame.image)
    }

    /// Brightness component for normalised luma `value`.
    pub fn brightness_score(&self, value: f64) -> f64 {
        let c = &self.config;
        if (c.brightness_low..=c.brightness_high).contains(&value) {
            unit(value)
        } else {
            unit(1.0 - c.brightness_falloff * (value - c.brightness_center).abs())
        }
    }

    fn saliency_score(&self, image: &RgbImage, stats: &PixelStats) -> f64 {
        let c = &self.config;
        let blend = c.saliency_saturation_share * stats.mean_saturation
            + c.saliency_value_share * stats.mean_value;

        let Some(estimator) = &self.saliency else {
            return unit(blend);
        };
        match estimator.estimate(image) {
            Ok(Some(value)) if value.is_finite() => unit(value),
            Ok(_) => unit(blend),
            Err(e) => {
                warn!("Saliency estimate failed, using saturation: {}", e);
                unit(stats.mean_saturation)
            }
        }
    }

    fn face_score(&self, image: &RgbImage) -> f64 {
        let Some(detector) = &self.faces else {
            return 0.0;
        };
        match detector.count_faces(image) {
            Ok(count) => unit(count as f64 / self.config.face_saturation),
            Err(e) => {
                warn!("Face detection failed: {}", e);
                0.0
            }
        }
    }

    /// Score frames on the pool and sort best first. Ties keep input order.
    pub async fn rank_frames(&self, frames: Vec<Frame>, pool: &RenderPool) -> MediaResult<Vec<ScoredFrame>> {
        let scorer = self.clone();
        pool.run_blocking(move || {
            let mut scored: Vec<ScoredFrame> = frames
                .into_iter()
                .map(|frame| {
                    let score = scorer.score_frame(&frame);
                    ScoredFrame { frame, score }
                })
                .collect();
            scored.sort_by(|a, b| b.score.total.total_cmp(&a.score.total));
            scored
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use image::Rgb;

    fn solid(r: u8, g: u8, b: u8) -> RgbImage {
        RgbImage::from_pixel(32, 32, Rgb([r, g, b]))
    }

    fn checkerboard() -> RgbImage {
        RgbImage::from_fn(32, 32, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    struct FixedFaces(usize);
    impl FaceDetector for FixedFaces {
        fn count_faces(&self, _: &RgbImage) -> MediaResult<usize> {
            Ok(self.0)
        }
    }

    struct BrokenFaces;
    impl FaceDetector for BrokenFaces {
        fn count_faces(&self, _: &RgbImage) -> MediaResult<usize> {
            Err(MediaError::detection_failed("cascade missing"))
        }
    }

    struct Saliency(MediaResult<Option<f64>>);
    impl SaliencyEstimator for Saliency {
        fn estimate(&self, _: &RgbImage) -> MediaResult<Option<f64>> {
            match &self.0 {
                Ok(v) => Ok(*v),
                Err(_) => Err(MediaError::internal("no saliency")),
            }
        }
    }

    #[test]
    fn test_brightness_band() {
        let scorer = FrameScorer::default();
        assert!((scorer.brightness_score(0.5) - 0.5).abs() < 1e-9);
        assert!((scorer.brightness_score(0.7) - 0.7).abs() < 1e-9);
        // Outside the band, 1 - 2|v - 0.55|
        assert!((scorer.brightness_score(0.8) - 0.5).abs() < 1e-9);
        assert!((scorer.brightness_score(0.3) - 0.5).abs() < 1e-9);
        assert_eq!(scorer.brightness_score(0.0), 0.0);
        assert!((scorer.brightness_score(1.0) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_brightness_decreases_away_from_center() {
        let scorer = FrameScorer::default();
        let above: Vec<f64> = [0.75, 0.8, 0.9, 1.0]
            .iter()
            .map(|v| scorer.brightness_score(*v))
            .collect();
        assert!(above.windows(2).all(|w| w[0] > w[1]));
        let below: Vec<f64> = [0.35, 0.3, 0.2, 0.1]
            .iter()
            .map(|v| scorer.brightness_score(*v))
            .collect();
        assert!(below.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(scorer.brightness_score(0.01), 0.0);
    }

    #[test]
    fn test_scores_stay_in_unit_range() {
        let scorer = FrameScorer::default().with_face_detector(Arc::new(FixedFaces(9)));
        for image in [solid(0, 0, 0), solid(255, 255, 255), solid(200, 30, 90), checkerboard()] {
            let score = scorer.score_image(&image);
            for v in [score.total, score.brightness, score.contrast, score.saliency, score.face] {
                assert!((0.0..=1.0).contains(&v), "{:?}", score);
            }
        }
    }

    #[test]
    fn test_contrast_component() {
        let scorer = FrameScorer::default();
        assert!(scorer.score_image(&solid(120, 120, 120)).contrast < 1e-6);
        // std of a black/white checkerboard is 127.5, over the ceiling
        assert_eq!(scorer.score_image(&checkerboard()).contrast, 1.0);
    }

    #[test]
    fn test_face_component() {
        let one = FrameScorer::default().with_face_detector(Arc::new(FixedFaces(1)));
        assert!((one.score_image(&solid(10, 10, 10)).face - 0.5).abs() < 1e-9);

        let many = FrameScorer::default().with_face_detector(Arc::new(FixedFaces(5)));
        assert_eq!(many.score_image(&solid(10, 10, 10)).face, 1.0);

        let broken = FrameScorer::default().with_face_detector(Arc::new(BrokenFaces));
        assert_eq!(broken.score_image(&solid(10, 10, 10)).face, 0.0);
    }

    #[test]
    fn test_saliency_fallback_ladder() {
        // Pure red: saturation 1, value 1
        let red = solid(255, 0, 0);

        let none = FrameScorer::default();
        assert!((none.score_image(&red).saliency - 1.0).abs() < 1e-9);

        let estimator = FrameScorer::default().with_saliency(Arc::new(Saliency(Ok(Some(0.25)))));
        assert!((estimator.score_image(&red).saliency - 0.25).abs() < 1e-9);

        let unavailable = FrameScorer::default().with_saliency(Arc::new(Saliency(Ok(None))));
        assert!((unavailable.score_image(&red).saliency - 1.0).abs() < 1e-9);

        // Grey: saturation 0, value 0.5; the blend gives 0.15, saturation alone 0
        let grey = solid(128, 128, 128);
        let blend = FrameScorer::default().score_image(&grey).saliency;
        assert!((blend - 0.3 * 128.0 / 255.0).abs() < 1e-9);

        let failing = FrameScorer::default()
            .with_saliency(Arc::new(Saliency(Err(MediaError::internal("x")))));
        assert_eq!(failing.score_image(&grey).saliency, 0.0);
    }

    #[test]
    fn test_composite_weights() {
        let scorer = FrameScorer::default().with_face_detector(Arc::new(FixedFaces(2)));
        let score = scorer.score_image(&solid(128, 128, 128));
        let expected = 0.2 * score.brightness + 0.3 * score.contrast + 0.3 * 1.0 + 0.2 * score.saliency;
        assert!((score.total - expected).abs() < 1e-9);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let scorer = FrameScorer::default();
        let image = checkerboard();
        assert_eq!(scorer.score_image(&image), scorer.score_image(&image));
    }

    #[test]
    fn test_empty_image_scores_zero() {
        let scorer = FrameScorer::default();
        assert_eq!(scorer.score_image(&RgbImage::new(0, 0)), FrameScore::default());
    }

    #[tokio::test]
    async fn test_rank_orders_best_first() {
        let scorer = FrameScorer::default();
        let frames = vec![
            Frame::new("dark", 1.0, solid(0, 0, 0)),
            Frame::new("busy", 2.0, checkerboard()),
            Frame::new("mid", 3.0, solid(140, 140, 140)),
        ];
        let ranked = scorer.rank_frames(frames, &RenderPool::default()).await.unwrap();
        assert_eq!(ranked[0].frame.clip_id, "busy");
        assert_eq!(ranked[2].frame.clip_id, "dark");
        assert!(ranked.windows(2).all(|w| w[0].score.total >= w[1].score.total));
    }
}
