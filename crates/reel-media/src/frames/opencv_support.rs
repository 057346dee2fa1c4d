//! OpenCV-backed face counting and saliency.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::RgbImage;
use opencv::{
    core::{Mat, Rect, Size, Vector},
    objdetect::CascadeClassifier,
    prelude::*,
    saliency::StaticSaliencyFineGrained,
};

use crate::error::{MediaError, MediaResult};
use crate::frames::scorer::{FaceDetector, SaliencyEstimator};

/// Cascade location used when `REEL_HAAR_CASCADE` is unset.
const DEFAULT_CASCADE: &str = "/usr/share/opencv4/haarcascades/haarcascade_frontalface_default.xml";

fn cv_err(e: opencv::Error) -> MediaError {
    MediaError::detection_failed(e.to_string())
}

/// Grayscale copy of an RGB frame as a single-channel Mat.
fn gray_mat(image: &RgbImage) -> MediaResult<Mat> {
    let gray = image::imageops::grayscale(image);
    let rows = gray.height() as i32;
    let flat = Mat::from_slice(gray.as_raw()).map_err(cv_err)?;
    let shaped = flat.reshape(1, rows).map_err(cv_err)?;
    shaped.try_clone().map_err(cv_err)
}

/// Frontal-face Haar cascade.
pub struct HaarFaceDetector {
    classifier: Mutex<CascadeClassifier>,
}

impl HaarFaceDetector {
    pub fn from_path(path: &Path) -> MediaResult<Self> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        let classifier =
            CascadeClassifier::new(&path.to_string_lossy()).map_err(cv_err)?;
        Ok(Self {
            classifier: Mutex::new(classifier),
        })
    }

    pub fn from_default_cascade() -> MediaResult<Self> {
        let path = std::env::var("REEL_HAAR_CASCADE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CASCADE));
        Self::from_path(&path)
    }
}

impl FaceDetector for HaarFaceDetector {
    fn count_faces(&self, image: &RgbImage) -> MediaResult<usize> {
        let gray = gray_mat(image)?;
        let mut faces = Vector::<Rect>::new();
        let mut classifier = self
            .classifier
            .lock()
            .map_err(|_| MediaError::internal("face classifier lock poisoned"))?;
        classifier
            .detect_multi_scale(&gray, &mut faces, 1.1, 5, 0, Size::new(30, 30), Size::default())
            .map_err(cv_err)?;
        Ok(faces.len())
    }
}

/// Fine-grained static saliency, averaged over the frame.
pub struct FineGrainedSaliency;

impl SaliencyEstimator for FineGrainedSaliency {
    fn estimate(&self, image: &RgbImage) -> MediaResult<Option<f64>> {
        let gray = gray_mat(image)?;
        let mut detector = StaticSaliencyFineGrained::create().map_err(cv_err)?;
        let mut map = Mat::default();
        if !detector.compute_saliency(&gray, &mut map).map_err(cv_err)? {
            return Ok(None);
        }
        let mean = opencv::core::mean(&map, &opencv::core::no_array()).map_err(cv_err)?;
        // The fine-grained map is 8-bit
        Ok(Some(mean[0] / 255.0))
    }
}
