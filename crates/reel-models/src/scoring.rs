//! Frame scoring weights and thresholds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Weights and thresholds for the composite frame score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScoringConfig {
    pub brightness_weight: f64,
    pub contrast_weight: f64,
    pub face_weight: f64,
    pub saliency_weight: f64,
    /// Lower edge of the ideal normalised luma band
    pub brightness_low: f64,
    /// Upper edge of the ideal normalised luma band
    pub brightness_high: f64,
    /// Luma the out-of-band penalty is measured from
    pub brightness_center: f64,
    /// Slope of the out-of-band penalty
    pub brightness_falloff: f64,
    /// Luma standard deviation that maps to a full contrast score
    pub contrast_ceiling: f64,
    /// Face count that maps to a full face score
    pub face_saturation: f64,
    /// Saturation share of the HSV saliency fallback
    pub saliency_saturation_share: f64,
    /// Value share of the HSV saliency fallback
    pub saliency_value_share: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            brightness_weight: 0.2,
            contrast_weight: 0.3,
            face_weight: 0.3,
            saliency_weight: 0.2,
            brightness_low: 0.4,
            brightness_high: 0.7,
            brightness_center: 0.55,
            brightness_falloff: 2.0,
            contrast_ceiling: 80.0,
            face_saturation: 2.0,
            saliency_saturation_share: 0.7,
            saliency_value_share: 0.3,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> ModelResult<()> {
        let weights = [
            self.brightness_weight,
            self.contrast_weight,
            self.face_weight,
            self.saliency_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ModelError::invalid_config("score weights must be non-negative"));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ModelError::invalid_config(format!(
                "score weights must sum to 1.0, got {:.3}",
                sum
            )));
        }
        if !(0.0..=1.0).contains(&self.brightness_low)
            || !(0.0..=1.0).contains(&self.brightness_high)
            || self.brightness_low >= self.brightness_high
        {
            return Err(ModelError::invalid_config("brightness band must satisfy 0 <= low < high <= 1"));
        }
        if self.contrast_ceiling <= 0.0 || self.face_saturation <= 0.0 {
            return Err(ModelError::invalid_config(
                "contrast ceiling and face saturation must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ScoringConfig::default().validate().is_ok());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let config = ScoringConfig {
            face_weight: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_band_rejected() {
        let config = ScoringConfig {
            brightness_low: 0.8,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
