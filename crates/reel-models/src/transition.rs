//! Inter-clip transition kinds and their resolution.

use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Default transition length in seconds.
pub const DEFAULT_TRANSITION_SECS: f64 = 1.0;

/// A concrete transition algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Outgoing clip fades to black, incoming clip fades in
    Fade,
    /// Both clips overlap while blending
    Crossfade,
    /// Incoming clip slides in from the right, pushing left
    SlideLeft,
    /// Incoming clip slides in from the left, pushing right
    SlideRight,
    /// Outgoing clip grows out of frame
    ZoomIn,
    /// Incoming clip grows from the centre
    ZoomOut,
}

impl TransitionKind {
    /// Every concrete kind, in declaration order.
    pub const ALL: [TransitionKind; 6] = [
        TransitionKind::Fade,
        TransitionKind::Crossfade,
        TransitionKind::SlideLeft,
        TransitionKind::SlideRight,
        TransitionKind::ZoomIn,
        TransitionKind::ZoomOut,
    ];

    /// Whether the two clips overlap during the transition.
    pub fn is_overlapping(&self) -> bool {
        !matches!(self, TransitionKind::Fade)
    }

    /// Duration of two clips joined with this transition.
    pub fn combined_duration(&self, first: f64, second: f64, transition: f64) -> f64 {
        if self.is_overlapping() {
            first + second - transition
        } else {
            first + second
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Fade => "fade",
            TransitionKind::Crossfade => "crossfade",
            TransitionKind::SlideLeft => "slide_left",
            TransitionKind::SlideRight => "slide_right",
            TransitionKind::ZoomIn => "zoom_in",
            TransitionKind::ZoomOut => "zoom_out",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition choice: a fixed kind, or a fresh uniform pick per use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionChoice {
    Concrete(TransitionKind),
    Random,
}

impl FromStr for TransitionChoice {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        if normalized == "random" {
            return Ok(TransitionChoice::Random);
        }
        TransitionKind::ALL
            .iter()
            .find(|kind| kind.as_str() == normalized)
            .map(|kind| TransitionChoice::Concrete(*kind))
            .ok_or(ModelError::UnknownTransition(s.to_string()))
    }
}

/// A transition choice plus its duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransitionSpec {
    pub choice: TransitionChoice,
    /// Transition length in seconds
    pub duration: f64,
}

impl TransitionSpec {
    pub fn new(choice: TransitionChoice, duration: f64) -> Self {
        Self { choice, duration }
    }

    pub fn random(duration: f64) -> Self {
        Self::new(TransitionChoice::Random, duration)
    }

    /// Resolve to a concrete kind. `Random` draws uniformly from [`TransitionKind::ALL`].
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> TransitionKind {
        match self.choice {
            TransitionChoice::Concrete(kind) => kind,
            TransitionChoice::Random => {
                TransitionKind::ALL[rng.random_range(0..TransitionKind::ALL.len())]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_random_covers_every_kind() {
        let spec = TransitionSpec::random(DEFAULT_TRANSITION_SECS);
        let mut rng = StdRng::seed_from_u64(7);
        let seen: HashSet<_> = (0..500).map(|_| spec.resolve(&mut rng)).collect();
        assert_eq!(seen.len(), TransitionKind::ALL.len());
    }

    #[test]
    fn test_seeded_resolution_is_reproducible() {
        let spec = TransitionSpec::random(0.5);
        let a: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..20).map(|_| spec.resolve(&mut rng)).collect()
        };
        let b: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..20).map(|_| spec.resolve(&mut rng)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_concrete_resolves_to_itself() {
        let spec = TransitionSpec::new(TransitionChoice::Concrete(TransitionKind::ZoomOut), 1.0);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(spec.resolve(&mut rng), TransitionKind::ZoomOut);
    }

    #[test]
    fn test_combined_duration() {
        assert_eq!(TransitionKind::Fade.combined_duration(4.0, 6.0, 1.0), 10.0);
        assert_eq!(TransitionKind::Crossfade.combined_duration(4.0, 6.0, 1.0), 9.0);
        assert_eq!(TransitionKind::SlideLeft.combined_duration(4.0, 6.0, 0.5), 9.5);
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!("random".parse::<TransitionChoice>().unwrap(), TransitionChoice::Random);
        assert_eq!(
            "slide-left".parse::<TransitionChoice>().unwrap(),
            TransitionChoice::Concrete(TransitionKind::SlideLeft)
        );
        assert!("wipe".parse::<TransitionChoice>().is_err());
    }
}
