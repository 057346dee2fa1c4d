//! Shared data models for the highlight reel compiler.
//!
//! This crate provides Serde-serializable types for:
//! - Source clip descriptors
//! - Encoding presets
//! - Transition kinds and random resolution
//! - Canvas and channel branding
//! - Frame scoring weights
//! - Compilation requests and reports

pub mod branding;
pub mod clip;
pub mod compilation;
pub mod encoding;
pub mod error;
pub mod scoring;
pub mod transition;

// Re-export common types
pub use branding::{parse_hex_color, BrandingConfig, CanvasSize};
pub use clip::{EngagementStats, SourceClip};
pub use compilation::{
    CompilationReport, CompilationRequest, PlanItemKind, SkippedClip, TITLE_SLIDE_SECS,
};
pub use encoding::{EncodingConfig, RateControl};
pub use error::{ModelError, ModelResult};
pub use scoring::ScoringConfig;
pub use transition::{TransitionChoice, TransitionKind, TransitionSpec, DEFAULT_TRANSITION_SECS};
