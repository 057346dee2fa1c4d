//! Validation errors for shared models.

use thiserror::Error;

/// Result type for model validation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised when a descriptor or settings block is malformed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid clip descriptor {id}: {reason}")]
    InvalidClip { id: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown transition kind: {0}")]
    UnknownTransition(String),
}

impl ModelError {
    pub fn invalid_clip(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidClip {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
