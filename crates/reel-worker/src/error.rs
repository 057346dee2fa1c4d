//! Worker error types.

use std::path::PathBuf;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Manifest error in {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("Model error: {0}")]
    Model(#[from] reel_models::ModelError),

    #[error("Settings file error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn manifest(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Whether the run stopped because of its input rather than a render fault.
    pub fn is_input_error(&self) -> bool {
        match self {
            WorkerError::Manifest { .. } | WorkerError::Model(_) => true,
            WorkerError::Media(e) => e.is_insufficiency(),
            _ => false,
        }
    }

    /// Whether the run was stopped by a shutdown signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            WorkerError::Cancelled | WorkerError::Media(reel_media::MediaError::Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_media::MediaError;

    #[test]
    fn test_insufficiency_is_input_error() {
        let err = WorkerError::from(MediaError::InsufficientClips {
            required: 3,
            available: 2,
        });
        assert!(err.is_input_error());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancellation_is_recognised_through_media() {
        assert!(WorkerError::from(MediaError::Cancelled).is_cancelled());
        assert!(WorkerError::Cancelled.is_cancelled());
        assert!(!WorkerError::config_error("x").is_cancelled());
    }
}
