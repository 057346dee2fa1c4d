//! Batch runner for highlight reel compilations.
//!
//! This crate provides:
//! - Environment configuration and media settings loading
//! - Run orchestration: compilation, thumbnail, shorts
//! - Output naming
//! - Structured run logging
//! - Prometheus metrics snapshots

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod output_paths;
pub mod pipeline;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::RunLogger;
pub use output_paths::{safe_title, OutputPaths};
pub use pipeline::{load_manifest, Pipeline, RunRequest, RunSummary, ShortsMode};
