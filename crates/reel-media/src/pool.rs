//! Bounded worker pool for blocking media work.
//!
//! Frame decoding, scoring and raster composition run on tokio's blocking
//! threads, and FFmpeg renders hold a permit while they run. The pool size
//! caps how many of either happen at once.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{MediaError, MediaResult};

/// Default number of concurrent jobs.
pub const DEFAULT_POOL_SIZE: usize = 1;

#[derive(Debug, Clone)]
pub struct RenderPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl Default for RenderPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl RenderPool {
    /// Create a pool; a size of zero is raised to one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    async fn acquire(&self) -> MediaResult<OwnedSemaphorePermit> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| MediaError::ResourceLimit("Render pool closed".to_string()))
    }

    /// Run CPU-bound work on a blocking thread once a permit is free.
    pub async fn run_blocking<F, T>(&self, work: F) -> MediaResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.acquire().await?;
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work()
        })
        .await
        .map_err(|e| MediaError::internal(format!("Blocking task failed: {}", e)))?;
        Ok(result)
    }

    /// Run an async job (typically an FFmpeg render) while holding a permit.
    pub async fn run<F, T>(&self, job: F) -> MediaResult<T>
    where
        F: Future<Output = MediaResult<T>>,
    {
        let _permit = self.acquire().await?;
        job.await
    }
}
