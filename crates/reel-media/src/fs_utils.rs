//! Filesystem helpers for publishing rendered outputs.
//!
//! Renders always land in scratch space first. [`publish`] moves a finished
//! file into its target so the target path either holds a complete file or
//! nothing at all, even when scratch and target sit on different filesystems.

use std::path::Path;
use tempfile::TempDir;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a finished render from scratch space to `dst`.
///
/// Tries a rename first and falls back to copy-then-rename when the
/// paths cross a device boundary (EXDEV).
pub async fn publish(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if !fs::try_exists(src).await? {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }
    ensure_parent(dst).await?;

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device publish, copying: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_then_rename(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Create the parent directory of `path` when missing.
pub async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Scratch directory for one operation, under `root` when given.
///
/// The directory and everything in it is deleted when the guard drops.
pub fn scratch_dir(root: Option<&Path>, prefix: &str) -> MediaResult<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    let dir = match root {
        Some(root) => {
            std::fs::create_dir_all(root)?;
            builder.tempdir_in(root)?
        }
        None => builder.tempdir()?,
    };
    Ok(dir)
}

/// Remove a file, treating "already gone" as success.
pub async fn remove_if_exists(path: &Path) -> MediaResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// EXDEV is error code 18 on Linux and macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

/// Copy next to `dst`, rename into place, then drop the source.
async fn copy_then_rename(src: &Path, dst: &Path) -> MediaResult<()> {
    let staging = dst.with_extension("partial");

    if let Err(e) = fs::copy(src, &staging).await {
        let _ = remove_if_exists(&staging).await;
        tracing::error!(
            "Copy failed during publish: {} -> {}: {}",
            src.display(),
            staging.display(),
            e
        );
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&staging, dst).await {
        let _ = remove_if_exists(&staging).await;
        tracing::error!(
            "Rename failed during publish: {} -> {}: {}",
            staging.display(),
            dst.display(),
            e
        );
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!("Scratch file left behind: {}: {}", src.display(), e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dir_under_root_is_removed_on_drop() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("runs");
        let scratch = scratch_dir(Some(nested.as_path()), "reel-test-").unwrap();
        let path = scratch.path().to_path_buf();

        assert!(path.starts_with(&nested));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("reel-test-"));
        drop(scratch);
        assert!(!path.exists());
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_publish_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("render.mp4");
        let dst = dir.path().join("out").join("final.mp4");

        fs::write(&src, b"frames").await.unwrap();
        publish(&src, &dst).await.unwrap();

        assert!(!src.exists(), "scratch file should be gone");
        assert_eq!(fs::read(&dst).await.unwrap(), b"frames");
    }

    #[tokio::test]
    async fn test_publish_replaces_existing_target() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("render.mp4");
        let dst = dir.path().join("final.mp4");

        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();
        publish(&src, &dst).await.unwrap();

        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_publish_missing_source_leaves_target_untouched() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("final.mp4");

        let err = publish(dir.path().join("nope.mp4"), &dst).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(!dst.exists());
    }

    #[tokio::test]
    async fn test_remove_if_exists_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.tmp");
        fs::write(&path, b"x").await.unwrap();

        remove_if_exists(&path).await.unwrap();
        remove_if_exists(&path).await.unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }
}
