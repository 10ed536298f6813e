use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::planner::{FileAction, FilePlan};

#[derive(Error, Debug)]
pub enum FileOpError {
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileOpError {
    fn io(path: &Path, source: io::Error) -> Self {
        FileOpError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Filesystem side effects of a sort. Both operations create missing parent
/// directories and refuse to overwrite an existing destination.
#[async_trait]
pub trait FileOps: Send + Sync {
    async fn move_file(&self, src: &Path, dst: &Path) -> Result<(), FileOpError>;

    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<(), FileOpError>;
}

/// [`FileOps`] on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileOps;

#[async_trait]
impl FileOps for LocalFileOps {
    async fn move_file(&self, src: &Path, dst: &Path) -> Result<(), FileOpError> {
        ensure_parent(dst).await?;

        // Same filesystem: hard_link fails atomically if dst exists.
        match fs::hard_link(src, dst).await {
            Ok(()) => {
                fs::remove_file(src)
                    .await
                    .map_err(|err| FileOpError::io(src, err))?;
                return Ok(());
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(FileOpError::DestinationExists(dst.to_path_buf()));
            }
            Err(err) => {
                debug!(
                    "hard link {} -> {} failed ({}), falling back to copy",
                    src.display(),
                    dst.display(),
                    err
                );
            }
        }

        copy_exclusive(src, dst).await?;
        fs::remove_file(src)
            .await
            .map_err(|err| FileOpError::io(src, err))
    }

    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<(), FileOpError> {
        ensure_parent(dst).await?;
        copy_exclusive(src, dst).await
    }
}

async fn ensure_parent(dst: &Path) -> Result<(), FileOpError> {
    if let Some(parent) = dst.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| FileOpError::io(parent, err))?;
    }
    Ok(())
}

/// Reserves `dst` with `create_new` before copying, so an existing file is
/// never overwritten.
async fn copy_exclusive(src: &Path, dst: &Path) -> Result<(), FileOpError> {
    let reservation = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dst)
        .await;
    match reservation {
        Ok(file) => drop(file),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(FileOpError::DestinationExists(dst.to_path_buf()));
        }
        Err(err) => return Err(FileOpError::io(dst, err)),
    }

    if let Err(err) = fs::copy(src, dst).await {
        let _ = fs::remove_file(dst).await;
        return Err(FileOpError::io(src, err));
    }
    Ok(())
}

/// Executes `plan` through `ops`.
pub async fn apply_plan(ops: &dyn FileOps, plan: &FilePlan) -> Result<(), FileOpError> {
    match plan.action {
        FileAction::Move => {
            ops.move_file(&plan.source_path, &plan.destination_path)
                .await?
        }
        FileAction::Copy => {
            ops.copy_file(&plan.source_path, &plan.destination_path)
                .await?
        }
    }
    info!(
        "{:?} {} -> {}",
        plan.action,
        plan.source_path.display(),
        plan.destination_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(path, contents).await.unwrap();
    }

    #[tokio::test]
    async fn copy_creates_directories_and_keeps_source() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("in/Heat.1995.mkv");
        let dst = dir.path().join("out/Movies/1995/Heat (1995).mkv");
        write(&src, "video").await;

        LocalFileOps.copy_file(&src, &dst).await.unwrap();

        assert!(src.exists());
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "video");
    }

    #[tokio::test]
    async fn move_removes_source() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("in/Heat.1995.mkv");
        let dst = dir.path().join("out/Heat (1995).mkv");
        write(&src, "video").await;

        let plan = FilePlan {
            source_path: src.clone(),
            destination_path: dst.clone(),
            action: FileAction::Move,
        };
        apply_plan(&LocalFileOps, &plan).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "video");
    }

    #[tokio::test]
    async fn existing_destination_is_a_conflict_and_source_survives() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("in/a.mkv");
        let dst = dir.path().join("out/a.mkv");
        write(&src, "new").await;
        write(&dst, "old").await;

        let err = LocalFileOps.move_file(&src, &dst).await.unwrap_err();
        assert!(matches!(err, FileOpError::DestinationExists(_)));
        let err = LocalFileOps.copy_file(&src, &dst).await.unwrap_err();
        assert!(matches!(err, FileOpError::DestinationExists(_)));

        assert!(src.exists());
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "old");
    }

    #[tokio::test]
    async fn failed_copy_leaves_no_reservation_behind() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("out/missing.mkv");

        let err = LocalFileOps
            .copy_file(&dir.path().join("does-not-exist.mkv"), &dst)
            .await
            .unwrap_err();
        assert!(matches!(err, FileOpError::Io { .. }));
        assert!(!dst.exists());
    }
}
