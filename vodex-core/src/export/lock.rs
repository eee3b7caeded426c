use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::debug;

use super::error::{ExportError, ExportResult};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive advisory lock on a well-known lock file, so at most one
/// reconciliation run executes at a time (host-spanning when the lock path
/// is shared). Released when the lease is dropped, on every exit path.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub async fn acquire(path: impl AsRef<Path>, timeout: Duration) -> ExportResult<RunLock> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ExportError::LockIo {
                path: path.clone(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|source| ExportError::LockIo {
                path: path.clone(),
                source,
            })?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock() {
                Ok(()) => {
                    debug!(path = %path.display(), "run lock acquired");
                    return Ok(RunLock { file, path });
                }
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(ExportError::LockTimeout {
                            path,
                            waited_ms: timeout.as_millis() as u64,
                        });
                    }
                    sleep(POLL_INTERVAL).await;
                }
                Err(TryLockError::Error(source)) => {
                    return Err(ExportError::LockIo { path, source });
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            debug!(path = %self.path.display(), error = %err, "failed to unlock run lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("vodex.lock");

        let lease = RunLock::acquire(&path, Duration::from_secs(1)).await.unwrap();
        let err = RunLock::acquire(&path, Duration::from_millis(150))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::LockTimeout { .. }));
        drop(lease);
    }

    #[tokio::test]
    async fn dropping_the_lease_releases_the_lock() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("vodex.lock");

        let lease = RunLock::acquire(&path, Duration::from_secs(1)).await.unwrap();
        drop(lease);
        let reacquired = RunLock::acquire(&path, Duration::from_millis(150)).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn missing_parent_directories_are_created() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("deep/nested/vodex.lock");
        let lease = RunLock::acquire(&path, Duration::from_secs(1)).await;
        assert!(lease.is_ok());
        assert!(path.exists());
    }
}
