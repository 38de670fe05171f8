//! Cross-process lock on the state directory.

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};

const LOCK_FILE_NAME: &str = ".lock";

/// Exclusive advisory lock held for as long as the value lives.
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: Utf8PathBuf,
}

impl StateLock {
    /// Lock `state_dir`, creating it if needed.
    ///
    /// Fails with [`Error::Locked`] instead of blocking when another process (or
    /// another `StateLock` in this process) holds the lock.
    pub fn acquire(state_dir: &Utf8Path) -> Result<Self> {
        fs::create_dir_all(state_dir)?;
        let path = state_dir.join(LOCK_FILE_NAME);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(Error::Locked(state_dir.to_path_buf()));
            }
            return Err(e.into());
        }

        tracing::debug!("Acquired state lock {}", path);
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release state lock {}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let dir = TempDir::new().unwrap();
        let state = Utf8PathBuf::from_path_buf(dir.path().join("state")).unwrap();

        let lock = StateLock::acquire(&state).unwrap();
        assert!(lock.path().as_std_path().is_file());
        assert!(matches!(StateLock::acquire(&state), Err(Error::Locked(_))));

        drop(lock);
        assert!(StateLock::acquire(&state).is_ok());
    }
}
