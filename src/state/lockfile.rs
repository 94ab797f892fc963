//! Single-instance lock
//!
//! An exclusive advisory lock held on an open lock file for the life of the
//! process. The OS drops the lock when the process dies, so a file left
//! behind by a crash never blocks the next start. The owner's PID is written
//! into the file for diagnostics.

use std::fs::{File, OpenOptions, TryLockError};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    file: Option<File>,
}

impl LockFile {
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                let owner = std::fs::read_to_string(path).unwrap_or_default();
                bail!(
                    "Another instance is already running (lock {} held by pid {})",
                    path.display(),
                    owner.trim()
                );
            }
            Err(TryLockError::Error(e)) => {
                return Err(e).with_context(|| format!("Failed to lock {}", path.display()));
            }
        }

        file.set_len(0)
            .and_then(|_| writeln!(file, "{}", std::process::id()))
            .context("Failed to write PID to lock file")?;

        debug!(path = %path.display(), "Acquired instance lock");
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> Result<()> {
        self.remove()
    }

    /// Delete the file while still holding the lock, then unlock by closing
    fn remove(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        let removed = match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove lock file {}", self.path.display())),
        };
        drop(file);
        removed
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!(error = %e, "Failed to release instance lock");
        }
    }
}
