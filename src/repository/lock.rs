//! Advisory lock guarding a site's files against a second process.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{HarvestError, Result};

/// Exclusive lock on `<code>.checkpoint.json.lock`, released on drop.
#[derive(Debug)]
pub struct SiteLock {
    file: File,
    path: PathBuf,
}

impl SiteLock {
    /// Take the lock without blocking; a held lock yields
    /// [`HarvestError::Locked`].
    pub fn acquire(path: impl Into<PathBuf>, site_code: &str) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        try_lock(&file).map_err(|e| match e.kind() {
            std::io::ErrorKind::WouldBlock => HarvestError::Locked(site_code.to_string()),
            _ => HarvestError::Io(e),
        })?;

        debug!("Locked {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor stays valid for the lifetime of `file`.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Err(std::io::Error::new(std::io::ErrorKind::WouldBlock, err));
    }
    Err(err)
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> std::io::Result<()> {
    Ok(())
}

impl Drop for SiteLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: see `try_lock`.
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
    }
}
