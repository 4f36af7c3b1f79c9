use std::{
    fs::File,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use fs4::fs_std::FileExt;
use log::{debug, trace};
use thiserror::Error;

const LOCK_TIMEOUT: Duration = Duration::from_secs(300);
const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Exclusive advisory lock on a file, released on drop.
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

#[derive(Error, Debug)]
#[error(transparent)]
pub struct Error(#[from] std::io::Error);

impl FileLock {
    /// Blocks until the lock is acquired, giving up after five minutes.
    pub fn new(path: &Path) -> Result<Self, Error> {
        let file = File::create(path)?;
        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(_) => {
                    trace!("Locked {}", path.display());
                    return Ok(Self {
                        _file: file,
                        path: path.to_path_buf(),
                    });
                }
                Err(error)
                    if error.raw_os_error() == fs4::lock_contended_error().raw_os_error()
                        && start.elapsed() < LOCK_TIMEOUT =>
                {
                    debug!("Failed to acquire a lock on {}, retrying", path.display());
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        trace!("Unlocked {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_can_be_reacquired_after_release() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join(".lock");
        {
            let _lock = FileLock::new(&path).unwrap();
            assert!(path.exists());
        }
        FileLock::new(&path).unwrap();
    }
}
