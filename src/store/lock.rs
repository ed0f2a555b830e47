use crate::error::{JobError, Result};
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::path::Path;

pub(crate) struct LedgerLock {
    _flock: Flock<File>,
}

impl LedgerLock {
    /// Blocks until the lock is available; there is no timeout.
    pub(crate) fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| JobError::io("failed to open lock file", e))?;

        let flock = Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| JobError::io("failed to acquire lock", errno.into()))?;

        Ok(Self { _flock: flock })
    }
}
