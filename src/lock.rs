use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};

/// Host-wide exclusive advisory lock on a well-known path. Held for the
/// duration of one remediation attempt; dropping the guard releases it,
/// so every return path out of the planner — including `?` early
/// returns — releases the lock.
pub struct ExtenderLock {
    _file: File,
}

/// Distinguishes "someone else is already handling it" from an actual
/// I/O failure opening or locking the file.
pub enum LockAttempt {
    Acquired(ExtenderLock),
    Busy,
    Error(std::io::Error),
}

impl ExtenderLock {
    /// Attempts to take the lock at `path` without blocking. Creates the
    /// file if it does not exist; the file carries no content.
    pub fn try_acquire(path: &Path) -> LockAttempt {
        let file = match OpenOptions::new().create(true).write(true).open(path) {
            Ok(f) => f,
            Err(e) => return LockAttempt::Error(e),
        };

        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => LockAttempt::Acquired(ExtenderLock { _file: file }),
            Err(Errno::EAGAIN) | Err(Errno::EWOULDBLOCK) => LockAttempt::Busy,
            Err(e) => LockAttempt::Error(std::io::Error::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn first_acquire_succeeds_second_is_busy() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path();

        let first = ExtenderLock::try_acquire(path);
        assert!(matches!(first, LockAttempt::Acquired(_)));

        // flock is per-process on Linux for the same fd table in a single
        // process, so emulate the cross-process case via a second fd
        // opened independently while the first lock is still held.
        let second_file = OpenOptions::new().write(true).open(path).unwrap();
        let second = flock(second_file.as_raw_fd(), FlockArg::LockExclusiveNonblock);
        assert!(matches!(second, Err(Errno::EAGAIN) | Err(Errno::EWOULDBLOCK)));

        drop(first);
        // after the guard drops, a fresh attempt succeeds again
        let third = ExtenderLock::try_acquire(path);
        assert!(matches!(third, LockAttempt::Acquired(_)));
    }
}
