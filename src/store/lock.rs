//! Advisory whole-file locks
//!
//! On unix this is `flock(2)`: the lock belongs to the open file description,
//! so two independent `open()` calls contend even inside one process. Other
//! platforms get no locking at all.

use std::fs::File;
use std::io;

/// Lock flavor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LockMode {
    /// Many readers
    Shared,
    /// One writer, no readers
    Exclusive,
}

/// Held lock; released on drop
#[must_use]
pub(crate) struct FileLock<'a> {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: &'a File,
}

impl<'a> FileLock<'a> {
    /// Block until the lock is granted
    pub(crate) fn acquire(file: &'a File, mode: LockMode) -> io::Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let operation = match mode {
                LockMode::Shared => libc::LOCK_SH,
                LockMode::Exclusive => libc::LOCK_EX,
            };

            loop {
                // SAFETY: the descriptor comes from a live `File` borrowed for
                // the lifetime of the guard, and flock does not touch memory.
                let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
                if rc == 0 {
                    break;
                }
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::Interrupted {
                    return Err(err);
                }
            }
        }

        #[cfg(not(unix))]
        let _ = mode;

        Ok(Self { file })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            // SAFETY: same descriptor as in `acquire`; it is still open because
            // the guard borrows the `File`.
            let rc = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
            if rc != 0 {
                tracing::warn!(
                    error = %io::Error::last_os_error(),
                    "failed to release advisory lock"
                );
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;

    fn try_lock(file: &File, operation: i32) -> bool {
        // SAFETY: valid descriptor owned by `file`
        unsafe { libc::flock(file.as_raw_fd(), operation | libc::LOCK_NB) == 0 }
    }

    fn unlock(file: &File) {
        // SAFETY: valid descriptor owned by `file`
        unsafe {
            libc::flock(file.as_raw_fd(), libc::LOCK_UN);
        }
    }

    #[test]
    fn exclusive_lock_blocks_other_descriptors_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "{}").unwrap();

        let holder = File::open(&path).unwrap();
        let other = File::open(&path).unwrap();

        let guard = FileLock::acquire(&holder, LockMode::Exclusive).unwrap();
        assert!(!try_lock(&other, libc::LOCK_SH));

        drop(guard);
        assert!(try_lock(&other, libc::LOCK_EX));
        unlock(&other);
    }

    #[test]
    fn shared_locks_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "{}").unwrap();

        let a = File::open(&path).unwrap();
        let b = File::open(&path).unwrap();

        let _guard = FileLock::acquire(&a, LockMode::Shared).unwrap();
        assert!(try_lock(&b, libc::LOCK_SH));
        assert!(!try_lock(&b, libc::LOCK_EX));
        unlock(&b);
    }
}
