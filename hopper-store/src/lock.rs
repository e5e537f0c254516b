//! Lock coordinator
//!
//! One exclusive lock guards every partition. A cross-partition move
//! therefore never takes two locks, so there is no acquisition order to get
//! wrong and no window where a half-applied move is visible to another
//! caller.
//!
//! The lock is an advisory `flock(LOCK_EX)` on `<root>/.lock`. Each
//! acquisition opens its own file description, so the lock excludes other
//! threads of this process as well as other processes. The OS drops the lock
//! when the holder exits, including on a crash.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{Result, StoreError};

/// Upper bound of the random delay added to each poll
const LOCK_POLL_JITTER_MS: u64 = 5;

/// Held global lock; released when dropped
pub struct LockGuard {
    _lock_file: File,
    path: PathBuf,
    acquired_at: Instant,
}

impl LockGuard {
    /// How long the lock has been held
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        tracing::trace!(
            "Released queue lock {} after {:?}",
            self.path.display(),
            self.held_for()
        );
    }
}

/// Bounded-wait mutual exclusion over a queue directory
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    path: PathBuf,
    poll_interval: Duration,
}

impl LockCoordinator {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try to take the lock without waiting
    ///
    /// Returns `Ok(None)` if another holder has it.
    pub fn try_lock(&self) -> Result<Option<LockGuard>> {
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| {
                StoreError::io(format!("opening lock file {}", self.path.display()), e)
            })?;

        match try_lock_exclusive(&lock_file) {
            Ok(true) => Ok(Some(LockGuard {
                _lock_file: lock_file,
                path: self.path.clone(),
                acquired_at: Instant::now(),
            })),
            Ok(false) => Ok(None),
            Err(e) => Err(StoreError::io(
                format!("locking {}", self.path.display()),
                e,
            )),
        }
    }

    /// Take the lock, polling with jitter until `timeout` elapses
    pub fn acquire(&self, timeout: Duration) -> Result<LockGuard> {
        let start = Instant::now();
        loop {
            if let Some(guard) = self.try_lock()? {
                return Ok(guard);
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                tracing::debug!(
                    "Gave up on queue lock {} after {:?}",
                    self.path.display(),
                    elapsed
                );
                return Err(StoreError::LockTimeout { waited: elapsed });
            }

            let jitter = Duration::from_millis(rand::random::<u64>() % (LOCK_POLL_JITTER_MS + 1));
            let remaining = timeout - elapsed;
            std::thread::sleep((self.poll_interval + jitter).min(remaining));
        }
    }

    /// Run `f` while holding the lock
    ///
    /// On timeout `f` is not called and `StoreError::LockTimeout` is
    /// returned.
    pub fn with_lock<T>(&self, timeout: Duration, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self.acquire(timeout)?;
        f()
    }
}

/// Non-blocking exclusive lock on `file`
///
/// `Ok(false)` means the lock is held elsewhere.
#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: flock only reads the descriptor, which `file` keeps open for
    // the duration of the call.
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err)
}

#[cfg(not(unix))]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    match file.try_lock() {
        Ok(()) => Ok(true),
        Err(std::fs::TryLockError::WouldBlock) => Ok(false),
        Err(std::fs::TryLockError::Error(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn coordinator(dir: &tempfile::TempDir) -> LockCoordinator {
        LockCoordinator::new(dir.path().join(".lock"), Duration::from_millis(2))
    }

    #[test]
    fn test_second_holder_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let lock = coordinator(&dir);

        let guard = lock.try_lock().unwrap();
        assert!(guard.is_some());
        assert!(lock.try_lock().unwrap().is_none());

        drop(guard);
        assert!(lock.try_lock().unwrap().is_some());
    }

    #[test]
    fn test_acquire_times_out_without_running_closure() {
        let dir = tempfile::tempdir().unwrap();
        let lock = coordinator(&dir);
        let _held = lock.acquire(Duration::from_millis(50)).unwrap();

        let mut ran = false;
        let err = lock
            .with_lock(Duration::from_millis(30), || {
                ran = true;
                Ok(())
            })
            .unwrap_err();

        assert!(err.is_lock_timeout());
        assert!(!ran);
    }

    #[test]
    fn test_with_lock_serializes_threads() {
        let dir = tempfile::tempdir().unwrap();
        let lock = coordinator(&dir);
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let lock = lock.clone();
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                scope.spawn(move || {
                    for _ in 0..10 {
                        lock.with_lock(Duration::from_secs(10), || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_inside.fetch_max(now, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_micros(200));
                            inside.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                    }
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closure_error_propagates_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let lock = coordinator(&dir);

        let err = lock
            .with_lock(Duration::from_secs(1), || -> Result<()> {
                Err(StoreError::InvalidConfig("boom".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
        assert!(lock.try_lock().unwrap().is_some());
    }
}
