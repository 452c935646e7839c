use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::LockConfig;
use crate::error::{LockError, LockResult};

/// Advisory cross-process lock file for a database's storage location.
///
/// The in-process lock manager only coordinates threads; cooperating
/// processes honor this file-based protocol even when they never touch the
/// in-process mutex. A ReadWrite claim creates `<database>.lock` exclusively
/// (containing the holder's pid) and removes it on release; acquisition
/// retries at the configured interval until the configured timeout.
///
/// A lock file left behind by a crashed process is not reclaimed here:
/// acquisition keeps failing until an operator removes the file.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    held: bool,
}

impl LockFile {
    /// The lock-file path guarding `database_path`.
    pub fn path_for(database_path: &Path) -> PathBuf {
        let mut name = database_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        database_path.with_file_name(name)
    }

    /// Acquire the advisory file lock for `database_path`.
    pub fn acquire(database_path: &Path, config: &LockConfig) -> LockResult<Self> {
        let path = Self::path_for(database_path);
        let deadline = Instant::now() + config.acquire_timeout;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // Best effort: the pid helps an operator identify the
                    // holder of a stale file.
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!(path = %path.display(), "advisory lock file created");
                    return Ok(Self { path, held: true });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(LockError::Timeout {
                            waited_ms: config.acquire_timeout.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(config.retry_interval);
                }
                Err(err) => return Err(LockError::Io(err)),
            }
        }
    }

    /// Returns `true` if some process currently holds the advisory lock.
    pub fn is_locked(database_path: &Path) -> bool {
        Self::path_for(database_path).exists()
    }

    /// Release explicitly. Equivalent to dropping.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        if let Err(err) = std::fs::remove_file(&self.path) {
            // Cleanup must never propagate; a missing file means another
            // party already removed it.
            warn!(path = %self.path.display(), %err, "failed to remove lock file");
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("tracker.tempo")
    }

    #[test]
    fn acquire_creates_and_release_removes() {
        let dir = tempfile::tempdir().unwrap();
        let db = db_path(&dir);

        let lock = LockFile::acquire(&db, &LockConfig::no_wait()).unwrap();
        assert!(LockFile::is_locked(&db));
        lock.release();
        assert!(!LockFile::is_locked(&db));
    }

    #[test]
    fn second_acquire_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let db = db_path(&dir);

        let _held = LockFile::acquire(&db, &LockConfig::no_wait()).unwrap();
        let err = LockFile::acquire(&db, &LockConfig::no_wait()).unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
    }

    #[test]
    fn drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let db = db_path(&dir);
        {
            let _lock = LockFile::acquire(&db, &LockConfig::no_wait()).unwrap();
            assert!(LockFile::is_locked(&db));
        }
        assert!(!LockFile::is_locked(&db));
    }

    #[test]
    fn lock_path_is_sibling_with_suffix() {
        let path = LockFile::path_for(Path::new("/data/tracker.tempo"));
        assert_eq!(path, PathBuf::from("/data/tracker.tempo.lock"));
    }

    #[test]
    fn reacquire_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let db = db_path(&dir);
        LockFile::acquire(&db, &LockConfig::no_wait()).unwrap().release();
        let again = LockFile::acquire(&db, &LockConfig::no_wait()).unwrap();
        drop(again);
    }
}
