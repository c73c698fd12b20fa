//! Process-wide exclusive lock on the cache file, per spec §5: acquired at
//! startup and released at shutdown; held by a second process means an
//! older instance is assumed to be running.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use super::types::DatabaseError;

pub struct CacheLock {
    path: PathBuf,
}

impl CacheLock {
    /// Attempts to atomically create the lock marker file next to the cache
    /// file. Fails with `DatabaseError::InstanceLocked` if it already exists.
    pub fn acquire(cache_file: &Path) -> Result<Self, DatabaseError> {
        let path = lock_path(cache_file);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(CacheLock { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(DatabaseError::InstanceLocked)
            }
            Err(e) => Err(DatabaseError::Migration(format!(
                "failed to create lock file {}: {e}",
                path.display()
            ))),
        }
    }
}

pub fn lock_path(cache_file: &Path) -> PathBuf {
    let mut s = cache_file.as_os_str().to_owned();
    s.push(".lock");
    PathBuf::from(s)
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_rejected_until_first_is_dropped() {
        let mut path = std::env::temp_dir();
        path.push(format!("feedspar-lock-test-{}", std::process::id()));
        let _ = std::fs::remove_file(lock_path(&path));

        let first = CacheLock::acquire(&path).unwrap();
        assert!(matches!(
            CacheLock::acquire(&path),
            Err(DatabaseError::InstanceLocked)
        ));
        drop(first);
        let second = CacheLock::acquire(&path).unwrap();
        drop(second);
    }
}
