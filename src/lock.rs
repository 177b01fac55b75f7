//! Advisory file locks.
//!
//! Locks are cooperative: a mutation first takes an exclusive lock on its
//! target and fails fast with `LockedOrInUse` instead of waiting.

use crate::error::{PckError, Result};
use std::fs::{File, OpenOptions, TryLockError};
use std::io;
use std::path::Path;

fn lock_error(path: &Path, err: TryLockError) -> PckError {
    match err {
        TryLockError::WouldBlock => PckError::LockedOrInUse(path.display().to_string()),
        TryLockError::Error(e) => PckError::Io(e),
    }
}

/// Take a shared lock for reading.
pub fn lock_shared(file: &File, path: &Path) -> Result<()> {
    file.try_lock_shared().map_err(|e| lock_error(path, e))
}

/// Take an exclusive lock for writing.
pub fn lock_exclusive(file: &File, path: &Path) -> Result<()> {
    file.try_lock().map_err(|e| lock_error(path, e))
}

/// Open an existing file for read+write and lock it exclusively.
pub fn open_locked(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => PckError::LockedOrInUse(path.display().to_string()),
            _ => PckError::on_open(path, e),
        })?;
    lock_exclusive(&file, path)?;
    Ok(file)
}

/// Fail if someone else holds a lock on `path`. A missing file is fine.
pub fn ensure_unlocked(path: &Path) -> Result<()> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(PckError::Io(e)),
    };
    if file.metadata()?.is_dir() {
        return Err(PckError::InvalidArgument(format!(
            "{} is a directory",
            path.display()
        )));
    }
    lock_exclusive(&file, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_exclusive_lock_conflicts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("held.bin");
        std::fs::write(&path, b"data").unwrap();

        let holder = File::open(&path).unwrap();
        holder.try_lock().unwrap();

        assert!(matches!(
            ensure_unlocked(&path),
            Err(PckError::LockedOrInUse(_))
        ));
        assert!(matches!(open_locked(&path), Err(PckError::LockedOrInUse(_))));

        drop(holder);
        ensure_unlocked(&path).unwrap();
        open_locked(&path).unwrap();
    }

    #[test]
    fn test_shared_locks_coexist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.bin");
        std::fs::write(&path, b"data").unwrap();

        let a = File::open(&path).unwrap();
        let b = File::open(&path).unwrap();
        lock_shared(&a, &path).unwrap();
        lock_shared(&b, &path).unwrap();
        assert!(ensure_unlocked(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_unlocked() {
        let dir = TempDir::new().unwrap();
        ensure_unlocked(&dir.path().join("nope")).unwrap();
        assert!(matches!(
            open_locked(&dir.path().join("nope")),
            Err(PckError::NotFound(_))
        ));
    }
}
