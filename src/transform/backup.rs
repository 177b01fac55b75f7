//! Backup and restore around destructive in-place mutations.

use crate::archive::footer::append_package;
use crate::error::{PckError, Result};
use crate::fsutil::{backup_path, parent_dir};
use crate::lock;
use crate::report::Report;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// A snapshot of a file taken right before it is modified in place
///
/// Dropping a `Backup` leaves the snapshot on disk. Callers either
/// [`restore`](Backup::restore) it after a failure or
/// [`discard`](Backup::discard) it after success.
#[derive(Debug)]
pub struct Backup {
    original: PathBuf,
    backup: PathBuf,
}

impl Backup {
    /// Move `original` aside. The original path no longer exists afterwards.
    pub fn by_rename(original: &Path) -> Result<Self> {
        let backup = prepare(original)?;
        fs::rename(original, &backup).map_err(|e| mutation_error(original, e))?;
        debug!(original = %original.display(), backup = %backup.display(), "renamed to backup");
        Ok(Self {
            original: original.to_path_buf(),
            backup,
        })
    }

    /// Copy `original` aside, leaving it usable for the mutation
    pub fn by_copy(original: &Path) -> Result<Self> {
        let backup = prepare(original)?;
        if let Err(e) = fs::copy(original, &backup) {
            let _ = fs::remove_file(&backup);
            return Err(mutation_error(original, e));
        }
        debug!(original = %original.display(), backup = %backup.display(), "copied to backup");
        Ok(Self {
            original: original.to_path_buf(),
            backup,
        })
    }

    /// Move `original` to a fresh hidden name in the same directory.
    ///
    /// For outputs about to be replaced wholesale, where the `.old` name is
    /// taken by a later step of the same operation.
    pub fn set_aside(original: &Path) -> Result<Self> {
        if !original.is_file() {
            return Err(PckError::NotFound(original.display().to_string()));
        }
        lock::ensure_unlocked(original)?;

        let (placeholder, backup) = tempfile::Builder::new()
            .prefix(".gdpck-")
            .suffix(".bak")
            .tempfile_in(parent_dir(original))?
            .keep()
            .map_err(|e| PckError::Io(e.error))?;
        drop(placeholder);

        if let Err(e) = fs::rename(original, &backup) {
            let _ = fs::remove_file(&backup);
            return Err(mutation_error(original, e));
        }
        debug!(original = %original.display(), backup = %backup.display(), "set aside");
        Ok(Self {
            original: original.to_path_buf(),
            backup,
        })
    }

    pub fn path(&self) -> &Path {
        &self.backup
    }

    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Put the snapshot back over whatever is at the original path
    ///
    /// Any failure here means the original may be missing or truncated and
    /// is reported as [`PckError::RestoreFailed`].
    pub fn restore(self) -> Result<()> {
        let result = match fs::remove_file(&self.original) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
        .and_then(|()| fs::rename(&self.backup, &self.original));

        match result {
            Ok(()) => {
                debug!(original = %self.original.display(), "restored from backup");
                Ok(())
            }
            Err(source) => {
                error!(
                    original = %self.original.display(),
                    backup = %self.backup.display(),
                    error = %source,
                    "could not restore from backup"
                );
                Err(PckError::RestoreFailed {
                    original: self.original,
                    backup: self.backup,
                    source,
                })
            }
        }
    }

    /// Delete the snapshot
    pub fn discard(self) -> Result<()> {
        fs::remove_file(&self.backup).map_err(|e| mutation_error(&self.backup, e))
    }
}

/// Backup path for `original`, clearing a stale backup first
fn prepare(original: &Path) -> Result<PathBuf> {
    if !original.is_file() {
        return Err(PckError::NotFound(original.display().to_string()));
    }

    let backup = backup_path(original);
    if backup.exists() {
        lock::ensure_unlocked(&backup)?;
        fs::remove_file(&backup).map_err(|e| mutation_error(&backup, e))?;
        debug!(backup = %backup.display(), "removed stale backup");
    }
    Ok(backup)
}

fn mutation_error(path: &Path, err: io::Error) -> PckError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => PckError::LockedOrInUse(path.display().to_string()),
        _ => PckError::Io(err),
    }
}

/// Copy `host` aside, then lock it exclusively for appending
fn lock_with_backup(host: &Path) -> Result<(File, Backup)> {
    lock::ensure_unlocked(host)?;
    let backup = Backup::by_copy(host)?;
    match lock::open_locked(host) {
        Ok(file) => Ok((file, backup)),
        Err(e) => {
            if let Err(cleanup) = backup.discard() {
                warn!(error = %cleanup, "could not remove unused backup");
            }
            Err(e)
        }
    }
}

/// Append a package to `host` behind a copy backup.
///
/// The host is restored from the backup when the append fails. Returns
/// `(header_start, pack_size)`.
pub(crate) fn append_with_backup<F>(
    host: &Path,
    remove_backup: bool,
    report: &mut Report,
    write_package: F,
) -> Result<(u64, u64)>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<u64>,
{
    let (mut file, backup) = lock_with_backup(host)?;
    report.step(format!("Backed up {} to {}", host.display(), backup.path().display()));

    let appended = append_package(&mut file, write_package);
    drop(file);

    match appended {
        Ok(placed) => {
            finish_backup(backup, remove_backup, report);
            Ok(placed)
        }
        Err(e) => {
            warn!(host = %host.display(), error = %e, "append failed, restoring backup");
            backup.restore()?;
            Err(e)
        }
    }
}

/// Keep or delete a backup after a successful mutation; deletion failures only warn
pub(crate) fn finish_backup(backup: Backup, remove: bool, report: &mut Report) {
    let path = backup.path().to_path_buf();
    if !remove {
        report.step(format!("Kept backup at {}", path.display()));
        return;
    }
    match backup.discard() {
        Ok(()) => report.step(format!("Removed backup {}", path.display())),
        Err(e) => warn!(backup = %path.display(), error = %e, "could not remove backup"),
    }
}
