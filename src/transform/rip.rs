use crate::archive::format::{PackHeader, PACK_REL_FILEBASE};
use crate::archive::reader::ArchiveReader;
use crate::error::{PckError, Result};
use crate::fsutil::{copy_exact, parent_dir, same_path};
use crate::lock;
use crate::report::Report;
use crate::transform::backup::{finish_backup, Backup};
use crate::transform::open_embedded;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::warn;

/// Pull the package appended to `exe` out of it.
///
/// With `output`, the package is copied to that file and `exe` is left
/// untouched. Without it, `exe` is truncated in place to its host bytes
/// behind a rename backup, which is deleted afterwards when
/// `remove_backup` is set.
pub fn rip(exe: &Path, output: Option<&Path>, remove_backup: bool) -> Result<Report> {
    if let Some(output) = output {
        if same_path(exe, output) {
            return Err(PckError::SamePathConflict(output.display().to_string()));
        }
    }

    let mut reader = open_embedded(exe)?;

    let mut report = Report::new();
    match output {
        Some(output) => {
            let size = rip_to_file(&mut reader, output)?;
            report.step(format!(
                "Ripped package from {} into {} ({} bytes)",
                exe.display(),
                output.display(),
                size
            ));
        }
        None => {
            let host_size = reader.header_start();
            reader.close();
            strip_in_place(exe, host_size, remove_backup, &mut report)?;
        }
    }

    Ok(report)
}

fn rip_to_file(reader: &mut ArchiveReader, output: &Path) -> Result<u64> {
    lock::ensure_unlocked(output)?;

    let mut temp = NamedTempFile::new_in(parent_dir(output))?;
    let size = {
        let mut out = BufWriter::new(temp.as_file_mut());
        let size = reader.copy_package_to(&mut out)?;
        out.flush()?;
        size
    };

    // An absolute file base only makes sense inside the host
    let header = reader.header();
    if header.layout()?.has_file_base() && header.flags & PACK_REL_FILEBASE == 0 {
        let mut fixed: PackHeader = header.clone();
        fixed.flags |= PACK_REL_FILEBASE;
        fixed.file_base = header
            .file_base
            .checked_sub(reader.header_start())
            .ok_or_else(|| PckError::FormatInvalid("file base precedes the header".to_string()))?;

        let file = temp.as_file_mut();
        file.seek(SeekFrom::Start(0))?;
        fixed.write_to(&mut *file)?;
    }

    temp.as_file().sync_all()?;
    temp.persist(output).map_err(|e| PckError::Io(e.error))?;
    Ok(size)
}

fn strip_in_place(exe: &Path, host_size: u64, remove_backup: bool, report: &mut Report) -> Result<()> {
    drop(lock::open_locked(exe)?);
    let permissions = fs::metadata(exe)?.permissions();

    let backup = Backup::by_rename(exe)?;
    report.step(format!("Renamed {} to {}", exe.display(), backup.path().display()));

    let copied = (|| -> Result<()> {
        let source = File::open(backup.path())?;
        lock::lock_shared(&source, backup.path())?;
        let target = OpenOptions::new().write(true).create_new(true).open(exe)?;

        let mut out = BufWriter::new(&target);
        copy_exact(BufReader::new(&source), &mut out, host_size)?;
        out.flush()?;
        drop(out);

        target.sync_all()?;
        fs::set_permissions(exe, permissions)?;
        Ok(())
    })();

    if let Err(e) = copied {
        warn!(exe = %exe.display(), error = %e, "strip failed, restoring backup");
        backup.restore()?;
        return Err(e);
    }

    report.step(format!(
        "Removed the package from {} ({} bytes kept)",
        exe.display(),
        host_size
    ));
    finish_backup(backup, remove_backup, report);
    Ok(())
}
