use crate::archive::footer::has_package;
use crate::archive::format::PACK_REL_FILEBASE;
use crate::archive::reader::ArchiveReader;
use crate::error::{PckError, Result};
use crate::fsutil::same_path;
use crate::report::Report;
use crate::transform::backup::append_with_backup;
use std::path::Path;

/// Append the standalone package `pck` to the executable `exe`.
///
/// `exe` is copied to its backup name first and restored from it if the
/// append fails. The package bytes are appended unchanged, so ripping the
/// result in place gives back the original executable.
pub fn merge(pck: &Path, exe: &Path, remove_backup: bool) -> Result<Report> {
    if same_path(pck, exe) {
        return Err(PckError::SamePathConflict(exe.display().to_string()));
    }

    let mut reader = ArchiveReader::open(pck)?;
    if reader.is_embedded() {
        return Err(PckError::FormatInvalid(format!(
            "{} is embedded in a host, rip it first",
            pck.display()
        )));
    }
    let header = reader.header();
    if header.layout()?.has_file_base() && header.flags & PACK_REL_FILEBASE == 0 {
        return Err(PckError::FormatInvalid(format!(
            "{} uses an absolute file base and cannot be embedded",
            pck.display()
        )));
    }

    if has_package(exe)? {
        return Err(PckError::AlreadyEmbedded(exe.display().to_string()));
    }

    let mut report = Report::new();
    let (header_start, pack_size) =
        append_with_backup(exe, remove_backup, &mut report, |w| reader.copy_package_to(w))?;
    report.step(format!(
        "Merged {} into {} ({} bytes at offset {})",
        pck.display(),
        exe.display(),
        pack_size,
        header_start
    ));
    Ok(report)
}
