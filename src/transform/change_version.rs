use crate::archive::reader::ArchiveReader;
use crate::archive::version::PackVersion;
use crate::error::{PckError, Result};
use crate::lock;
use crate::report::Report;
use std::io::{Seek, SeekFrom};
use std::path::Path;

/// Byte offset of the version fields from the header start
const VERSION_OFFSET: u64 = 4;

/// Overwrite the four version integers of the package in `path`.
///
/// Works on standalone and embedded packages. Nothing but the version
/// fields is written, so the pack format may only change between formats
/// that share a header layout.
pub fn change_version(path: &Path, version: &str) -> Result<Report> {
    let version = PackVersion::parse(version)?;

    let (header_start, previous) = {
        let reader = ArchiveReader::open(path)?;
        (reader.header_start(), reader.version())
    };

    if previous.layout()? != version.layout()? {
        return Err(PckError::VersionInvalid(format!(
            "cannot change pack format {} to {} in place",
            previous.pack_format, version.pack_format
        )));
    }

    let mut file = lock::open_locked(path)?;
    file.seek(SeekFrom::Start(header_start + VERSION_OFFSET))?;
    version.write_to(&mut file)?;
    file.sync_all()?;

    let mut report = Report::new();
    report.step(format!(
        "Changed version of {} from {} to {}",
        path.display(),
        previous,
        version
    ));
    Ok(report)
}
