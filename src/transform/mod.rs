//! Executable transforms: rip, merge, split and in-place version changes.
//!
//! Every operation that rewrites a user's file goes through a [`Backup`]
//! and puts it back when the rewrite fails. A failed restore surfaces as
//! [`crate::PckError::RestoreFailed`].

pub mod backup;
mod change_version;
mod merge;
mod rip;
mod split;

pub use backup::Backup;
pub use change_version::change_version;
pub use merge::merge;
pub use rip::rip;
pub use split::split;

use crate::archive::has_package;
use crate::archive::reader::ArchiveReader;
use crate::error::{PckError, Result};
use std::path::Path;

/// Open `exe`, failing with `NotEmbedded` unless a package is appended to it
pub(crate) fn open_embedded(exe: &Path) -> Result<ArchiveReader> {
    if !has_package(exe)? {
        return Err(PckError::NotEmbedded(exe.display().to_string()));
    }
    let reader = ArchiveReader::open(exe)?;
    if !reader.is_embedded() {
        return Err(PckError::NotEmbedded(exe.display().to_string()));
    }
    Ok(reader)
}
