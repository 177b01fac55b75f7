//! Filesystem scanning into packable file lists.

use crate::error::{PckError, Result};
use crate::util::wildcard_match;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default mount prefix for packed paths
pub const DEFAULT_PREFIX: &str = "res://";

/// A source file and the archive path it will be stored under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileToPack {
    pub source: PathBuf,
    pub archive_path: String,
    /// Length at scan time; the packer re-reads it before writing
    pub size: u64,
}

impl FileToPack {
    pub fn new(source: PathBuf, archive_path: String, size: u64) -> Self {
        Self {
            source,
            archive_path,
            size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub prefix: String,
    /// Wildcard patterns matched against the prefixed archive path
    pub exclude: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            exclude: Vec::new(),
        }
    }
}

/// List every file under `root` as `res://relative/path`
pub fn scan_dir(root: &Path) -> Result<Vec<FileToPack>> {
    scan_dir_with(root, &ScanOptions::default())
}

/// List files under `root`, subdirectories before files at each level
pub fn scan_dir_with(root: &Path, options: &ScanOptions) -> Result<Vec<FileToPack>> {
    if !root.is_dir() {
        return Err(PckError::NotFound(root.display().to_string()));
    }

    let walker = WalkDir::new(root).follow_links(false).sort_by(|a, b| {
        b.file_type()
            .is_dir()
            .cmp(&a.file_type().is_dir())
            .then_with(|| a.file_name().cmp(b.file_name()))
    });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let msg = e.to_string();
            PckError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, msg)),
            )
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let archive_path = archive_path_for(root, entry.path(), &options.prefix)?;
        if options
            .exclude
            .iter()
            .any(|pattern| wildcard_match(&archive_path, pattern, true))
        {
            continue;
        }

        let size = entry.metadata().map_err(|e| PckError::Io(e.into()))?.len();
        files.push(FileToPack::new(entry.into_path(), archive_path, size));
    }

    Ok(files)
}

fn archive_path_for(root: &Path, path: &Path, prefix: &str) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| PckError::InvalidArgument(format!("{} is outside {}", path.display(), root.display())))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component.as_os_str().to_str().ok_or_else(|| {
            PckError::InvalidArgument(format!("non UTF-8 file name: {}", path.display()))
        })?;
        parts.push(part);
    }

    Ok(format!("{}{}", prefix, parts.join("/")))
}
