use crate::archive::footer::{locate, Location, FOOTER_SIZE};
use crate::archive::format::{normalize_path, DirEntry, Entry, Layout, PackHeader};
use crate::archive::version::PackVersion;
use crate::error::{PckError, Result};
use crate::fsutil::copy_exact;
use crate::lock;
use crate::util::wildcard_match;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Archive reader with O(1) entry lookup
///
/// Holds a shared lock on the package file until [`ArchiveReader::close`]
/// is called or the reader is dropped.
pub struct ArchiveReader {
    file: Option<File>,
    path: PathBuf,
    header: PackHeader,
    location: Location,
    stream_len: u64,
    entries: HashMap<String, usize>,
    entry_list: Vec<Entry>,
}

/// Outcome of an extraction request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractSummary {
    /// Entries written to the destination
    pub extracted: usize,
    /// Entries left alone because the destination already existed
    pub skipped: Vec<String>,
    /// Requested paths that are not in the archive
    pub missing: Vec<String>,
}

/// Serializable overview of an opened package
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub version: PackVersion,
    pub layout: Layout,
    pub embedded: bool,
    pub header_start: u64,
    pub entry_count: usize,
    pub total_size: u64,
}

impl ArchiveReader {
    /// Open a standalone package, or a host executable with a package appended
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| PckError::on_open(path, e))?;
        if file.metadata()?.is_dir() {
            return Err(PckError::InvalidArgument(format!(
                "{} is a directory",
                path.display()
            )));
        }
        lock::lock_shared(&file, path)?;

        let mut stream = BufReader::new(file);
        let stream_len = stream.seek(SeekFrom::End(0))?;
        let location = locate(&mut stream)?;

        stream.seek(SeekFrom::Start(location.header_start))?;
        let header = PackHeader::read_from(&mut stream)?;
        let layout = header.layout()?;

        // Every entry needs at least this much directory space
        let remaining = stream_len - location.header_start - layout.header_size();
        if header.entry_count as u64 * layout.min_entry_size() > remaining {
            return Err(PckError::FormatInvalid(format!(
                "entry count {} does not fit in the file",
                header.entry_count
            )));
        }

        let base = header.payload_base(location.header_start)?;
        let mut entries = HashMap::with_capacity(header.entry_count as usize);
        let mut entry_list: Vec<Entry> = Vec::with_capacity(header.entry_count as usize);

        for _ in 0..header.entry_count {
            let raw = DirEntry::read_from(&mut stream, layout)?;
            let entry = resolve_entry(raw, base, stream_len)?;
            debug!(path = %entry.path, offset = entry.offset, size = entry.size, "entry");

            match entries.get(&entry.path) {
                Some(&index) => {
                    warn!(path = %entry.path, "duplicate entry, later record wins");
                    entry_list[index] = entry;
                }
                None => {
                    entries.insert(entry.path.clone(), entry_list.len());
                    entry_list.push(entry);
                }
            }
        }

        debug!(
            path = %path.display(),
            version = %header.version,
            embedded = location.embedded,
            entries = entry_list.len(),
            "opened package"
        );

        Ok(Self {
            file: Some(stream.into_inner()),
            path: path.to_path_buf(),
            header,
            location,
            stream_len,
            entries,
            entry_list,
        })
    }

    /// Release the file handle and its lock. Safe to call more than once.
    pub fn close(&mut self) {
        self.file = None;
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get package header information
    pub fn header(&self) -> &PackHeader {
        &self.header
    }

    pub fn version(&self) -> PackVersion {
        self.header.version
    }

    /// Absolute offset of the header; 0 for standalone packages
    pub fn header_start(&self) -> u64 {
        self.location.header_start
    }

    pub fn is_embedded(&self) -> bool {
        self.location.embedded
    }

    /// Get number of entries in archive
    pub fn entry_count(&self) -> usize {
        self.entry_list.len()
    }

    /// Entries in on-disk directory order
    pub fn entries(&self) -> &[Entry] {
        &self.entry_list
    }

    /// Check if a path exists in the archive
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&normalize_path(path))
    }

    /// Get entry information without reading data
    pub fn get_entry(&self, path: &str) -> Option<&Entry> {
        self.entries
            .get(&normalize_path(path))
            .map(|&index| &self.entry_list[index])
    }

    /// Entries whose path matches a `?`/`*` wildcard pattern
    pub fn filter(&self, pattern: &str, match_case: bool) -> Vec<&Entry> {
        self.entry_list
            .iter()
            .filter(|entry| wildcard_match(&entry.path, pattern, match_case))
            .collect()
    }

    /// Sum of all payload sizes
    pub fn total_size(&self) -> u64 {
        self.entry_list.iter().map(|entry| entry.size).sum()
    }

    pub fn info(&self) -> Result<ArchiveInfo> {
        Ok(ArchiveInfo {
            path: self.path.clone(),
            version: self.header.version,
            layout: self.header.layout()?,
            embedded: self.location.embedded,
            header_start: self.location.header_start,
            entry_count: self.entry_list.len(),
            total_size: self.total_size(),
        })
    }

    /// Read one entry into memory
    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        let entry = self
            .get_entry(path)
            .ok_or_else(|| PckError::NotFound(path.to_string()))?
            .clone();
        let file = self.file.as_mut().ok_or_else(closed)?;

        file.seek(SeekFrom::Start(entry.offset))?;
        let mut data = Vec::with_capacity(entry.size as usize);
        copy_exact(file, &mut data, entry.size)?;
        Ok(data)
    }

    /// Extract the requested entries below `dest_dir`.
    ///
    /// Paths absent from the archive are skipped. Fails without creating
    /// `dest_dir` when the request is empty or matches nothing. With
    /// `overwrite == false`, existing destination files are left untouched.
    pub fn extract<I, S>(&mut self, paths: I, dest_dir: &Path, overwrite: bool) -> Result<ExtractSummary>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested: Vec<String> = paths
            .into_iter()
            .map(|p| normalize_path(p.as_ref()))
            .collect();
        if requested.is_empty() {
            return Err(PckError::EmptyInput("no files requested for extraction".to_string()));
        }

        let mut summary = ExtractSummary::default();
        let mut targets = Vec::new();
        for path in requested {
            match self.entries.get(&path) {
                Some(&index) => {
                    let relative = archive_path_to_relative(&path)?;
                    targets.push((index, dest_dir.join(relative)));
                }
                None => {
                    debug!(path = %path, "requested entry not in archive");
                    summary.missing.push(path);
                }
            }
        }

        if targets.is_empty() {
            return Err(PckError::NotFound(format!(
                "none of the {} requested entries exist in {}",
                summary.missing.len(),
                self.path.display()
            )));
        }

        let file = self.file.as_mut().ok_or_else(closed)?;
        fs::create_dir_all(dest_dir)?;

        for (index, target) in targets {
            let entry = &self.entry_list[index];

            if !overwrite && target.exists() {
                debug!(path = %entry.path, "destination exists, skipping");
                summary.skipped.push(entry.path.clone());
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            file.seek(SeekFrom::Start(entry.offset))?;
            let mut out = BufWriter::new(File::create(&target)?);
            copy_exact(&mut *file, &mut out, entry.size)?;
            out.flush()?;

            debug!(path = %entry.path, target = %target.display(), "extracted");
            summary.extracted += 1;
        }

        Ok(summary)
    }

    /// Extract every entry below `dest_dir`
    pub fn extract_all(&mut self, dest_dir: &Path, overwrite: bool) -> Result<ExtractSummary> {
        let paths: Vec<String> = self.entry_list.iter().map(|e| e.path.clone()).collect();
        self.extract(paths, dest_dir, overwrite)
    }

    /// Bytes the package occupies, excluding any embedding footer
    pub fn package_size(&self) -> u64 {
        let end = if self.location.embedded {
            self.stream_len - FOOTER_SIZE
        } else {
            self.stream_len
        };
        end - self.location.header_start
    }

    /// Copy the package bytes (header through payload, no footer)
    pub(crate) fn copy_package_to<W: Write>(&mut self, writer: W) -> Result<u64> {
        let start = self.location.header_start;
        let len = self.package_size();
        let file = self.file.as_mut().ok_or_else(closed)?;

        file.seek(SeekFrom::Start(start))?;
        copy_exact(file, writer, len)
    }
}

fn closed() -> PckError {
    PckError::InvalidArgument("archive is closed".to_string())
}

fn resolve_entry(raw: DirEntry, base: u64, stream_len: u64) -> Result<Entry> {
    let offset = base
        .checked_add(raw.offset)
        .ok_or_else(|| PckError::FormatInvalid(format!("offset overflow for {}", raw.path)))?;

    let entry = Entry {
        path: raw.path,
        offset,
        size: raw.size,
        md5: raw.md5,
        flags: raw.flags,
    };

    match entry.end() {
        Some(end) if end <= stream_len => Ok(entry),
        _ => Err(PckError::FormatInvalid(format!(
            "entry {} lies outside the file",
            entry.path
        ))),
    }
}

/// Map `res://dir/file.png` to `dir/file.png`, refusing anything that escapes the destination
pub fn archive_path_to_relative(path: &str) -> Result<PathBuf> {
    let stripped = match path.find("://") {
        Some(index) => &path[index + 3..],
        None => path,
    };

    let mut relative = PathBuf::new();
    for part in stripped.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if !part.contains(':') => relative.push(name),
            _ => {
                return Err(PckError::InvalidArgument(format!(
                    "entry path escapes destination: {}",
                    path
                )))
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(PckError::InvalidArgument(format!("empty entry path: {:?}", path)));
    }
    Ok(relative)
}
