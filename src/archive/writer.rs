use crate::archive::format::{
    normalize_path, pad_len, DirEntry, Layout, PackHeader, PACK_REL_FILEBASE,
};
use crate::archive::version::PackVersion;
use crate::error::{PckError, Result};
use crate::fsutil::copy_exact;
use crate::scan::FileToPack;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Write};
use tracing::debug;

/// Largest alignment the packer accepts (1 MiB)
pub const MAX_ALIGNMENT: u64 = 1 << 20;

/// Writes header, directory and payload for one package
///
/// The directory precedes the payload, so every offset is planned from the
/// file sizes before any byte is written. Offsets are stored relative to the
/// header start (pack formats 0 and 1) or to the file base (pack format 2,
/// always written with a header-relative file base).
pub struct PackWriter {
    version: PackVersion,
    layout: Layout,
    alignment: u64,
}

/// Directory and offsets computed ahead of writing
#[derive(Debug, Clone)]
pub struct PackPlan {
    pub header: PackHeader,
    pub entries: Vec<DirEntry>,
    /// Payload start, relative to the header start
    pub payload_start: u64,
    /// Total bytes the package occupies, relative to the header start
    pub pack_size: u64,
}

impl PackWriter {
    pub fn new(version: PackVersion, alignment: u64) -> Result<Self> {
        let layout = version
            .layout()
            .map_err(|_| PckError::VersionInvalid(version.to_string()))?;

        if alignment == 0 || !alignment.is_power_of_two() || alignment > MAX_ALIGNMENT {
            return Err(PckError::InvalidArgument(format!(
                "alignment must be a power of two between 1 and {}, got {}",
                MAX_ALIGNMENT, alignment
            )));
        }

        Ok(Self {
            version,
            layout,
            alignment,
        })
    }

    pub fn version(&self) -> PackVersion {
        self.version
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Compute the directory for `files` without touching the filesystem
    pub fn plan(&self, files: &[FileToPack]) -> Result<PackPlan> {
        let entry_count = u32::try_from(files.len()).map_err(|_| {
            PckError::InvalidArgument(format!("too many files: {}", files.len()))
        })?;

        let mut seen = HashSet::with_capacity(files.len());
        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let path = normalize_path(&file.archive_path);
            if !seen.insert(path.clone()) {
                return Err(PckError::InvalidArgument(format!(
                    "duplicate archive path: {}",
                    path
                )));
            }
            entries.push(DirEntry::new(path, 0, file.size));
        }

        let directory_size: u64 = entries.iter().map(|e| e.encoded_size(self.layout)).sum();
        let directory_end = self.layout.header_size() + directory_size;
        let payload_start = directory_end + pad_len(directory_end, self.alignment);

        let mut header = PackHeader::new(self.version);
        header.entry_count = entry_count;

        // Stored offsets start at the payload base
        let mut cursor = if self.layout.has_file_base() {
            header.flags = PACK_REL_FILEBASE;
            header.file_base = payload_start;
            0
        } else {
            payload_start
        };

        for entry in &mut entries {
            entry.offset = cursor;
            cursor += entry.size;
            cursor += pad_len(cursor, self.alignment);
        }

        let pack_size = if self.layout.has_file_base() {
            payload_start + cursor
        } else {
            cursor
        };

        Ok(PackPlan {
            header,
            entries,
            payload_start,
            pack_size,
        })
    }

    /// Write the package for `files` and return the number of bytes written
    ///
    /// Each source is streamed in bounded chunks and must still hold exactly
    /// the number of bytes recorded in its `FileToPack`.
    pub fn write_to<W: Write>(&self, mut writer: W, files: &[FileToPack]) -> Result<u64> {
        let plan = self.plan(files)?;

        plan.header.write_to(&mut writer)?;
        for entry in &plan.entries {
            entry.write_to(&mut writer, self.layout)?;
        }

        let directory_end = self.layout.header_size()
            + plan
                .entries
                .iter()
                .map(|e| e.encoded_size(self.layout))
                .sum::<u64>();
        write_zeros(&mut writer, plan.payload_start - directory_end)?;

        let mut written = plan.payload_start;
        for (file, entry) in files.iter().zip(&plan.entries) {
            let source = File::open(&file.source).map_err(|e| PckError::on_open(&file.source, e))?;
            copy_exact(BufReader::new(source), &mut writer, file.size).map_err(|e| match e {
                PckError::Io(io) => PckError::Io(std::io::Error::new(
                    io.kind(),
                    format!("{}: {}", file.source.display(), io),
                )),
                other => other,
            })?;
            written += file.size;

            let pad = pad_len(written, self.alignment);
            write_zeros(&mut writer, pad)?;
            written += pad;

            debug!(path = %entry.path, size = entry.size, "packed");
        }

        debug_assert_eq!(written, plan.pack_size);
        Ok(written)
    }
}

fn write_zeros<W: Write>(mut writer: W, count: u64) -> Result<()> {
    const ZEROS: [u8; 4096] = [0u8; 4096];
    let mut remaining = count;
    while remaining > 0 {
        let n = remaining.min(ZEROS.len() as u64) as usize;
        writer.write_all(&ZEROS[..n])?;
        remaining -= n as u64;
    }
    Ok(())
}
