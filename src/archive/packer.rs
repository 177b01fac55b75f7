use crate::archive::footer::{append_package, has_package};
use crate::archive::format::DEFAULT_ALIGNMENT;
use crate::archive::version::PackVersion;
use crate::archive::writer::PackWriter;
use crate::error::{PckError, Result};
use crate::fsutil::{copy_exact, parent_dir, same_path};
use crate::lock;
use crate::report::Report;
use crate::scan::FileToPack;
use crate::transform::backup::append_with_backup;
use crate::util::size_suffix;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Options controlling how a package is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOptions {
    pub version: PackVersion,
    /// Payload alignment in bytes, a power of two
    pub alignment: u64,
    /// Delete the host backup after a successful embed
    pub remove_backup: bool,
}

impl PackOptions {
    pub fn new(version: PackVersion) -> Self {
        Self {
            version,
            alignment: DEFAULT_ALIGNMENT,
            remove_backup: false,
        }
    }

    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_remove_backup(mut self, remove_backup: bool) -> Self {
        self.remove_backup = remove_backup;
        self
    }
}

/// Builds packages from scanned files, standalone or appended to a host
pub struct ArchivePacker {
    options: PackOptions,
}

impl ArchivePacker {
    pub fn new(options: PackOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PackOptions {
        &self.options
    }

    /// Write `files` as a package at `dest`.
    ///
    /// With `embed_into == None` the package is written standalone. With a
    /// host path equal to `dest` the package is appended to that file in
    /// place behind a backup. With a different host, the host is copied to
    /// `dest` first and the package appended to the copy.
    pub fn pack(&self, dest: &Path, files: &[FileToPack], embed_into: Option<&Path>) -> Result<Report> {
        if files.is_empty() {
            return Err(PckError::EmptyInput("no files to pack".to_string()));
        }

        let writer = PackWriter::new(self.options.version, self.options.alignment)?;
        let files = refresh_sizes(files)?;
        let total: u64 = files.iter().map(|f| f.size).sum();

        let mut report = Report::new();
        match embed_into {
            None => {
                let pack_size = write_standalone(&writer, dest, &files)?;
                report.step(format!(
                    "Packed {} files ({}) into {} ({} bytes, version {})",
                    files.len(),
                    size_suffix(total, 2),
                    dest.display(),
                    pack_size,
                    self.options.version
                ));
            }
            Some(host) if same_path(host, dest) => {
                self.embed_in_place(&writer, dest, &files, &mut report)?;
            }
            Some(host) => {
                let (header_start, pack_size) = embed_into_copy(&writer, host, dest, &files)?;
                report.step(format!(
                    "Copied {} to {} and embedded {} files ({} bytes) at offset {}",
                    host.display(),
                    dest.display(),
                    files.len(),
                    pack_size,
                    header_start
                ));
            }
        }

        Ok(report)
    }

    fn embed_in_place(
        &self,
        writer: &PackWriter,
        host: &Path,
        files: &[FileToPack],
        report: &mut Report,
    ) -> Result<()> {
        if has_package(host)? {
            return Err(PckError::AlreadyEmbedded(host.display().to_string()));
        }

        let (header_start, pack_size) =
            append_with_backup(host, self.options.remove_backup, report, |w| writer.write_to(w, files))?;
        report.step(format!(
            "Embedded {} files ({} bytes) into {} at offset {}",
            files.len(),
            pack_size,
            host.display(),
            header_start
        ));
        Ok(())
    }
}

/// Current lengths of every source; fails if any source cannot be opened
fn refresh_sizes(files: &[FileToPack]) -> Result<Vec<FileToPack>> {
    files
        .iter()
        .map(|file| {
            let handle = File::open(&file.source).map_err(|e| PckError::on_open(&file.source, e))?;
            let size = handle.metadata()?.len();
            if size != file.size {
                debug!(path = %file.source.display(), scanned = file.size, size, "source size changed");
            }
            Ok(FileToPack::new(file.source.clone(), file.archive_path.clone(), size))
        })
        .collect()
}

fn write_standalone(writer: &PackWriter, dest: &Path, files: &[FileToPack]) -> Result<u64> {
    lock::ensure_unlocked(dest)?;

    let mut temp = NamedTempFile::new_in(parent_dir(dest))?;
    let pack_size = {
        let mut out = BufWriter::new(temp.as_file_mut());
        let size = writer.write_to(&mut out, files)?;
        out.flush()?;
        size
    };
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| PckError::Io(e.error))?;

    Ok(pack_size)
}

fn embed_into_copy(
    writer: &PackWriter,
    host: &Path,
    dest: &Path,
    files: &[FileToPack],
) -> Result<(u64, u64)> {
    if has_package(host)? {
        return Err(PckError::AlreadyEmbedded(host.display().to_string()));
    }
    lock::ensure_unlocked(dest)?;

    let source = File::open(host).map_err(|e| PckError::on_open(host, e))?;
    lock::lock_shared(&source, host)?;
    let metadata = source.metadata()?;

    let mut temp = NamedTempFile::new_in(parent_dir(dest))?;
    {
        let mut out = BufWriter::new(temp.as_file_mut());
        copy_exact(BufReader::new(&source), &mut out, metadata.len())?;
        out.flush()?;
    }
    let placed = append_package(temp.as_file_mut(), |w| writer.write_to(w, files))?;

    temp.persist(dest).map_err(|e| PckError::Io(e.error))?;
    fs::set_permissions(dest, metadata.permissions())?;
    Ok(placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::reader::ArchiveReader;
    use tempfile::TempDir;

    fn sources(dir: &TempDir) -> Vec<FileToPack> {
        let mut files = Vec::new();
        for (name, data) in [("a.txt", &b"alpha"[..]), ("b.txt", &b"bravo bravo"[..])] {
            let path = dir.path().join(name);
            fs::write(&path, data).unwrap();
            files.push(FileToPack::new(path, format!("res://{}", name), data.len() as u64));
        }
        files
    }

    fn packer() -> ArchivePacker {
        ArchivePacker::new(PackOptions::new(PackVersion::new(1, 3, 4, 0)))
    }

    #[test]
    fn test_pack_standalone() {
        let dir = TempDir::new().unwrap();
        let files = sources(&dir);
        let dest = dir.path().join("out.pck");

        let report = packer().pack(&dest, &files, None).unwrap();
        assert_eq!(report.steps().len(), 1);

        let mut reader = ArchiveReader::open(&dest).unwrap();
        assert!(!reader.is_embedded());
        assert_eq!(reader.read_file("res://b.txt").unwrap(), b"bravo bravo");
    }

    #[test]
    fn test_pack_empty_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("empty.pck");
        assert!(matches!(
            packer().pack(&dest, &[], None),
            Err(PckError::EmptyInput(_))
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn test_pack_missing_source_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let mut files = sources(&dir);
        files.push(FileToPack::new(dir.path().join("gone.txt"), "res://gone.txt".into(), 3));
        let dest = dir.path().join("out.pck");

        assert!(matches!(
            packer().pack(&dest, &files, None),
            Err(PckError::NotFound(_))
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn test_pack_uses_current_source_size() {
        let dir = TempDir::new().unwrap();
        let mut files = sources(&dir);
        fs::write(&files[0].source, b"alpha, longer now").unwrap();
        files[0].size = 1;

        let dest = dir.path().join("out.pck");
        packer().pack(&dest, &files, None).unwrap();
        let mut reader = ArchiveReader::open(&dest).unwrap();
        assert_eq!(reader.read_file("res://a.txt").unwrap(), b"alpha, longer now");
    }

    #[test]
    fn test_embed_into_other_destination() {
        let dir = TempDir::new().unwrap();
        let files = sources(&dir);
        let host = dir.path().join("host.exe");
        let dest = dir.path().join("game.exe");
        fs::write(&host, vec![0xCCu8; 1000]).unwrap();

        packer().pack(&dest, &files, Some(&host)).unwrap();

        assert_eq!(fs::read(&host).unwrap(), vec![0xCCu8; 1000]);
        let reader = ArchiveReader::open(&dest).unwrap();
        assert!(reader.is_embedded());
        assert_eq!(reader.header_start(), 1000);
    }

    #[test]
    fn test_embed_in_place_keeps_backup() {
        let dir = TempDir::new().unwrap();
        let files = sources(&dir);
        let host = dir.path().join("game.exe");
        fs::write(&host, vec![0xCCu8; 512]).unwrap();

        packer().pack(&host, &files, Some(&host)).unwrap();

        assert_eq!(fs::read(dir.path().join("game.old.exe")).unwrap(), vec![0xCCu8; 512]);
        let reader = ArchiveReader::open(&host).unwrap();
        assert!(reader.is_embedded());
        assert_eq!(reader.entry_count(), 2);
    }
}
