use crate::archive::format::{read_array, read_u64, DEFAULT_ALIGNMENT, MAGIC_NUMBER};
use crate::error::{PckError, Result};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::warn;

/// Footer size in bytes (fixed)
pub const FOOTER_SIZE: u64 = 12;

/// Embedding footer
///
/// Located at the very end of a host executable (last 12 bytes) when a
/// package has been appended to it. Lets readers find the package header by
/// reading from the end of the file without scanning the host.
///
/// Structure (12 bytes fixed):
/// - Package Size: uint64 (8 bytes), bytes from the header start up to the footer
/// - Magic: "GDPC" (4 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedFooter {
    pub pack_size: u64,
}

impl EmbedFooter {
    pub fn new(pack_size: u64) -> Self {
        Self { pack_size }
    }

    /// Write footer to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        writer.write_all(&self.pack_size.to_le_bytes())?;
        writer.write_all(&MAGIC_NUMBER)?;
        Ok(FOOTER_SIZE as usize)
    }

    /// Read footer from a reader
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let pack_size = read_u64(&mut reader)?;
        let magic = read_array::<4, _>(&mut reader)?;
        if magic != MAGIC_NUMBER {
            return Err(PckError::FormatInvalid(
                "Invalid embedding footer magic (expected GDPC)".to_string(),
            ));
        }
        Ok(Self { pack_size })
    }

    /// Header offset implied by this footer in a stream of `stream_len` bytes
    pub fn header_start(&self, stream_len: u64) -> Option<u64> {
        stream_len
            .checked_sub(FOOTER_SIZE)?
            .checked_sub(self.pack_size)
    }
}

/// Where a package header sits inside a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub header_start: u64,
    pub embedded: bool,
}

impl Location {
    pub fn standalone() -> Self {
        Self {
            header_start: 0,
            embedded: false,
        }
    }
}

/// Find the package header in a standalone package or a host with a package appended.
pub fn locate<R: Read + Seek>(stream: &mut R) -> Result<Location> {
    let stream_len = stream.seek(SeekFrom::End(0))?;

    if stream_len >= MAGIC_NUMBER.len() as u64 {
        stream.seek(SeekFrom::Start(0))?;
        if read_array::<4, _>(&mut *stream)? == MAGIC_NUMBER {
            return Ok(Location::standalone());
        }
    }

    if stream_len >= FOOTER_SIZE + MAGIC_NUMBER.len() as u64 {
        stream.seek(SeekFrom::Start(stream_len - FOOTER_SIZE))?;
        if let Ok(footer) = EmbedFooter::read_from(&mut *stream) {
            if let Some(start) = footer.header_start(stream_len) {
                stream.seek(SeekFrom::Start(start))?;
                if read_array::<4, _>(&mut *stream)? == MAGIC_NUMBER {
                    return Ok(Location {
                        header_start: start,
                        embedded: true,
                    });
                }
            }
        }
    }

    Err(PckError::FormatInvalid(
        "not a Godot package and no embedded package found".to_string(),
    ))
}

/// Whether `path` is a package or already carries an appended one
pub fn has_package(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| PckError::on_open(path, e))?;
    match locate(&mut file) {
        Ok(_) => Ok(true),
        Err(PckError::FormatInvalid(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Append the bytes produced by `write_package` plus a footer to the end of `file`.
///
/// Returns `(header_start, pack_size)`.
pub(crate) fn append_package<F>(file: &mut File, write_package: F) -> Result<(u64, u64)>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<u64>,
{
    let header_start = file.seek(SeekFrom::End(0))?;
    if header_start % DEFAULT_ALIGNMENT != 0 {
        warn!(
            host_size = header_start,
            "host size is not a multiple of {}, package starts unaligned", DEFAULT_ALIGNMENT
        );
    }

    let mut writer = BufWriter::new(&mut *file);
    let pack_size = write_package(&mut writer)?;
    EmbedFooter::new(pack_size).write_to(&mut writer)?;
    writer.flush()?;
    drop(writer);

    file.sync_all()?;
    Ok((header_start, pack_size))
}
