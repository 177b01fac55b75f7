use crate::error::{PckError, Result};
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Chunk size for raw byte-range copies
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Copy exactly `len` bytes in fixed-size chunks.
///
/// A source that ends early is an error: the caller validated the range
/// beforehand, so a short read means the file changed underneath us.
pub fn copy_exact<R: Read, W: Write>(mut reader: R, mut writer: W, len: u64) -> Result<u64> {
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut remaining = len;

    while remaining > 0 {
        let want = remaining.min(COPY_CHUNK_SIZE as u64) as usize;
        let read = match reader.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(PckError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("source ended {} bytes early", remaining),
                )))
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PckError::Io(e)),
        };
        writer.write_all(&buf[..read])?;
        remaining -= read as u64;
    }

    Ok(len)
}

/// Backup name for `path`: `game.exe` -> `game.old.exe`, `game` -> `game.old`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut ext = OsString::from("old");
    if let Some(original) = path.extension() {
        ext.push(".");
        ext.push(original);
    }
    path.with_extension(ext)
}

/// Directory a file lives in (`.` for bare file names)
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Whether two paths name the same file
pub fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
