use crate::archive::version::PackVersion;
use crate::error::{PckError, Result};
use serde::{Serialize, Serializer};
use std::io::{Read, Write};

/// Magic tag: "GDPC"
/// Opens every package header and closes every embedding footer
pub const MAGIC_NUMBER: [u8; 4] = *b"GDPC";

/// Highest pack format with a known layout (Godot 4)
pub const MAX_PACK_FORMAT: u32 = 2;

/// Number of reserved u32 fields after the version block
pub const RESERVED_FIELDS: usize = 16;

/// Per-entry MD5 digest width
pub const MD5_SIZE: usize = 16;

/// Longest path accepted while decoding a directory
pub const MAX_PATH_LENGTH: usize = 32 * 1024;

/// Default payload alignment used by the packer
pub const DEFAULT_ALIGNMENT: u64 = 8;

/// Pack flag: directory is encrypted (not supported)
pub const PACK_DIR_ENCRYPTED: u32 = 1 << 0;

/// Pack flag: file base is relative to the header start
pub const PACK_REL_FILEBASE: u32 = 1 << 1;

/// On-disk layout, one per supported pack format.
///
/// Every size and offset decision in the codec goes through this type so
/// that an unknown format fails here instead of being misread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Layout {
    /// Pack format 0: unpadded paths, no flags
    Godot2,
    /// Pack format 1: paths padded to 4 bytes
    Godot3,
    /// Pack format 2: pack flags, file base and per-entry flags
    Godot4,
}

impl Layout {
    pub fn for_format(pack_format: u32) -> Result<Self> {
        match pack_format {
            0 => Ok(Self::Godot2),
            1 => Ok(Self::Godot3),
            2 => Ok(Self::Godot4),
            other => Err(PckError::UnsupportedFormat(other)),
        }
    }

    pub fn pack_format(self) -> u32 {
        match self {
            Self::Godot2 => 0,
            Self::Godot3 => 1,
            Self::Godot4 => 2,
        }
    }

    /// Header carries pack flags and a file base
    pub fn has_file_base(self) -> bool {
        matches!(self, Self::Godot4)
    }

    /// Directory entries end with a flags word
    pub fn has_entry_flags(self) -> bool {
        matches!(self, Self::Godot4)
    }

    /// Paths are NUL padded to a multiple of 4 bytes
    pub fn pads_paths(self) -> bool {
        !matches!(self, Self::Godot2)
    }

    /// Header size in bytes, magic and entry count included
    pub fn header_size(self) -> u64 {
        let extra = if self.has_file_base() { 4 + 8 } else { 0 };
        4 + 16 + extra + (RESERVED_FIELDS as u64 * 4) + 4
    }

    /// Bytes used to store a path of `len` bytes
    pub fn stored_path_len(self, len: usize) -> usize {
        if self.pads_paths() {
            len + pad_len(len as u64, 4) as usize
        } else {
            len
        }
    }

    /// Smallest possible directory entry (empty path)
    pub fn min_entry_size(self) -> u64 {
        let flags = if self.has_entry_flags() { 4 } else { 0 };
        4 + 8 + 8 + MD5_SIZE as u64 + flags
    }
}

/// Package header located at `header_start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackHeader {
    pub version: PackVersion,
    pub flags: u32,
    pub file_base: u64,
    pub entry_count: u32,
}

impl PackHeader {
    pub fn new(version: PackVersion) -> Self {
        Self {
            version,
            flags: 0,
            file_base: 0,
            entry_count: 0,
        }
    }

    pub fn layout(&self) -> Result<Layout> {
        self.version.layout()
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let layout = self.layout()?;

        writer.write_all(&MAGIC_NUMBER)?;
        self.version.write_to(&mut writer)?;

        if layout.has_file_base() {
            writer.write_all(&self.flags.to_le_bytes())?;
            writer.write_all(&self.file_base.to_le_bytes())?;
        }

        // Reserved (16 x u32)
        writer.write_all(&[0u8; RESERVED_FIELDS * 4])?;

        writer.write_all(&self.entry_count.to_le_bytes())?;
        Ok(())
    }

    /// Read header from a reader positioned at the magic tag
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let magic = read_array::<4, _>(&mut reader)?;
        if magic != MAGIC_NUMBER {
            return Err(PckError::FormatInvalid(
                "bad magic at header start".to_string(),
            ));
        }

        let version = PackVersion::read_from(&mut reader)?;
        let layout = version.layout()?;

        let (flags, file_base) = if layout.has_file_base() {
            (read_u32(&mut reader)?, read_u64(&mut reader)?)
        } else {
            (0, 0)
        };

        if flags & PACK_DIR_ENCRYPTED != 0 {
            return Err(PckError::FormatInvalid(
                "encrypted package directories are not supported".to_string(),
            ));
        }

        // Skip reserved fields
        read_array::<{ RESERVED_FIELDS * 4 }, _>(&mut reader)?;

        let entry_count = read_u32(&mut reader)?;

        Ok(Self {
            version,
            flags,
            file_base,
            entry_count,
        })
    }

    /// Base that stored entry offsets are relative to, as an absolute stream offset
    pub fn payload_base(&self, header_start: u64) -> Result<u64> {
        let layout = self.layout()?;
        let base = if !layout.has_file_base() {
            Some(header_start)
        } else if self.flags & PACK_REL_FILEBASE != 0 {
            header_start.checked_add(self.file_base)
        } else {
            Some(self.file_base)
        };
        base.ok_or_else(|| PckError::FormatInvalid("file base overflows".to_string()))
    }
}

/// Directory record as stored on disk (offset relative to the payload base)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: String,
    pub offset: u64,
    pub size: u64,
    pub md5: [u8; MD5_SIZE],
    pub flags: u32,
}

impl DirEntry {
    pub fn new(path: String, offset: u64, size: u64) -> Self {
        Self {
            path,
            offset,
            size,
            md5: [0u8; MD5_SIZE],
            flags: 0,
        }
    }

    /// Bytes this record occupies in the directory
    pub fn encoded_size(&self, layout: Layout) -> u64 {
        layout.min_entry_size() + layout.stored_path_len(self.path.len()) as u64
    }

    pub fn write_to<W: Write>(&self, mut writer: W, layout: Layout) -> Result<()> {
        let path_bytes = self.path.as_bytes();
        if path_bytes.len() > MAX_PATH_LENGTH {
            return Err(PckError::InvalidArgument(format!(
                "Path too long: {} bytes (max {})",
                path_bytes.len(),
                MAX_PATH_LENGTH
            )));
        }

        let stored = layout.stored_path_len(path_bytes.len());
        writer.write_all(&(stored as u32).to_le_bytes())?;
        writer.write_all(path_bytes)?;
        writer.write_all(&vec![0u8; stored - path_bytes.len()])?;

        writer.write_all(&self.offset.to_le_bytes())?;
        writer.write_all(&self.size.to_le_bytes())?;
        writer.write_all(&self.md5)?;

        if layout.has_entry_flags() {
            writer.write_all(&self.flags.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R, layout: Layout) -> Result<Self> {
        let stored = read_u32(&mut reader)? as usize;
        if stored > MAX_PATH_LENGTH {
            return Err(PckError::FormatInvalid(format!(
                "entry path length {} exceeds {}",
                stored, MAX_PATH_LENGTH
            )));
        }

        let mut path_buf = vec![0u8; stored];
        reader.read_exact(&mut path_buf).map_err(PckError::on_decode)?;

        // Padding and C-string terminators are NUL bytes
        let end = path_buf.iter().position(|&b| b == 0).unwrap_or(path_buf.len());
        path_buf.truncate(end);
        let path = String::from_utf8(path_buf)
            .map_err(|e| PckError::FormatInvalid(format!("Invalid UTF-8 in path: {}", e)))?;

        let offset = read_u64(&mut reader)?;
        let size = read_u64(&mut reader)?;
        let md5 = read_array::<MD5_SIZE, _>(&mut reader)?;
        let flags = if layout.has_entry_flags() {
            read_u32(&mut reader)?
        } else {
            0
        };

        Ok(Self {
            path,
            offset,
            size,
            md5,
            flags,
        })
    }
}

/// One archive member, with its payload offset resolved against the whole stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub path: String,
    pub offset: u64,
    pub size: u64,
    #[serde(serialize_with = "serialize_md5")]
    pub md5: [u8; MD5_SIZE],
    pub flags: u32,
}

impl Entry {
    /// MD5 digest as lowercase hex; all zeros means the packer did not record one
    pub fn md5_hex(&self) -> String {
        hex::encode(self.md5)
    }

    pub fn has_md5(&self) -> bool {
        self.md5 != [0u8; MD5_SIZE]
    }

    /// Last byte past the payload, if it does not overflow
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

fn serialize_md5<S: Serializer>(md5: &[u8; MD5_SIZE], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(md5))
}

/// Normalize path to forward slashes (cross-platform compatibility)
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Zero bytes needed to move `pos` to the next multiple of `alignment`
pub fn pad_len(pos: u64, alignment: u64) -> u64 {
    match pos % alignment {
        0 => 0,
        rem => alignment - rem,
    }
}

// Helper functions for reading primitive types
pub(crate) fn read_array<const N: usize, R: Read>(mut reader: R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(PckError::on_decode)?;
    Ok(buf)
}

pub(crate) fn read_u32<R: Read>(reader: R) -> Result<u32> {
    Ok(u32::from_le_bytes(read_array::<4, _>(reader)?))
}

pub(crate) fn read_u64<R: Read>(reader: R) -> Result<u64> {
    Ok(u64::from_le_bytes(read_array::<8, _>(reader)?))
}
