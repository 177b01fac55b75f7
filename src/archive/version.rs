use crate::archive::format::{read_u32, Layout};
use crate::error::{PckError, Result};
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Size of the version block that follows the magic tag
pub const VERSION_SIZE: u64 = 16;

/// Pack format version plus the engine version the package was built for.
///
/// Ordering is lexicographic over `(pack_format, major, minor, revision)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PackVersion {
    pub pack_format: u32,
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
}

impl PackVersion {
    pub fn new(pack_format: u32, major: u32, minor: u32, revision: u32) -> Self {
        Self {
            pack_format,
            major,
            minor,
            revision,
        }
    }

    /// Parse `pack.major.minor[.revision]`.
    ///
    /// The revision defaults to 0 when omitted. Components must be plain
    /// decimal digits and the pack format must name a known layout.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || PckError::VersionInvalid(text.to_string());

        let parts: Vec<&str> = text.trim().split('.').collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(invalid());
        }

        let mut values = [0u32; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        let version = Self::new(values[0], values[1], values[2], values[3]);
        if !version.is_valid() {
            return Err(invalid());
        }
        Ok(version)
    }

    /// Whether the pack format maps to a supported layout
    pub fn is_valid(&self) -> bool {
        Layout::for_format(self.pack_format).is_ok()
    }

    /// Directory layout selected by the pack format
    pub fn layout(&self) -> Result<Layout> {
        Layout::for_format(self.pack_format)
    }

    /// Engine version as `major.minor.revision`
    pub fn engine(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.revision)
    }

    pub(crate) fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.pack_format.to_le_bytes())?;
        writer.write_all(&self.major.to_le_bytes())?;
        writer.write_all(&self.minor.to_le_bytes())?;
        writer.write_all(&self.revision.to_le_bytes())?;
        Ok(())
    }

    pub(crate) fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let pack_format = read_u32(&mut reader)?;
        let major = read_u32(&mut reader)?;
        let minor = read_u32(&mut reader)?;
        let revision = read_u32(&mut reader)?;
        Ok(Self::new(pack_format, major, minor, revision))
    }
}

impl fmt::Display for PackVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.pack_format, self.major, self.minor, self.revision
        )
    }
}

impl FromStr for PackVersion {
    type Err = PckError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
