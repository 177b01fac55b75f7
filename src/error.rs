use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for package operations
pub type Result<T> = std::result::Result<T, PckError>;

/// Unified error type for all package operations
#[derive(Debug, Error)]
pub enum PckError {
    // Lookup errors
    #[error("Not found: {0}")]
    NotFound(String),

    // Format errors
    #[error("Invalid package format: {0}")]
    FormatInvalid(String),

    #[error("Unsupported pack format version: {0}")]
    UnsupportedFormat(u32),

    #[error("No embedded package in {0}")]
    NotEmbedded(String),

    #[error("A package is already embedded in {0}")]
    AlreadyEmbedded(String),

    // Argument errors
    #[error("Source and destination are the same file: {0}")]
    SamePathConflict(String),

    #[error("Invalid version: {0}")]
    VersionInvalid(String),

    #[error("Nothing to do: {0}")]
    EmptyInput(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // Filesystem errors
    #[error("File is locked or in use: {0}")]
    LockedOrInUse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(
        "Could not restore {} from backup {}: {source}",
        .original.display(),
        .backup.display()
    )]
    RestoreFailed {
        original: PathBuf,
        backup: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PckError {
    /// Convert an error from opening a user-supplied path.
    pub fn on_open(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => PckError::NotFound(path.display().to_string()),
            _ => PckError::Io(err),
        }
    }

    /// Convert an error raised while decoding package bytes.
    pub(crate) fn on_decode(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => {
                PckError::FormatInvalid("unexpected end of data".to_string())
            }
            _ => PckError::Io(err),
        }
    }

    /// True when a failed operation may have left the user's file missing or truncated.
    pub fn is_data_loss(&self) -> bool {
        matches!(self, PckError::RestoreFailed { .. })
    }
}

impl From<toml::de::Error> for PckError {
    fn from(err: toml::de::Error) -> Self {
        PckError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PckError {
    fn from(err: serde_json::Error) -> Self {
        PckError::Io(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_mapping() {
        let err = PckError::on_open(
            Path::new("missing.pck"),
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, PckError::NotFound(ref p) if p == "missing.pck"));

        let err = PckError::on_open(
            Path::new("denied.pck"),
            io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(matches!(err, PckError::Io(_)));
    }

    #[test]
    fn test_decode_error_mapping() {
        let err = PckError::on_decode(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(matches!(err, PckError::FormatInvalid(_)));
    }

    #[test]
    fn test_restore_failed_is_data_loss() {
        let err = PckError::RestoreFailed {
            original: PathBuf::from("game.exe"),
            backup: PathBuf::from("game.old.exe"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "locked"),
        };
        assert!(err.is_data_loss());
        assert!(err.to_string().contains("game.old.exe"));
        assert!(!PckError::EmptyInput("x".into()).is_data_loss());
    }
}
