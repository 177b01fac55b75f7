//! gdpck-rs: read, write and transform Godot `.pck` packages
//!
//! Supports pack formats 0 through 2 (Godot 2, 3 and 4), standalone or
//! appended to a game executable, and provides crash-safe executable
//! transforms:
//! - rip an embedded package out of an executable
//! - merge a standalone package into an executable
//! - split an executable into an executable + package pair
//! - rewrite a package's version in place
//!
//! # Example
//!
//! ```no_run
//! use gdpck_rs::{scan_dir, ArchivePacker, ArchiveReader, PackOptions, PackVersion};
//! use std::path::Path;
//!
//! // Pack a project directory
//! let files = scan_dir(Path::new("project"))?;
//! let options = PackOptions::new(PackVersion::parse("1.3.4.2")?);
//! ArchivePacker::new(options).pack(Path::new("game.pck"), &files, None)?;
//!
//! // Read it back
//! let mut reader = ArchiveReader::open("game.pck")?;
//! let data = reader.read_file("res://project.godot")?;
//! println!("project.godot: {} bytes", data.len());
//! # Ok::<(), gdpck_rs::PckError>(())
//! ```

// Core modules
pub mod archive;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod lock;
pub mod report;
pub mod scan;
pub mod transform;
pub mod util;

// Re-export commonly used types
pub use archive::{
    ArchiveInfo, ArchivePacker, ArchiveReader, Entry, ExtractSummary, Layout, PackOptions,
    PackVersion, DEFAULT_ALIGNMENT, MAGIC_NUMBER,
};
pub use config::PackConfig;
pub use error::{PckError, Result};
pub use report::Report;
pub use scan::{scan_dir, scan_dir_with, FileToPack, ScanOptions};
pub use transform::{change_version, merge, rip, split};
pub use util::{size_suffix, wildcard_match};
