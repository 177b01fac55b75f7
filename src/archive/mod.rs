pub(crate) mod footer;
pub(crate) mod format;
pub(crate) mod packer;
pub(crate) mod reader;
pub(crate) mod version;
pub(crate) mod writer;

pub use footer::{has_package, locate, EmbedFooter, Location, FOOTER_SIZE};
pub use format::{
    normalize_path, pad_len, DirEntry, Entry, Layout, PackHeader, DEFAULT_ALIGNMENT, MAGIC_NUMBER,
    MAX_PACK_FORMAT, MAX_PATH_LENGTH, MD5_SIZE, PACK_DIR_ENCRYPTED, PACK_REL_FILEBASE,
    RESERVED_FIELDS,
};
pub use packer::{ArchivePacker, PackOptions};
pub use reader::{archive_path_to_relative, ArchiveInfo, ArchiveReader, ExtractSummary};
pub use version::{PackVersion, VERSION_SIZE};
pub use writer::{PackPlan, PackWriter, MAX_ALIGNMENT};
