//! Project import and export for webcraft.
//!
//! Import takes an unordered set of uploaded files and reconciles it into a
//! single self-contained HTML document plus a file tree for display. Export
//! goes the other way, splitting a document into HTML/CSS/JS files packed
//! into an archive.

pub mod archive;
pub mod error;
pub mod export;
pub mod files;
pub mod import;
pub mod tree;

#[cfg(feature = "zip")]
pub use archive::ZipPacker;
pub use archive::{ArchiveEntry, ArchivePacker, Unavailable, default_packer};
pub use error::{ArchiveError, ImportError};
pub use export::{ExportArtifact, ExportBundle, export_project};
pub use files::{FileContents, ProjectFile};
pub use import::{
    Framework, ImportOptions, ImportedProject, InlineSummary, ProjectKind, SkippedFile,
    import_project,
};
pub use tree::{ProjectFileNode, build_file_tree};
