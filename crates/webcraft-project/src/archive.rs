//! Archive packaging behind a small trait, so exports can degrade when no
//! archive format is compiled in.

use crate::error::ArchiveError;

/// A file to place in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }
}

pub trait ArchivePacker {
    /// File extension of produced archives, without the dot.
    fn extension(&self) -> &'static str;

    fn pack(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError>;
}

/// Packer used when the build has no archive support.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl ArchivePacker for Unavailable {
    fn extension(&self) -> &'static str {
        "zip"
    }

    fn pack(&self, _entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
        Err(ArchiveError::Unavailable)
    }
}

#[cfg(feature = "zip")]
pub use self::zip_packer::ZipPacker;

#[cfg(feature = "zip")]
mod zip_packer {
    use std::io::{Cursor, Write};

    use zip::CompressionMethod;
    use zip::write::SimpleFileOptions;

    use super::{ArchiveEntry, ArchivePacker};
    use crate::error::ArchiveError;

    /// Deflate-compressed `.zip` archives.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ZipPacker;

    impl ArchivePacker for ZipPacker {
        fn extension(&self) -> &'static str {
            "zip"
        }

        fn pack(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
            let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for entry in entries {
                writer.start_file(entry.path.as_str(), options)?;
                writer.write_all(&entry.bytes)?;
            }
            Ok(writer.finish()?.into_inner())
        }
    }
}

/// The best packer this build supports.
pub fn default_packer() -> Box<dyn ArchivePacker> {
    #[cfg(feature = "zip")]
    {
        Box::new(ZipPacker)
    }
    #[cfg(not(feature = "zip"))]
    {
        Box::new(Unavailable)
    }
}

#[cfg(all(test, feature = "zip"))]
mod tests {
    use std::io::{Cursor, Read};

    use super::*;

    #[test]
    fn test_zip_contains_entries() {
        let bytes = ZipPacker
            .pack(&[
                ArchiveEntry::new("index.html", "<p>hi</p>"),
                ArchiveEntry::new("styles/style0.css", "p{}"),
            ])
            .unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut html = String::new();
        archive
            .by_name("index.html")
            .unwrap()
            .read_to_string(&mut html)
            .unwrap();
        assert_eq!(html, "<p>hi</p>");
    }

    #[test]
    fn test_unavailable_packer_errors() {
        assert!(matches!(
            Unavailable.pack(&[]),
            Err(ArchiveError::Unavailable)
        ));
    }
}
