//! Uploaded project files.

use std::borrow::Cow;

/// Bytes of an uploaded file, or why they could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContents {
    Loaded(Vec<u8>),
    Failed(String),
}

/// One entry of an uploaded project, addressed by its relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFile {
    /// Relative path with `/` separators, e.g. `site/css/main.css`.
    pub path: String,
    pub size: u64,
    pub contents: FileContents,
}

impl ProjectFile {
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self {
            path: normalize_path(&path.into()),
            size: bytes.len() as u64,
            contents: FileContents::Loaded(bytes),
        }
    }

    /// A file whose contents could not be read.
    pub fn failed(path: impl Into<String>, size: u64, reason: impl Into<String>) -> Self {
        Self {
            path: normalize_path(&path.into()),
            size,
            contents: FileContents::Failed(reason.into()),
        }
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Directory part of the path, empty at the top level.
    pub fn dir(&self) -> &str {
        self.path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    /// Lowercase extension without the dot.
    pub fn extension(&self) -> Option<String> {
        self.name()
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    pub fn depth(&self) -> usize {
        self.path.matches('/').count()
    }

    pub fn bytes(&self) -> Result<&[u8], &str> {
        match &self.contents {
            FileContents::Loaded(bytes) => Ok(bytes),
            FileContents::Failed(reason) => Err(reason),
        }
    }

    /// Contents as text; invalid UTF-8 is replaced rather than rejected.
    pub fn text(&self) -> Result<Cow<'_, str>, &str> {
        self.bytes().map(String::from_utf8_lossy)
    }
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches("./").trim_start_matches('/').to_string()
}
