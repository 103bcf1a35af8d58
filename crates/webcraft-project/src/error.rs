use miette::Diagnostic;

/// Import failures that leave the current document untouched.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum ImportError {
    #[error("no files were provided")]
    #[diagnostic(code(webcraft::import::empty))]
    Empty,

    #[error("no valid HTML content found in {file_count} files")]
    #[diagnostic(
        code(webcraft::import::no_document),
        help("include an index.html, or a framework project with package.json")
    )]
    NoDocument { file_count: usize },

    #[error("entry document {path} could not be read: {reason}")]
    #[diagnostic(code(webcraft::import::entry_unreadable))]
    EntryUnreadable { path: String, reason: String },
}

/// Archive packaging failures. Exports fall back to a single file on these.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum ArchiveError {
    #[error("archive packaging is not available in this build")]
    #[diagnostic(code(webcraft::archive::unavailable))]
    Unavailable,

    #[cfg(feature = "zip")]
    #[error(transparent)]
    #[diagnostic(code(webcraft::archive::zip))]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    #[diagnostic(code(webcraft::archive::io))]
    Io(#[from] std::io::Error),
}
