//! Error types for the editor core.

use miette::Diagnostic;
use webcraft_project::ImportError;

/// Failures surfaced to the user by editor commands.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum EditorError {
    #[error(transparent)]
    #[diagnostic_source]
    Import(#[from] ImportError),

    #[error(transparent)]
    #[diagnostic_source]
    Store(#[from] StoreError),

    #[error("nothing is selected")]
    #[diagnostic(code(webcraft::editor::no_selection), help("click an element first"))]
    NoSelection,

    #[error("the clipboard is empty")]
    #[diagnostic(code(webcraft::editor::empty_clipboard))]
    EmptyClipboard,

    #[error("the selected element is no longer in the document")]
    #[diagnostic(code(webcraft::editor::stale_selection))]
    StaleSelection,

    #[error("the sandbox is not showing a document right now")]
    #[diagnostic(code(webcraft::editor::sandbox_unavailable))]
    SandboxUnavailable,

    #[error("the root element cannot be {0}")]
    #[diagnostic(code(webcraft::editor::protected_element))]
    ProtectedElement(&'static str),

    #[error("unsupported file type {mime}")]
    #[diagnostic(code(webcraft::editor::unsupported_file), help("drop a single .html file"))]
    UnsupportedFile { mime: String },

    #[error("navigate mode is disabled in nested editor instances")]
    #[diagnostic(code(webcraft::editor::nested))]
    NestedInstance,
}

/// Key-value store failures.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum StoreError {
    #[error("could not access {key}: {source}")]
    #[diagnostic(code(webcraft::store::io))]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stored value for {key} is not valid: {source}")]
    #[diagnostic(
        code(webcraft::store::decode),
        help("the entry will be replaced the next time it is saved")
    )]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not encode {key}: {source}")]
    #[diagnostic(code(webcraft::store::encode))]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The frame hierarchy could not be inspected, usually because of an
/// origin boundary.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[error("cannot inspect the enclosing frame: {0}")]
#[diagnostic(code(webcraft::frame::access_denied))]
pub struct FrameAccessError(pub String);
