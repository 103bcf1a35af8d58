//! webcraft-editor-core: the headless core of the webcraft visual HTML editor.
//!
//! This crate provides:
//! - `DocumentStore` and `UndoableDocument` - the document string with bounded history
//! - `SandboxController` - renders the document into a sandbox tree and injects behaviour
//! - `InteractionRuntime` - selection, hover, inline editing, drag and drop inside the sandbox
//! - `MessageBridge` - the host side of the typed sandbox message channel
//! - `ColorScanner` - colour usage and bulk replacement over the rendered tree
//! - `Editor` - the application-state controller tying it all together

pub mod bridge;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod history;
pub mod media;
pub mod message;
pub mod persist;
pub mod runtime;
pub mod sandbox;
pub mod scanner;
pub mod scheduler;

pub use bridge::{ContextAction, ContextMenu, HostEffect, MediaRequest, MessageBridge};
pub use config::EditorConfig;
pub use document::{DEFAULT_TEMPLATE, DocumentStore, Mode, Tool, ViewportProfile};
pub use editor::{Editor, Notice, NoticeLevel, run_for};
pub use error::{EditorError, FrameAccessError, StoreError};
pub use history::{HistoryManager, UndoManager, UndoableDocument};
pub use message::{
    ElementInfo, MessageReceiver, MessageSender, SandboxMessage, StyleSnapshot, TargetInfo,
    TextEdit, channel,
};
pub use persist::{FileStore, KeyValueStore, MemoryStore, PersistedState, Settings};
pub use runtime::{
    EventResponse, InteractionRuntime, Key, LayoutProvider, NavigationDecision, Rect,
    RuntimeState, SandboxEvent, strip_artifacts,
};
pub use sandbox::{FrameContext, RenderPhase, RenderRequest, SandboxController, TopLevel};
pub use scanner::{ColorScanner, ColorUsage, ScanProgress, UsageSite};
pub use scheduler::Scheduler;
pub use smol_str::SmolStr;
pub use webcraft_dom::{DomTree, NodeId};
