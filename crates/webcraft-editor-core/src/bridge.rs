//! Host-side interpretation of sandbox messages.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use webcraft_dom::NodeId;

use crate::history::UndoableDocument;
use crate::message::{ElementInfo, SandboxMessage, TargetInfo};
use crate::sandbox::SandboxController;

/// Fixed action set of the host context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextAction {
    Cut,
    Copy,
    Paste,
    Duplicate,
    Delete,
    Properties,
}

impl ContextAction {
    pub const ALL: [ContextAction; 6] = [
        ContextAction::Cut,
        ContextAction::Copy,
        ContextAction::Paste,
        ContextAction::Duplicate,
        ContextAction::Delete,
        ContextAction::Properties,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ContextAction::Cut => "Cut",
            ContextAction::Copy => "Copy",
            ContextAction::Paste => "Paste",
            ContextAction::Duplicate => "Duplicate",
            ContextAction::Delete => "Delete",
            ContextAction::Properties => "Properties",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextMenu {
    pub x: f64,
    pub y: f64,
    pub target: TargetInfo,
    pub actions: [ContextAction; 6],
}

/// An open request for the media picker.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRequest {
    pub target: NodeId,
    pub current_src: String,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
}

/// What dispatching one message did on the host side.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEffect {
    SelectionChanged(ElementInfo),
    SnapshotTaken { undo_depth: usize },
    /// The sandbox held no document when the change arrived.
    SnapshotSkipped,
    MediaPickerOpened(MediaRequest),
    ContextMenuOpened(ContextMenu),
}

/// Selection and popup state driven by sandbox messages.
#[derive(Debug, Clone, Default)]
pub struct MessageBridge {
    selection: Option<ElementInfo>,
    properties_visible: bool,
    media_request: Option<MediaRequest>,
    context_menu: Option<ContextMenu>,
}

impl MessageBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(
        &mut self,
        message: SandboxMessage,
        sandbox: &SandboxController,
        document: &mut UndoableDocument,
    ) -> HostEffect {
        match message {
            SandboxMessage::ElementSelected { element } => {
                self.selection = Some(element.clone());
                self.properties_visible = true;
                HostEffect::SelectionChanged(element)
            }
            SandboxMessage::ContentChanged { element } => match sandbox.serialize_live() {
                Some(live) => {
                    if let Some(edit) = &element {
                        debug!(node = %edit.node, tag = %edit.tag_name, "text edited");
                    }
                    document.record_edit(live);
                    HostEffect::SnapshotTaken {
                        undo_depth: document.history().undo_depth(),
                    }
                }
                None => {
                    debug!("sandbox not showing a document, snapshot skipped");
                    HostEffect::SnapshotSkipped
                }
            },
            SandboxMessage::ChangeImage {
                target,
                current_src,
                width,
                height,
                aspect_ratio,
            } => {
                let request = MediaRequest {
                    target,
                    current_src,
                    width,
                    height,
                    aspect_ratio,
                };
                info!(src = %request.current_src, "media picker requested");
                self.media_request = Some(request.clone());
                HostEffect::MediaPickerOpened(request)
            }
            SandboxMessage::ContextMenu { x, y, target } => {
                let menu = ContextMenu {
                    x,
                    y,
                    target,
                    actions: ContextAction::ALL,
                };
                self.context_menu = Some(menu.clone());
                HostEffect::ContextMenuOpened(menu)
            }
        }
    }

    pub fn selection(&self) -> Option<&ElementInfo> {
        self.selection.as_ref()
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn properties_visible(&self) -> bool {
        self.properties_visible
    }

    pub fn set_properties_visible(&mut self, visible: bool) {
        self.properties_visible = visible;
    }

    pub fn media_request(&self) -> Option<&MediaRequest> {
        self.media_request.as_ref()
    }

    pub fn take_media_request(&mut self) -> Option<MediaRequest> {
        self.media_request.take()
    }

    pub fn context_menu(&self) -> Option<&ContextMenu> {
        self.context_menu.as_ref()
    }

    pub fn close_context_menu(&mut self) -> Option<ContextMenu> {
        self.context_menu.take()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use web_time::Instant;
    use webcraft_dom::DomTree;

    use super::*;
    use crate::config::EditorConfig;
    use crate::document::{DocumentStore, Mode};
    use crate::history::UndoManager;
    use crate::message::{StyleSnapshot, channel};
    use crate::sandbox::RenderRequest;

    const DOC: &str = "<html><head></head><body><p>One</p></body></html>";

    fn live_sandbox() -> SandboxController {
        let (tx, _rx) = channel();
        let mut sandbox = SandboxController::new(EditorConfig::default(), tx);
        let now = Instant::now();
        sandbox.on_ready(now);
        sandbox.render(
            RenderRequest {
                document: DOC.into(),
                mode: Mode::Edit,
                grid: None,
            },
            now,
        );
        sandbox.tick(now);
        sandbox.tick(now + Duration::from_millis(10));
        sandbox
    }

    #[test]
    fn test_selection_opens_properties() {
        let sandbox = live_sandbox();
        let mut doc = UndoableDocument::new(DocumentStore::new(DOC), 50);
        let mut bridge = MessageBridge::new();
        let node = DomTree::new().root();
        let effect = bridge.dispatch(
            SandboxMessage::ElementSelected {
                element: ElementInfo {
                    node,
                    tag_name: "P".into(),
                    class_name: String::new(),
                    id: String::new(),
                    styles: StyleSnapshot::default(),
                },
            },
            &sandbox,
            &mut doc,
        );
        assert!(matches!(effect, HostEffect::SelectionChanged(_)));
        assert!(bridge.properties_visible());
        assert_eq!(bridge.selection().map(|s| s.tag_name.as_str()), Some("P"));
    }

    #[test]
    fn test_content_change_snapshots_live_tree() {
        let mut sandbox = live_sandbox();
        let mut doc = UndoableDocument::new(DocumentStore::new(DOC), 50);
        let mut bridge = MessageBridge::new();
        sandbox.with_tree_mut(|tree| {
            let p = tree.elements().into_iter().find(|n| tree.tag_name(*n) == Some("p"));
            if let Some(p) = p {
                tree.set_text_content(p, "Two");
            }
        });

        let effect = bridge.dispatch(
            SandboxMessage::ContentChanged { element: None },
            &sandbox,
            &mut doc,
        );
        assert_eq!(effect, HostEffect::SnapshotTaken { undo_depth: 1 });
        assert!(doc.content().contains("<p>Two</p>"));
        assert!(doc.undo());
        assert_eq!(doc.content(), DOC);
    }

    #[test]
    fn test_content_change_without_document_is_skipped() {
        let (tx, _rx) = channel();
        let sandbox = SandboxController::new(EditorConfig::default(), tx);
        let mut doc = UndoableDocument::new(DocumentStore::new(DOC), 50);
        let effect = MessageBridge::new().dispatch(
            SandboxMessage::ContentChanged { element: None },
            &sandbox,
            &mut doc,
        );
        assert_eq!(effect, HostEffect::SnapshotSkipped);
        assert!(!doc.can_undo());
    }

    #[test]
    fn test_context_menu_has_fixed_actions() {
        let sandbox = live_sandbox();
        let mut doc = UndoableDocument::new(DocumentStore::new(DOC), 50);
        let mut bridge = MessageBridge::new();
        let target = TargetInfo {
            node: DomTree::new().root(),
            tag_name: "DIV".into(),
            class_name: "card".into(),
            id: String::new(),
        };
        bridge.dispatch(
            SandboxMessage::ContextMenu { x: 1.0, y: 2.0, target },
            &sandbox,
            &mut doc,
        );
        let menu = bridge.close_context_menu().unwrap();
        let labels: Vec<_> = menu.actions.iter().map(|a| a.label()).collect();
        assert_eq!(
            labels,
            vec!["Cut", "Copy", "Paste", "Duplicate", "Delete", "Properties"]
        );
        assert!(bridge.context_menu().is_none());
    }
}
