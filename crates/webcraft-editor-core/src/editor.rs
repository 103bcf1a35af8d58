//! The application-state controller.
//!
//! `Editor` owns every piece of editor state: the document and its history,
//! the sandbox, the message bridge, colour palette, persisted preferences and
//! the notice queue. UI surfaces read state through its accessors and invoke
//! its commands; nothing else holds mutable editor state.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use web_time::Instant;
use webcraft_dom::{DomTree, NodeId};
use webcraft_project::{
    ArchivePacker, ExportArtifact, ImportedProject, ProjectFile, ProjectFileNode, default_packer,
};

use crate::bridge::{ContextAction, ContextMenu, HostEffect, MediaRequest, MessageBridge};
use crate::config::EditorConfig;
use crate::document::{DEFAULT_TEMPLATE, DocumentStore, Mode, Tool, ViewportProfile};
use crate::error::EditorError;
use crate::history::{UndoManager, UndoableDocument};
use crate::message::{ElementInfo, MessageReceiver, channel};
use crate::persist::{
    AUTOSAVE_CONTENT_KEY, AUTOSAVE_KEY, AutosaveContent, CLIPBOARD_KEY, ClipboardEntry,
    DARK_MODE_KEY, FAVORITES_KEY, ImageRecord, KeyValueStore, PersistedState, RECENT_COLORS_KEY,
    SETTINGS_KEY, Settings, push_recent_color, save, toggle_favorite,
};
use crate::runtime::{EventResponse, SandboxEvent, strip_artifacts};
use crate::sandbox::{FrameContext, RenderRequest, SandboxController, detect_nesting};
use crate::scanner::{ColorScanner, ColorUsage, ScanProgress};
use crate::scheduler::Scheduler;

/// Elements that context actions refuse to touch.
const PROTECTED_TAGS: &[&str] = &["html", "head", "body"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A toast-level message for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum EditorTimer {
    Render,
    Autosave,
}

pub struct Editor {
    config: EditorConfig,
    document: UndoableDocument,
    sandbox: SandboxController,
    messages: MessageReceiver,
    bridge: MessageBridge,
    scanner: ColorScanner,
    store: Box<dyn KeyValueStore>,
    packer: Box<dyn ArchivePacker>,
    prefs: PersistedState,
    mode: Mode,
    tool: Tool,
    show_grid: bool,
    nested: bool,
    palette: Vec<ColorUsage>,
    scan_progress: Option<ScanProgress>,
    file_tree: Vec<ProjectFileNode>,
    notices: Vec<Notice>,
    effects: Vec<HostEffect>,
    timers: Scheduler<EditorTimer, ()>,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("revision", &self.document.store().revision())
            .field("mode", &self.mode)
            .field("phase", &self.sandbox.phase())
            .field("undo", &self.document.history().undo_depth())
            .field("redo", &self.document.history().redo_depth())
            .field("nested", &self.nested)
            .finish_non_exhaustive()
    }
}

impl Editor {
    /// Start an editor, restoring the last auto-save if there is one.
    ///
    /// The first render is queued straight away and runs once the sandbox
    /// reports ready.
    pub fn new(
        config: EditorConfig,
        store: Box<dyn KeyValueStore>,
        frame: &dyn FrameContext,
        now: Instant,
    ) -> Self {
        let prefs = PersistedState::load(store.as_ref());
        let nested = detect_nesting(frame);
        if nested {
            warn!("running inside another editor instance; navigate mode and auto-save are off");
        }

        let mut notices = Vec::new();
        let mut tool = Tool::default();
        let store_doc = match &prefs.autosave_content {
            Some(saved) => {
                info!(saved_at = %saved.timestamp, "restoring auto-saved document");
                notices.push(Notice {
                    level: NoticeLevel::Info,
                    message: "Restored from auto-save".into(),
                });
                tool = saved.selected_tool;
                let mut doc = DocumentStore::new(saved.html.clone());
                doc.set_viewport(saved.device);
                doc
            }
            None => DocumentStore::new(DEFAULT_TEMPLATE),
        };

        let (sender, messages) = channel();
        let mut editor = Self {
            document: UndoableDocument::new(store_doc, config.history_capacity),
            sandbox: SandboxController::new(config.clone(), sender),
            messages,
            bridge: MessageBridge::new(),
            scanner: ColorScanner::new(config.scan_progress_interval),
            store,
            packer: default_packer(),
            prefs,
            mode: Mode::Edit,
            tool,
            show_grid: false,
            nested,
            palette: Vec::new(),
            scan_progress: None,
            file_tree: Vec::new(),
            notices,
            effects: Vec::new(),
            timers: Scheduler::new(),
            config,
        };
        editor.render_now(now);
        editor
    }

    /// Use a different archive packer for exports.
    pub fn with_packer(mut self, packer: impl ArchivePacker + 'static) -> Self {
        self.packer = Box::new(packer);
        self
    }

    // State readers.

    pub fn content(&self) -> &str {
        self.document.content()
    }

    pub fn document(&self) -> &UndoableDocument {
        &self.document
    }

    pub fn sandbox(&self) -> &SandboxController {
        &self.sandbox
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn viewport(&self) -> ViewportProfile {
        self.document.store().viewport()
    }

    pub fn viewport_dimensions(&self) -> (u32, u32) {
        self.viewport().dimensions()
    }

    pub fn show_grid(&self) -> bool {
        self.show_grid
    }

    pub fn is_nested(&self) -> bool {
        self.nested
    }

    pub fn selection(&self) -> Option<&ElementInfo> {
        self.bridge.selection()
    }

    pub fn properties_visible(&self) -> bool {
        self.bridge.properties_visible()
    }

    pub fn undo_depth(&self) -> usize {
        self.document.history().undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.document.history().redo_depth()
    }

    pub fn palette(&self) -> &[ColorUsage] {
        &self.palette
    }

    pub fn scan_progress(&self) -> Option<ScanProgress> {
        self.scan_progress
    }

    pub fn file_tree(&self) -> &[ProjectFileNode] {
        &self.file_tree
    }

    pub fn media_request(&self) -> Option<&MediaRequest> {
        self.bridge.media_request()
    }

    pub fn context_menu(&self) -> Option<&ContextMenu> {
        self.bridge.context_menu()
    }

    pub fn close_context_menu(&mut self) {
        self.bridge.close_context_menu();
    }

    pub fn preferences(&self) -> &PersistedState {
        &self.prefs
    }

    /// Auto-save is on and allowed in this instance.
    pub fn autosave_active(&self) -> bool {
        self.prefs.autosave && !self.nested
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn drain_effects(&mut self) -> Vec<HostEffect> {
        std::mem::take(&mut self.effects)
    }

    // Event loop.

    pub fn on_sandbox_ready(&mut self, now: Instant) -> bool {
        self.sandbox.on_ready(now)
    }

    /// Feed a surface event to the sandbox and act on whatever it reports.
    pub fn handle_event(&mut self, event: &SandboxEvent, now: Instant) -> EventResponse {
        let response = self.sandbox.handle_event(event, now);
        self.pump_messages(now);
        response
    }

    /// Run due timers: debounced renders and auto-saves, then the sandbox's
    /// own render steps and runtime timers.
    pub fn tick(&mut self, now: Instant) {
        for (timer, ()) in self.timers.take_due(now) {
            match timer {
                EditorTimer::Render => self.render_now(now),
                EditorTimer::Autosave => self.autosave(),
            }
        }
        self.sandbox.tick(now);
        self.pump_messages(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.timers.next_deadline(), self.sandbox.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Dispatch queued sandbox messages through the bridge.
    fn pump_messages(&mut self, now: Instant) {
        for message in self.messages.drain() {
            let effect = self.bridge.dispatch(message, &self.sandbox, &mut self.document);
            if let HostEffect::SnapshotTaken { .. } = effect {
                // The sandbox already shows this content.
                self.schedule_autosave(now);
            }
            self.effects.push(effect);
        }
    }

    fn render_now(&mut self, now: Instant) {
        self.timers.cancel(&EditorTimer::Render);
        self.bridge.clear_selection();
        self.bridge.take_media_request();
        self.bridge.close_context_menu();
        let request = RenderRequest {
            document: self.document.content().to_string(),
            mode: self.mode,
            grid: self.show_grid.then_some(self.prefs.settings.grid_size),
        };
        self.sandbox.render(request, now);
    }

    fn schedule_render(&mut self, now: Instant) {
        self.timers
            .schedule(EditorTimer::Render, now, self.config.render_debounce, ());
    }

    fn schedule_autosave(&mut self, now: Instant) {
        if self.autosave_active() {
            self.timers
                .schedule(EditorTimer::Autosave, now, self.config.autosave_debounce, ());
        }
    }

    /// The document string changed through a command.
    fn document_changed(&mut self, now: Instant) {
        self.schedule_render(now);
        self.schedule_autosave(now);
    }

    fn autosave(&mut self) {
        if !self.autosave_active() {
            return;
        }
        let content = AutosaveContent {
            html: self.document.content().to_string(),
            timestamp: Utc::now(),
            device: self.viewport(),
            selected_tool: self.tool,
        };
        match save(self.store.as_ref(), AUTOSAVE_CONTENT_KEY, &content) {
            Ok(()) => {
                debug!(bytes = content.html.len(), "auto-saved");
                self.prefs.autosave_content = Some(content);
                self.notify(NoticeLevel::Info, "Auto-saved");
            }
            Err(err) => {
                warn!(%err, "auto-save failed");
                self.notify(NoticeLevel::Error, "Auto-save failed");
            }
        }
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    fn persist<T: serde::Serialize>(&mut self, key: &str, value: &T) {
        if let Err(err) = save(self.store.as_ref(), key, value) {
            warn!(%err, key, "could not persist preference");
            self.notify(NoticeLevel::Error, "Could not save preferences");
        }
    }

    // History.

    pub fn undo(&mut self, now: Instant) -> bool {
        if !self.document.undo() {
            return false;
        }
        self.notify(NoticeLevel::Info, "Undo");
        self.document_changed(now);
        true
    }

    pub fn redo(&mut self, now: Instant) -> bool {
        if !self.document.redo() {
            return false;
        }
        self.notify(NoticeLevel::Info, "Redo");
        self.document_changed(now);
        true
    }

    /// Replace the document with hand-edited markup.
    pub fn apply_code_edit(&mut self, html: impl Into<String>, now: Instant) -> bool {
        let html = html.into();
        if html == self.document.content() {
            return false;
        }
        self.document.record_edit(html);
        self.notify(NoticeLevel::Success, "Code changes applied");
        self.document_changed(now);
        true
    }

    // Presentation.

    pub fn set_mode(&mut self, mode: Mode, now: Instant) -> Result<(), EditorError> {
        if mode == Mode::Navigate && self.nested {
            return Err(EditorError::NestedInstance);
        }
        if mode == self.mode {
            return Ok(());
        }
        self.mode = mode;
        let label = match mode {
            Mode::Edit => "Edit mode: click elements to select them",
            Mode::Navigate => "Navigate mode: links are live",
        };
        self.notify(NoticeLevel::Info, label);
        self.schedule_render(now);
        Ok(())
    }

    pub fn toggle_grid(&mut self, now: Instant) -> bool {
        self.show_grid = !self.show_grid;
        self.schedule_render(now);
        self.show_grid
    }

    pub fn set_viewport(&mut self, viewport: ViewportProfile) {
        self.document.store_mut().set_viewport(viewport);
    }

    pub fn select_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    // Colours.

    /// Rebuild the palette from the rendered document.
    pub fn scan_colors(
        &mut self,
        mut on_progress: impl FnMut(ScanProgress),
    ) -> Result<&[ColorUsage], EditorError> {
        let tree = self
            .sandbox
            .document_tree()
            .ok_or(EditorError::SandboxUnavailable)?;
        let mut last = None;
        let palette = self.scanner.scan(tree, |progress| {
            last = Some(progress);
            on_progress(progress);
        });
        self.palette = palette;
        self.scan_progress = last;
        let found = format!("Found {} unique colors", self.palette.len());
        self.notify(NoticeLevel::Success, found);
        Ok(&self.palette)
    }

    /// Replace every use of `old` with `new`. A non-zero count records one
    /// history snapshot and refreshes the palette.
    pub fn replace_color(&mut self, old: &str, new: &str, now: Instant) -> Result<usize, EditorError> {
        let mut tree = self.stripped_live_tree()?;
        let replaced = self.scanner.replace(&mut tree, old, new);
        if replaced == 0 {
            self.notify(NoticeLevel::Info, "No instances of that color found");
            return Ok(0);
        }

        let mut last = None;
        self.palette = self.scanner.scan(&tree, |progress| last = Some(progress));
        self.scan_progress = last;
        self.commit_tree(&tree, now);

        let limit = self.config.recent_colors_limit;
        push_recent_color(&mut self.prefs.recent_colors, new.trim(), limit);
        let recent = self.prefs.recent_colors.clone();
        self.persist(RECENT_COLORS_KEY, &recent);

        info!(old, new, replaced, "colour replaced");
        self.notify(
            NoticeLevel::Success,
            format!("Replaced {replaced} instances of the color"),
        );
        Ok(replaced)
    }

    // Project IO.

    /// Import an uploaded project. On failure the document is untouched.
    pub fn import_project(
        &mut self,
        files: &[ProjectFile],
        now: Instant,
    ) -> Result<ImportedProject, EditorError> {
        let project = match webcraft_project::import_project(files, &self.config.import) {
            Ok(project) => project,
            Err(err) => {
                self.notify(NoticeLevel::Error, err.to_string());
                return Err(err.into());
            }
        };
        for warning in &project.warnings {
            self.notify(NoticeLevel::Warning, warning.clone());
        }
        self.file_tree = project.file_tree.clone();
        self.document.record_edit(project.html.clone());
        self.notify(
            NoticeLevel::Success,
            format!("Project imported: {} files", project.file_count),
        );
        self.document_changed(now);
        Ok(project)
    }

    /// Package the document. Never fails; see [`ExportArtifact::SingleFile`].
    pub fn export_project(&mut self) -> ExportArtifact {
        let artifact =
            webcraft_project::export_project(self.document.content(), self.packer.as_ref(), Utc::now());
        match &artifact {
            ExportArtifact::Archive { files, .. } => {
                let message = format!("Project exported ({files} files)");
                self.notify(NoticeLevel::Success, message);
            }
            ExportArtifact::SingleFile { notice, .. } => {
                let notice = notice.clone();
                self.notify(NoticeLevel::Warning, notice);
            }
        }
        artifact
    }

    /// Load a single dropped HTML file as the document.
    pub fn load_dropped_file(
        &mut self,
        name: &str,
        mime: &str,
        bytes: &[u8],
        now: Instant,
    ) -> Result<(), EditorError> {
        let lower = name.to_ascii_lowercase();
        let is_html = mime == "text/html"
            || (mime.is_empty() && (lower.ends_with(".html") || lower.ends_with(".htm")));
        if !is_html {
            return Err(EditorError::UnsupportedFile {
                mime: mime.to_string(),
            });
        }
        let html = String::from_utf8_lossy(bytes).into_owned();
        self.document.record_edit(html);
        self.notify(NoticeLevel::Success, format!("Loaded {name}"));
        self.document_changed(now);
        Ok(())
    }

    /// Point the image behind the open media request at `src`.
    pub fn apply_image(&mut self, src: &str, now: Instant) -> Result<(), EditorError> {
        let request = self
            .bridge
            .take_media_request()
            .ok_or(EditorError::NoSelection)?;
        let mut tree = self.stripped_live_tree()?;
        if tree.tag_name(request.target) != Some("img") || !tree.is_attached(request.target) {
            return Err(EditorError::StaleSelection);
        }
        tree.set_attr(request.target, "src", src);
        self.commit_tree(&tree, now);
        self.notify(NoticeLevel::Success, "Image updated");
        Ok(())
    }

    // Context actions.

    /// Run a context-menu action on the element the menu was opened for,
    /// falling back to the selection.
    pub fn context_action(&mut self, action: ContextAction, now: Instant) -> Result<(), EditorError> {
        let target = self.bridge.close_context_menu().map(|menu| menu.target.node);
        let target = match target {
            Some(node) => node,
            None => self.selected_node()?,
        };
        match action {
            ContextAction::Cut => self.cut_node(target, now)?,
            ContextAction::Copy => self.copy_node(target)?,
            ContextAction::Paste => self.paste_at(Some(target), now)?,
            ContextAction::Duplicate => self.duplicate_node(target, now)?,
            ContextAction::Delete => self.delete_node(target, now)?,
            ContextAction::Properties => return self.show_properties(),
        }
        self.notify(NoticeLevel::Success, action_notice(action));
        Ok(())
    }

    pub fn cut(&mut self, now: Instant) -> Result<(), EditorError> {
        let node = self.selected_node()?;
        self.cut_node(node, now)?;
        self.notify(NoticeLevel::Success, action_notice(ContextAction::Cut));
        Ok(())
    }

    pub fn copy(&mut self) -> Result<(), EditorError> {
        let node = self.selected_node()?;
        self.copy_node(node)?;
        self.notify(NoticeLevel::Success, action_notice(ContextAction::Copy));
        Ok(())
    }

    /// Insert the clipboard after the selection, or at the end of the body.
    pub fn paste(&mut self, now: Instant) -> Result<(), EditorError> {
        let anchor = self.bridge.selection().map(|s| s.node);
        self.paste_at(anchor, now)?;
        self.notify(NoticeLevel::Success, action_notice(ContextAction::Paste));
        Ok(())
    }

    pub fn duplicate(&mut self, now: Instant) -> Result<(), EditorError> {
        let node = self.selected_node()?;
        self.duplicate_node(node, now)?;
        self.notify(NoticeLevel::Success, action_notice(ContextAction::Duplicate));
        Ok(())
    }

    pub fn delete(&mut self, now: Instant) -> Result<(), EditorError> {
        let node = self.selected_node()?;
        self.delete_node(node, now)?;
        self.notify(NoticeLevel::Success, action_notice(ContextAction::Delete));
        Ok(())
    }

    pub fn show_properties(&mut self) -> Result<(), EditorError> {
        if self.bridge.selection().is_none() {
            return Err(EditorError::NoSelection);
        }
        self.bridge.set_properties_visible(true);
        Ok(())
    }

    pub fn clipboard(&self) -> Option<&ClipboardEntry> {
        self.prefs.clipboard.as_ref()
    }

    fn selected_node(&self) -> Result<NodeId, EditorError> {
        self.bridge
            .selection()
            .map(|s| s.node)
            .ok_or(EditorError::NoSelection)
    }

    fn cut_node(&mut self, node: NodeId, now: Instant) -> Result<(), EditorError> {
        self.copy_node(node)?;
        self.delete_node(node, now)
    }

    fn copy_node(&mut self, node: NodeId) -> Result<(), EditorError> {
        let tree = self.stripped_live_tree()?;
        let element = tree
            .element(node)
            .filter(|_| tree.is_attached(node))
            .ok_or(EditorError::StaleSelection)?;
        let entry = ClipboardEntry {
            tag_name: element.name.to_ascii_uppercase(),
            class_name: element.class_name().to_string(),
            id: element.id().unwrap_or_default().to_string(),
            html: tree.outer_html(node),
        };
        self.persist(CLIPBOARD_KEY, &entry);
        self.prefs.clipboard = Some(entry);
        Ok(())
    }

    fn paste_at(&mut self, anchor: Option<NodeId>, now: Instant) -> Result<(), EditorError> {
        let entry = self.prefs.clipboard.clone().ok_or(EditorError::EmptyClipboard)?;
        let (fragment, top) = DomTree::parse_fragment(&entry.html);
        let mut tree = self.stripped_live_tree()?;
        let anchor = anchor.filter(|a| {
            tree.is_attached(*a)
                && tree
                    .tag_name(*a)
                    .is_some_and(|tag| !PROTECTED_TAGS.contains(&tag))
        });
        let mut last = anchor;
        for node in top {
            let Some(copy) = tree.import_subtree(&fragment, node) else {
                continue;
            };
            match last {
                Some(prev) => {
                    tree.insert_after(prev, copy);
                }
                None => {
                    let body = tree.body_or_root();
                    tree.append_child(body, copy);
                }
            }
            last = Some(copy);
        }
        self.commit_tree(&tree, now);
        Ok(())
    }

    fn duplicate_node(&mut self, node: NodeId, now: Instant) -> Result<(), EditorError> {
        let mut tree = self.stripped_live_tree()?;
        Self::check_structural(&tree, node, "duplicated")?;
        let copy = tree.deep_clone(node).ok_or(EditorError::StaleSelection)?;
        tree.insert_after(node, copy);
        self.commit_tree(&tree, now);
        Ok(())
    }

    fn delete_node(&mut self, node: NodeId, now: Instant) -> Result<(), EditorError> {
        let mut tree = self.stripped_live_tree()?;
        Self::check_structural(&tree, node, "deleted")?;
        tree.detach(node);
        self.commit_tree(&tree, now);
        Ok(())
    }

    fn check_structural(tree: &DomTree, node: NodeId, verb: &'static str) -> Result<(), EditorError> {
        let tag = tree
            .tag_name(node)
            .filter(|_| tree.is_attached(node))
            .ok_or(EditorError::StaleSelection)?;
        if PROTECTED_TAGS.contains(&tag) {
            return Err(EditorError::ProtectedElement(verb));
        }
        Ok(())
    }

    /// A copy of the rendered tree with runtime artifacts removed. Node ids
    /// of page elements stay valid in the copy.
    fn stripped_live_tree(&self) -> Result<DomTree, EditorError> {
        let mut tree = self
            .sandbox
            .document_tree()
            .ok_or(EditorError::SandboxUnavailable)?
            .clone();
        strip_artifacts(&mut tree);
        Ok(tree)
    }

    /// Adopt an edited tree as the document, recording one snapshot. The
    /// selection points into the old render and is dropped.
    fn commit_tree(&mut self, tree: &DomTree, now: Instant) {
        self.bridge.clear_selection();
        self.sandbox.clear_selection();
        self.document.record_edit(tree.to_html());
        self.document_changed(now);
    }

    // Preferences.

    pub fn set_dark_mode(&mut self, enabled: bool) {
        self.prefs.dark_mode = enabled;
        self.persist(DARK_MODE_KEY, &enabled);
    }

    pub fn set_autosave(&mut self, enabled: bool) -> Result<(), EditorError> {
        if enabled && self.nested {
            return Err(EditorError::NestedInstance);
        }
        self.prefs.autosave = enabled;
        self.persist(AUTOSAVE_KEY, &enabled);
        if !enabled {
            self.timers.cancel(&EditorTimer::Autosave);
        }
        let state = if enabled { "enabled" } else { "disabled" };
        self.notify(NoticeLevel::Info, format!("Auto-save {state}"));
        Ok(())
    }

    /// Returns true when the image is now a favourite.
    pub fn toggle_favorite(&mut self, image: ImageRecord) -> bool {
        let added = toggle_favorite(&mut self.prefs.favorites, image);
        let favorites = self.prefs.favorites.clone();
        self.persist(FAVORITES_KEY, &favorites);
        added
    }

    pub fn update_settings(&mut self, settings: Settings, now: Instant) {
        let grid_changed = settings.grid_size != self.prefs.settings.grid_size;
        self.persist(SETTINGS_KEY, &settings);
        self.prefs.settings = settings;
        if grid_changed && self.show_grid {
            self.schedule_render(now);
        }
        self.notify(NoticeLevel::Success, "Settings saved");
    }
}

fn action_notice(action: ContextAction) -> &'static str {
    match action {
        ContextAction::Cut => "Element cut",
        ContextAction::Copy => "Element copied",
        ContextAction::Paste => "Element pasted",
        ContextAction::Duplicate => "Element duplicated",
        ContextAction::Delete => "Element deleted",
        ContextAction::Properties => "Properties",
    }
}

/// Advance `editor` in small steps until `duration` has passed.
///
/// Convenience for hosts without their own timer wheel.
pub fn run_for(editor: &mut Editor, start: Instant, duration: Duration) -> Instant {
    let end = start + duration;
    let mut now = start;
    editor.tick(now);
    while let Some(deadline) = editor.next_deadline() {
        if deadline > end || deadline <= now {
            break;
        }
        now = deadline;
        editor.tick(now);
    }
    editor.tick(end);
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameAccessError;
    use crate::persist::MemoryStore;
    use crate::sandbox::TopLevel;

    const PAGE: &str = r#"<html><head></head><body><h1 id="title">Hi</h1><p class="lead">Text</p></body></html>"#;

    struct Nested;

    impl FrameContext for Nested {
        fn is_nested_instance(&self) -> Result<bool, FrameAccessError> {
            Ok(true)
        }
    }

    fn live_editor(html: &str) -> (Editor, Instant) {
        let start = Instant::now();
        let mut editor = Editor::new(
            EditorConfig::default(),
            Box::new(MemoryStore::new()),
            &TopLevel,
            start,
        );
        editor.on_sandbox_ready(start);
        let now = run_for(&mut editor, start, Duration::from_millis(50));
        editor.apply_code_edit(html, now);
        let now = run_for(&mut editor, now, Duration::from_millis(100));
        editor.drain_notices();
        (editor, now)
    }

    fn find(editor: &Editor, pred: impl Fn(&DomTree, NodeId) -> bool) -> NodeId {
        let tree = editor.sandbox().document_tree().unwrap();
        tree.elements().into_iter().find(|n| pred(tree, *n)).unwrap()
    }

    fn by_tag(editor: &Editor, tag: &str) -> NodeId {
        find(editor, |tree, n| tree.tag_name(n) == Some(tag))
    }

    #[test]
    fn test_starts_with_template() {
        let editor = Editor::new(
            EditorConfig::default(),
            Box::new(MemoryStore::new()),
            &TopLevel,
            Instant::now(),
        );
        assert_eq!(editor.content(), DEFAULT_TEMPLATE);
        assert_eq!(editor.viewport_dimensions(), (1038, 653));
        assert!(editor.autosave_active());
    }

    #[test]
    fn test_restores_autosave() {
        let store = MemoryStore::new();
        let saved = AutosaveContent {
            html: PAGE.into(),
            timestamp: Utc::now(),
            device: ViewportProfile::Mobile,
            selected_tool: Tool::Image,
        };
        save(&store, AUTOSAVE_CONTENT_KEY, &saved).unwrap();
        let mut editor = Editor::new(
            EditorConfig::default(),
            Box::new(store),
            &TopLevel,
            Instant::now(),
        );
        assert_eq!(editor.content(), PAGE);
        assert_eq!(editor.viewport(), ViewportProfile::Mobile);
        assert_eq!(editor.tool(), Tool::Image);
        let notices = editor.drain_notices();
        assert_eq!(notices[0].message, "Restored from auto-save");
    }

    #[test]
    fn test_selection_reaches_host() {
        let (mut editor, now) = live_editor(PAGE);
        let h1 = by_tag(&editor, "h1");
        let response = editor.handle_event(&SandboxEvent::Click { target: h1 }, now);
        assert!(response.propagation_stopped);
        assert_eq!(editor.selection().map(|s| s.id.as_str()), Some("title"));
        assert!(editor.properties_visible());
    }

    #[test]
    fn test_inline_edit_snapshots_without_rerender() {
        let (mut editor, now) = live_editor(PAGE);
        let generation = editor.sandbox().generation();
        let p = by_tag(&editor, "p");
        editor.handle_event(&SandboxEvent::DoubleClick { target: p }, now);
        editor.handle_event(
            &SandboxEvent::Input {
                target: p,
                text: "Edited".into(),
            },
            now,
        );
        editor.handle_event(&SandboxEvent::Blur { target: p }, now);
        assert_eq!(editor.undo_depth(), 2);
        assert!(editor.content().contains(r#"<p class="lead">Edited</p>"#));
        assert!(!editor.content().contains("data-webcraft"));

        run_for(&mut editor, now, Duration::from_millis(100));
        assert_eq!(editor.sandbox().generation(), generation);
    }

    #[test]
    fn test_undo_rerenders() {
        let (mut editor, now) = live_editor(PAGE);
        let generation = editor.sandbox().generation();
        assert!(editor.undo(now));
        assert_eq!(editor.content(), DEFAULT_TEMPLATE);
        run_for(&mut editor, now, Duration::from_millis(100));
        assert_eq!(editor.sandbox().generation(), generation + 1);
        assert!(editor.redo(now));
        assert_eq!(editor.content(), PAGE);
        assert!(!editor.redo(now));
    }

    #[test]
    fn test_duplicate_and_delete() {
        let (mut editor, now) = live_editor(PAGE);
        let p = by_tag(&editor, "p");
        editor.handle_event(&SandboxEvent::Click { target: p }, now);
        editor.duplicate(now).unwrap();
        assert_eq!(editor.content().matches(r#"<p class="lead">Text</p>"#).count(), 2);
        let now = run_for(&mut editor, now, Duration::from_millis(100));
        assert!(editor.selection().is_none());

        let h1 = by_tag(&editor, "h1");
        editor.handle_event(&SandboxEvent::Click { target: h1 }, now);
        editor.delete(now).unwrap();
        assert!(!editor.content().contains("<h1"));
        assert!(matches!(editor.delete(now), Err(EditorError::NoSelection)));
    }

    #[test]
    fn test_root_elements_are_protected() {
        let (mut editor, now) = live_editor(PAGE);
        let body = by_tag(&editor, "body");
        editor.handle_event(&SandboxEvent::Click { target: body }, now);
        assert!(matches!(
            editor.delete(now),
            Err(EditorError::ProtectedElement("deleted"))
        ));
    }

    #[test]
    fn test_copy_paste() {
        let (mut editor, now) = live_editor(PAGE);
        assert!(matches!(editor.paste(now), Err(EditorError::EmptyClipboard)));
        let h1 = by_tag(&editor, "h1");
        editor.handle_event(&SandboxEvent::Click { target: h1 }, now);
        editor.copy().unwrap();
        let entry = editor.clipboard().unwrap();
        assert_eq!(entry.tag_name, "H1");
        assert_eq!(entry.html, r#"<h1 id="title">Hi</h1>"#);

        editor.paste(now).unwrap();
        assert!(
            editor
                .content()
                .contains(r#"<h1 id="title">Hi</h1><h1 id="title">Hi</h1><p"#)
        );
    }

    #[test]
    fn test_cut_leaves_one_notice() {
        let (mut editor, now) = live_editor(PAGE);
        let p = by_tag(&editor, "p");
        editor.handle_event(&SandboxEvent::Click { target: p }, now);
        editor.cut(now).unwrap();
        assert!(!editor.content().contains("<p"));
        assert!(editor.clipboard().is_some());
        let notices = editor.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message, "Element cut");
    }

    #[test]
    fn test_context_action_uses_menu_target() {
        let (mut editor, now) = live_editor(PAGE);
        let p = by_tag(&editor, "p");
        editor.handle_event(
            &SandboxEvent::ContextMenu {
                target: p,
                x: 10.0,
                y: 20.0,
            },
            now,
        );
        assert!(editor.context_menu().is_some());
        editor.context_action(ContextAction::Delete, now).unwrap();
        assert!(editor.context_menu().is_none());
        assert!(!editor.content().contains("<p"));
    }

    #[test]
    fn test_autosave_debounce() {
        let (mut editor, now) = live_editor(PAGE);
        let later = run_for(&mut editor, now, Duration::from_millis(2100));
        let notices = editor.drain_notices();
        assert!(notices.iter().any(|n| n.message == "Auto-saved"));
        let saved = editor.preferences().autosave_content.clone().unwrap();
        assert_eq!(saved.html, PAGE);

        editor.set_autosave(false).unwrap();
        editor.apply_code_edit("<p>x</p>", later);
        run_for(&mut editor, later, Duration::from_millis(2100));
        assert!(
            editor
                .drain_notices()
                .iter()
                .all(|n| n.message != "Auto-saved")
        );
    }

    #[test]
    fn test_nested_instance_degrades() {
        let now = Instant::now();
        let mut editor = Editor::new(
            EditorConfig::default(),
            Box::new(MemoryStore::new()),
            &Nested,
            now,
        );
        assert!(editor.is_nested());
        assert!(!editor.autosave_active());
        assert!(matches!(
            editor.set_mode(Mode::Navigate, now),
            Err(EditorError::NestedInstance)
        ));
        assert!(matches!(
            editor.set_autosave(true),
            Err(EditorError::NestedInstance)
        ));
    }

    #[test]
    fn test_dropped_file() {
        let (mut editor, now) = live_editor(PAGE);
        assert!(matches!(
            editor.load_dropped_file("a.png", "image/png", b"x", now),
            Err(EditorError::UnsupportedFile { .. })
        ));
        editor
            .load_dropped_file("page.html", "text/html", b"<p>dropped</p>", now)
            .unwrap();
        assert_eq!(editor.content(), "<p>dropped</p>");
        assert!(editor.undo(now));
        assert_eq!(editor.content(), PAGE);
    }

    #[test]
    fn test_preferences_persist() {
        let (mut editor, now) = live_editor(PAGE);
        editor.set_dark_mode(true);
        let image = ImageRecord {
            id: "1".into(),
            url: "https://images.example/1.jpg".into(),
            thumb: None,
            author: None,
            source: None,
            width: None,
            height: None,
            tags: Vec::new(),
        };
        assert!(editor.toggle_favorite(image.clone()));
        editor.update_settings(
            Settings {
                grid_size: 20,
                ..Settings::default()
            },
            now,
        );
        let reloaded = PersistedState::load(editor.store.as_ref());
        assert!(reloaded.dark_mode);
        assert_eq!(reloaded.favorites, vec![image]);
        assert_eq!(reloaded.settings.grid_size, 20);
    }
}
