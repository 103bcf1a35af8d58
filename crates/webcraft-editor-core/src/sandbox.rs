//! Lifecycle of the sandboxed rendering surface.
//!
//! Every render tears the surface down to an empty shell, writes the new
//! document on the next tick and injects behaviour after a short settle
//! delay. Each render gets a generation number; tasks left over from an
//! earlier render are dropped instead of touching the new document.

use tracing::{debug, trace, warn};
use url::Url;
use web_time::Instant;
use webcraft_dom::DomTree;

use crate::config::EditorConfig;
use crate::document::Mode;
use crate::error::FrameAccessError;
use crate::message::MessageSender;
use crate::runtime::{
    Artifact, EventResponse, InteractionRuntime, NavigationDecision, SandboxEvent,
    strip_artifacts,
};
use crate::scheduler::Scheduler;

pub const GRID_OVERLAY_ID: &str = "webcraft-grid-overlay";

/// Where the surface is in its render sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    /// Nothing has been rendered yet.
    Empty,
    /// Cleared to the empty shell, waiting to write.
    Shell,
    /// Document written, behaviour not injected yet.
    Written,
    Live,
}

/// Everything one render needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub document: String,
    pub mode: Mode,
    /// Grid cell size in pixels, when the grid overlay is shown.
    pub grid: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RenderStep {
    Write,
    Inject,
}

/// Owns the sandbox tree and keeps it in step with the document and mode.
#[derive(Debug)]
pub struct SandboxController {
    config: EditorConfig,
    sender: MessageSender,
    ready: bool,
    deferred: Option<RenderRequest>,
    current: Option<RenderRequest>,
    tree: Option<DomTree>,
    phase: RenderPhase,
    generation: u64,
    steps: Scheduler<RenderStep, u64>,
    runtime: Option<InteractionRuntime>,
}

impl SandboxController {
    pub fn new(config: EditorConfig, sender: MessageSender) -> Self {
        Self {
            config,
            sender,
            ready: false,
            deferred: None,
            current: None,
            tree: None,
            phase: RenderPhase::Empty,
            generation: 0,
            steps: Scheduler::new(),
            runtime: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mode(&self) -> Option<Mode> {
        self.current.as_ref().map(|r| r.mode)
    }

    pub fn tree(&self) -> Option<&DomTree> {
        self.tree.as_ref()
    }

    pub fn runtime(&self) -> Option<&InteractionRuntime> {
        self.runtime.as_ref()
    }

    /// The surface signalled that it can accept writes. Fires once; a
    /// render requested before then runs now.
    pub fn on_ready(&mut self, now: Instant) -> bool {
        if self.ready {
            return false;
        }
        self.ready = true;
        debug!("sandbox ready");
        if let Some(request) = self.deferred.take() {
            self.render(request, now);
        }
        true
    }

    /// Rebuild the surface from scratch for `request`.
    pub fn render(&mut self, request: RenderRequest, now: Instant) {
        if !self.ready {
            trace!("sandbox not ready, deferring render");
            self.deferred = Some(request);
            return;
        }
        self.generation += 1;
        self.steps.clear();
        self.runtime = None;
        self.tree = Some(DomTree::parse(&self.config.shell_markup));
        self.phase = RenderPhase::Shell;
        debug!(generation = self.generation, mode = ?request.mode, "render started");
        self.current = Some(request);
        self.steps.schedule(
            RenderStep::Write,
            now,
            std::time::Duration::ZERO,
            self.generation,
        );
    }

    /// Advance pending render steps and runtime timers.
    pub fn tick(&mut self, now: Instant) {
        for (step, generation) in self.steps.take_due(now) {
            if generation != self.generation {
                trace!(generation, "dropping stale render step");
                continue;
            }
            match step {
                RenderStep::Write => self.write(now),
                RenderStep::Inject => self.inject(),
            }
        }
        if let (Some(runtime), Some(tree)) = (self.runtime.as_mut(), self.tree.as_mut()) {
            runtime.tick(tree, now);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        let runtime = self.runtime.as_ref().and_then(|r| r.next_deadline());
        match (self.steps.next_deadline(), runtime) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn write(&mut self, now: Instant) {
        let Some(request) = &self.current else {
            return;
        };
        self.tree = Some(DomTree::parse(&request.document));
        self.phase = RenderPhase::Written;
        self.steps.schedule(
            RenderStep::Inject,
            now,
            self.config.settle_delay,
            self.generation,
        );
    }

    fn inject(&mut self) {
        let (Some(request), Some(tree)) = (&self.current, self.tree.as_mut()) else {
            return;
        };
        match request.mode {
            Mode::Edit => {
                let mut runtime = InteractionRuntime::new(self.sender.clone(), &self.config);
                runtime.install(tree);
                self.runtime = Some(runtime);
            }
            Mode::Navigate => install_navigation_guard(tree, &self.config.editor_host),
        }
        if let Some(size) = request.grid {
            add_grid_overlay(tree, size);
        }
        self.phase = RenderPhase::Live;
        debug!(generation = self.generation, "render live");
    }

    /// The tree holding the rendered document, runtime artifacts included.
    /// `None` before the first write of the current render.
    pub fn document_tree(&self) -> Option<&DomTree> {
        match self.phase {
            RenderPhase::Empty | RenderPhase::Shell => None,
            RenderPhase::Written | RenderPhase::Live => self.tree.as_ref(),
        }
    }

    /// The rendered document as markup, without any runtime artifacts.
    ///
    /// `None` while the surface holds no document (before the first render
    /// or mid-teardown).
    pub fn serialize_live(&self) -> Option<String> {
        let mut copy = self.document_tree()?.clone();
        strip_artifacts(&mut copy);
        Some(copy.to_html())
    }

    /// Feed one surface event in.
    pub fn handle_event(&mut self, event: &SandboxEvent, now: Instant) -> EventResponse {
        if self.phase != RenderPhase::Live {
            return EventResponse::IGNORED;
        }
        if let (Some(runtime), Some(tree)) = (self.runtime.as_mut(), self.tree.as_mut()) {
            return runtime.handle_event(tree, event, now);
        }
        let Some(tree) = self.tree.as_ref() else {
            return EventResponse::IGNORED;
        };
        match event {
            SandboxEvent::Click { target } => {
                let href = tree
                    .closest(*target, |el| el.is("a") && el.has_attr("href"))
                    .and_then(|a| tree.attr(a, "href"));
                match href {
                    Some(href) => EventResponse::navigation(self.navigation_decision(href)),
                    None => EventResponse::IGNORED,
                }
            }
            SandboxEvent::Navigate { url } => {
                EventResponse::navigation(self.navigation_decision(url))
            }
            _ => EventResponse::IGNORED,
        }
    }

    /// Block navigation back into the editor itself.
    pub fn navigation_decision(&self, href: &str) -> NavigationDecision {
        match Url::parse(href.trim()) {
            Ok(url)
                if url
                    .host_str()
                    .is_some_and(|host| host.eq_ignore_ascii_case(&self.config.editor_host)) =>
            {
                debug!(href, "blocked navigation into the editor");
                NavigationDecision::Blocked
            }
            // Relative URLs stay on the sandboxed page.
            _ => NavigationDecision::Allowed,
        }
    }

    /// Mutate the live tree, then let the runtime observe the change.
    pub fn with_tree_mut<R>(&mut self, f: impl FnOnce(&mut DomTree) -> R) -> Option<R> {
        if matches!(self.phase, RenderPhase::Empty | RenderPhase::Shell) {
            return None;
        }
        let tree = self.tree.as_mut()?;
        let result = f(tree);
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.observe(tree);
        }
        Some(result)
    }

    /// Drop the runtime's selection affordances.
    pub fn clear_selection(&mut self) {
        if let (Some(runtime), Some(tree)) = (self.runtime.as_mut(), self.tree.as_mut()) {
            runtime.clear_selection(tree);
        }
    }
}

fn install_navigation_guard(tree: &mut DomTree, editor_host: &str) {
    let host = serde_json::Value::String(editor_host.to_string());
    let script = Artifact::NavigationGuard.create(tree, "script");
    let body = format!(
        r#"
(function () {{
  var editorHost = {host};
  document.addEventListener('click', function (e) {{
    var link = e.target.closest && e.target.closest('a[href]');
    if (!link) return;
    try {{
      if (new URL(link.href, location.href).hostname === editorHost) e.preventDefault();
    }} catch (err) {{}}
  }}, true);
}})();
"#
    );
    let text = tree.create_text(body);
    tree.append_child(script, text);
    let parent = tree.body_or_root();
    tree.append_child(parent, script);
}

/// Add the grid overlay unless one is already present.
pub fn add_grid_overlay(tree: &mut DomTree, size: u32) -> bool {
    if tree.element_by_id(GRID_OVERLAY_ID).is_some() {
        return false;
    }
    let size = size.max(2);
    let line = size - 1;
    let overlay = Artifact::GridOverlay.create(tree, "div");
    tree.set_attr(overlay, "id", GRID_OVERLAY_ID);
    tree.set_attr(
        overlay,
        "style",
        format!(
            "position: fixed; top: 0; left: 0; right: 0; bottom: 0; \
             background-image: \
             repeating-linear-gradient(0deg, transparent, transparent {line}px, rgba(0,0,0,0.05) {size}px), \
             repeating-linear-gradient(90deg, transparent, transparent {line}px, rgba(0,0,0,0.05) {size}px); \
             pointer-events: none; z-index: 9999;"
        ),
    );
    let body = tree.body_or_root();
    tree.append_child(body, overlay);
    true
}

/// Access to the frame hierarchy the editor runs in.
pub trait FrameContext {
    /// Whether this editor is itself displayed inside another instance.
    fn is_nested_instance(&self) -> Result<bool, FrameAccessError>;
}

/// A top-level window: never nested.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopLevel;

impl FrameContext for TopLevel {
    fn is_nested_instance(&self) -> Result<bool, FrameAccessError> {
        Ok(false)
    }
}

/// Nesting check that treats an inaccessible frame hierarchy as not nested.
pub fn detect_nesting(frame: &dyn FrameContext) -> bool {
    match frame.is_nested_instance() {
        Ok(nested) => nested,
        Err(err) => {
            warn!(%err, "nesting check failed, assuming a top-level instance");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::message::channel;

    const DOC: &str = r#"<html><head></head><body><a href="http://localhost:3000/">Self</a><a href="/about">About</a><p>Text</p></body></html>"#;

    fn request(mode: Mode) -> RenderRequest {
        RenderRequest {
            document: DOC.into(),
            mode,
            grid: None,
        }
    }

    fn ready_controller() -> (SandboxController, Instant) {
        let (tx, _rx) = channel();
        let mut sandbox = SandboxController::new(EditorConfig::default(), tx);
        let now = Instant::now();
        sandbox.on_ready(now);
        (sandbox, now)
    }

    fn settle(sandbox: &mut SandboxController, now: Instant) -> Instant {
        sandbox.tick(now);
        let later = now + Duration::from_millis(10);
        sandbox.tick(later);
        later
    }

    #[test]
    fn test_render_waits_for_ready() {
        let (tx, _rx) = channel();
        let mut sandbox = SandboxController::new(EditorConfig::default(), tx);
        let now = Instant::now();
        sandbox.render(request(Mode::Edit), now);
        assert_eq!(sandbox.phase(), RenderPhase::Empty);

        assert!(sandbox.on_ready(now));
        assert!(!sandbox.on_ready(now));
        assert_eq!(sandbox.phase(), RenderPhase::Shell);
        assert_eq!(sandbox.serialize_live(), None);
        settle(&mut sandbox, now);
        assert_eq!(sandbox.phase(), RenderPhase::Live);
    }

    #[test]
    fn test_inject_waits_for_settle_delay() {
        let (mut sandbox, now) = ready_controller();
        sandbox.render(request(Mode::Edit), now);
        sandbox.tick(now);
        assert_eq!(sandbox.phase(), RenderPhase::Written);
        assert!(sandbox.runtime().is_none());
        sandbox.tick(now + Duration::from_millis(5));
        assert_eq!(sandbox.phase(), RenderPhase::Written);
        sandbox.tick(now + Duration::from_millis(10));
        assert!(sandbox.runtime().is_some_and(|r| r.is_installed()));
    }

    #[test]
    fn test_new_render_supersedes_pending_steps() {
        let (mut sandbox, now) = ready_controller();
        sandbox.render(request(Mode::Edit), now);
        sandbox.tick(now);
        sandbox.render(
            RenderRequest {
                document: "<html><body><h1>Second</h1></body></html>".into(),
                mode: Mode::Navigate,
                grid: None,
            },
            now,
        );
        settle(&mut sandbox, now);
        assert!(sandbox.runtime().is_none());
        let second = DomTree::parse("<html><body><h1>Second</h1></body></html>").to_html();
        assert_eq!(sandbox.serialize_live(), Some(second));
    }

    #[test]
    fn test_live_serialization_is_clean() {
        let (mut sandbox, now) = ready_controller();
        sandbox.render(
            RenderRequest {
                grid: Some(10),
                ..request(Mode::Edit)
            },
            now,
        );
        settle(&mut sandbox, now);
        let tree = sandbox.tree().unwrap();
        assert!(tree.element_by_id(GRID_OVERLAY_ID).is_some());
        assert_eq!(sandbox.serialize_live(), Some(DomTree::parse(DOC).to_html()));
    }

    #[test]
    fn test_grid_overlay_is_idempotent() {
        let mut tree = DomTree::parse(DOC);
        assert!(add_grid_overlay(&mut tree, 20));
        assert!(!add_grid_overlay(&mut tree, 20));
        let overlay = tree.element_by_id(GRID_OVERLAY_ID).unwrap();
        assert!(tree.attr(overlay, "style").unwrap().contains("transparent 19px"));
    }

    #[test]
    fn test_navigate_mode_guards_self_links() {
        let (mut sandbox, now) = ready_controller();
        sandbox.render(request(Mode::Navigate), now);
        settle(&mut sandbox, now);
        let tree = sandbox.tree().unwrap();
        let anchors: Vec<_> = tree
            .elements()
            .into_iter()
            .filter(|n| tree.tag_name(*n) == Some("a"))
            .collect();

        let blocked = sandbox.handle_event(&SandboxEvent::Click { target: anchors[0] }, now);
        assert_eq!(blocked.navigation, Some(NavigationDecision::Blocked));
        assert!(blocked.default_prevented);
        let allowed = sandbox.handle_event(&SandboxEvent::Click { target: anchors[1] }, now);
        assert_eq!(allowed.navigation, Some(NavigationDecision::Allowed));
        let external = sandbox.handle_event(
            &SandboxEvent::Navigate {
                url: "https://example.com/".into(),
            },
            now,
        );
        assert_eq!(external.navigation, Some(NavigationDecision::Allowed));
    }

    #[test]
    fn test_nesting_errors_mean_top_level() {
        struct Denied;
        impl FrameContext for Denied {
            fn is_nested_instance(&self) -> Result<bool, FrameAccessError> {
                Err(FrameAccessError("cross-origin frame".into()))
            }
        }
        struct Nested;
        impl FrameContext for Nested {
            fn is_nested_instance(&self) -> Result<bool, FrameAccessError> {
                Ok(true)
            }
        }
        assert!(!detect_nesting(&Denied));
        assert!(!detect_nesting(&TopLevel));
        assert!(detect_nesting(&Nested));
    }
}
