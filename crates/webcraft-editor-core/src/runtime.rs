//! The interaction layer injected into the sandbox in edit mode.
//!
//! The runtime turns a rendered document into an editable surface. It
//! mutates only the sandbox tree and reaches the host only through its
//! [`MessageSender`]. Visual affordances are reserved `data-webcraft-*`
//! attributes styled by an injected stylesheet, plus artifact elements
//! marked with [`ARTIFACT_ATTR`]; [`strip_artifacts`] removes all of it.

use std::time::Duration;

use smol_str::SmolStr;
use tracing::{debug, trace};
use web_time::Instant;
use webcraft_dom::{DomTree, NodeId, StyleResolver};

use crate::config::EditorConfig;
use crate::media::natural_size;
use crate::message::{
    ElementInfo, MessageSender, SandboxMessage, StyleSnapshot, TargetInfo, TextEdit,
};
use crate::scheduler::Scheduler;

pub const ARTIFACT_ATTR: &str = "data-webcraft-artifact";
pub const ORIGINAL_HREF_ATTR: &str = "data-original-href";
/// Prefix shared by every runtime marker attribute.
pub const RUNTIME_ATTR_PREFIX: &str = "data-webcraft-";
pub const INDICATOR_ID: &str = "webcraft-edit-mode-indicator";
pub const IMAGE_WRAPPER_CLASS: &str = "webcraft-image-wrapper";
pub const IMAGE_BUTTON_CLASS: &str = "webcraft-image-change-btn";
pub const DRAGGABLE_CLASS: &str = "draggable";
pub const DROPPABLE_CLASS: &str = "droppable";

const SELECTED_ATTR: &str = "data-webcraft-selected";
const HOVER_ATTR: &str = "data-webcraft-hover";
const EDITING_ATTR: &str = "data-webcraft-editing";
const DRAGGING_ATTR: &str = "data-webcraft-dragging";
const DIMMED_ATTR: &str = "data-webcraft-dimmed";
const FEEDBACK_ATTR: &str = "data-webcraft-feedback";
const VISIBLE_ATTR: &str = "data-webcraft-visible";
const PROCESSED_ATTR: &str = "data-webcraft-processed";
/// Marks a `disabled` attribute the runtime added itself.
const DISABLED_ATTR: &str = "data-webcraft-disabled";

/// Tags that can be edited in place with a double click.
pub const EDITABLE_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "span", "div", "a", "button", "li", "td", "th",
    "label",
];

const RUNTIME_CSS: &str = r#"
[data-webcraft-hover] { outline: 1px dashed #cbd5e0; outline-offset: 2px; }
[data-webcraft-selected] { outline: 2px solid #667eea; outline-offset: 2px; }
[data-webcraft-editing] { outline: 2px dashed #667eea; outline-offset: 2px; }
[data-webcraft-dragging] { opacity: 0.5; }
[data-webcraft-dimmed] { cursor: default; opacity: 0.8; }
[data-webcraft-feedback] { animation: webcraft-shake 0.3s; }
[data-webcraft-artifact="image-wrapper"] { position: relative; display: inline-block; }
[data-webcraft-artifact="image-button"] {
  position: absolute; top: 8px; right: 8px; display: none;
  padding: 4px 10px; border: none; border-radius: 4px;
  background: rgba(102, 126, 234, 0.9); color: white; font-size: 12px; cursor: pointer;
}
[data-webcraft-artifact="image-button"][data-webcraft-visible] { display: block; }
[data-webcraft-artifact="handle"] {
  position: absolute; width: 8px; height: 8px; background: #667eea;
  border: 1px solid white; border-radius: 50%; z-index: 10000;
}
[data-webcraft-artifact="indicator"] {
  position: fixed; top: 10px; right: 10px; padding: 5px 15px; border-radius: 20px;
  background: rgba(59, 130, 246, 0.9); color: white; font-size: 12px;
  z-index: 10000; pointer-events: none;
}
@keyframes webcraft-shake {
  0%, 100% { transform: translateX(0); }
  25% { transform: translateX(-5px); }
  75% { transform: translateX(5px); }
}
"#;

/// Kinds of element the runtime and sandbox add to a rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    RuntimeStyle,
    Indicator,
    Handle,
    ImageWrapper,
    ImageButton,
    GridOverlay,
    NavigationGuard,
}

impl Artifact {
    pub fn as_str(self) -> &'static str {
        match self {
            Artifact::RuntimeStyle => "runtime-style",
            Artifact::Indicator => "indicator",
            Artifact::Handle => "handle",
            Artifact::ImageWrapper => "image-wrapper",
            Artifact::ImageButton => "image-button",
            Artifact::GridOverlay => "grid",
            Artifact::NavigationGuard => "guard",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "runtime-style" => Artifact::RuntimeStyle,
            "indicator" => Artifact::Indicator,
            "handle" => Artifact::Handle,
            "image-wrapper" => Artifact::ImageWrapper,
            "image-button" => Artifact::ImageButton,
            "grid" => Artifact::GridOverlay,
            "guard" => Artifact::NavigationGuard,
            _ => return None,
        })
    }

    /// The artifact kind of `node`, if it is one.
    pub fn of(tree: &DomTree, node: NodeId) -> Option<Self> {
        tree.attr(node, ARTIFACT_ATTR).and_then(Artifact::parse)
    }

    /// Create a detached, marked artifact element.
    pub fn create(self, tree: &mut DomTree, tag: &str) -> NodeId {
        let node = tree.create_element(tag);
        tree.set_attr(node, ARTIFACT_ATTR, self.as_str());
        node
    }
}

/// Whether `node` is an artifact or sits inside one. Images inside their
/// swap wrapper still belong to the page.
pub fn is_artifact(tree: &DomTree, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        match Artifact::of(tree, n) {
            Some(Artifact::ImageWrapper) if n != node => {}
            Some(_) => return true,
            None => {}
        }
        current = tree.parent(n);
    }
    false
}

/// Remove every runtime artifact and marker, returning the tree to the
/// document it was rendered from.
pub fn strip_artifacts(tree: &mut DomTree) {
    let mut wrappers = Vec::new();
    for node in tree.elements() {
        match Artifact::of(tree, node) {
            Some(Artifact::ImageWrapper) => wrappers.push(node),
            Some(_) => tree.detach(node),
            None => {}
        }
    }
    for wrapper in wrappers {
        tree.unwrap_node(wrapper);
    }

    for node in tree.elements() {
        if let Some(href) = tree.remove_attr(node, ORIGINAL_HREF_ATTR) {
            tree.set_attr(node, "href", href);
        }
        if tree.has_attr(node, DISABLED_ATTR) {
            tree.remove_attr(node, "disabled");
        }
        if tree.has_attr(node, EDITING_ATTR) {
            tree.remove_attr(node, "contenteditable");
        }
        let markers: Vec<String> = tree
            .element(node)
            .map(|el| {
                el.attrs
                    .iter()
                    .filter(|a| a.name.starts_with(RUNTIME_ATTR_PREFIX))
                    .map(|a| a.name.to_string())
                    .collect()
            })
            .unwrap_or_default();
        for name in markers {
            tree.remove_attr(node, &name);
        }
    }
}

/// Platform-agnostic key values the runtime reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Escape,
    /// A character key.
    Character(SmolStr),
    /// Anything else, by its DOM `key` name.
    Other(SmolStr),
}

/// Input reaching the sandbox surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SandboxEvent {
    Click { target: NodeId },
    PointerOver { target: NodeId },
    /// `related` is the node the pointer moved to, if any.
    PointerOut { target: NodeId, related: Option<NodeId> },
    DoubleClick { target: NodeId },
    /// The full text of an element being edited in place.
    Input { target: NodeId, text: String },
    KeyDown { target: NodeId, key: Key, shift: bool },
    Blur { target: NodeId },
    DragStart { target: NodeId },
    DragEnd { target: NodeId },
    Drop { target: NodeId },
    ContextMenu { target: NodeId, x: f64, y: f64 },
    Submit { form: NodeId },
    /// A navigation attempt not tied to an anchor click.
    Navigate { url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    Allowed,
    Blocked,
}

/// What the surface should do with the native event after handling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventResponse {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
    pub navigation: Option<NavigationDecision>,
}

impl EventResponse {
    pub const IGNORED: EventResponse = EventResponse {
        default_prevented: false,
        propagation_stopped: false,
        navigation: None,
    };

    pub const CONSUMED: EventResponse = EventResponse {
        default_prevented: true,
        propagation_stopped: true,
        navigation: None,
    };

    pub fn navigation(decision: NavigationDecision) -> Self {
        Self {
            default_prevented: decision == NavigationDecision::Blocked,
            propagation_stopped: false,
            navigation: Some(decision),
        }
    }
}

/// Selection and drag state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuntimeState {
    #[default]
    Idle,
    Selected(NodeId),
    /// `resume` is the selection to return to once the drag ends.
    Dragging {
        node: NodeId,
        resume: Option<NodeId>,
    },
}

impl RuntimeState {
    pub fn selected(&self) -> Option<NodeId> {
        match *self {
            RuntimeState::Selected(node) => Some(node),
            _ => None,
        }
    }
}

/// An element being edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub node: NodeId,
    pub original: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RuntimeTimer {
    Hover,
    HideImageButton(NodeId),
    LinkFeedback(NodeId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Source of element bounding boxes for resize handles.
pub trait LayoutProvider {
    fn bounding_rect(&self, tree: &DomTree, node: NodeId) -> Option<Rect>;
}

/// Reads pixel `left`, `top`, `width` and `height` from the computed style.
/// Anything that is not a pixel length counts as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredLayout;

impl LayoutProvider for DeclaredLayout {
    fn bounding_rect(&self, tree: &DomTree, node: NodeId) -> Option<Rect> {
        tree.element(node)?;
        let style = StyleResolver::new(tree).computed(node);
        let px = |value: &str| {
            value
                .trim()
                .strip_suffix("px")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        Some(Rect {
            x: px(&style.left),
            y: px(&style.top),
            width: px(&style.width),
            height: px(&style.height),
        })
    }
}

/// Handle corners and their offsets from the bounding box.
const HANDLES: [&str; 4] = ["nw", "ne", "sw", "se"];

fn handle_position(rect: &Rect, corner: &str) -> (f64, f64) {
    let left = if corner.ends_with('w') { rect.x } else { rect.right() };
    let top = if corner.starts_with('n') { rect.y } else { rect.bottom() };
    (left - 4.0, top - 4.0)
}

/// Event-driven editing behaviour for one rendered document.
pub struct InteractionRuntime {
    sender: MessageSender,
    layout: Box<dyn LayoutProvider>,
    state: RuntimeState,
    editing: Option<EditSession>,
    hovered: Option<NodeId>,
    handles: Vec<NodeId>,
    timers: Scheduler<RuntimeTimer, NodeId>,
    hover_delay: Duration,
    hide_delay: Duration,
    feedback: Duration,
    installed: bool,
    observed_revision: u64,
}

impl std::fmt::Debug for InteractionRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionRuntime")
            .field("state", &self.state)
            .field("editing", &self.editing)
            .field("installed", &self.installed)
            .finish_non_exhaustive()
    }
}

impl InteractionRuntime {
    pub fn new(sender: MessageSender, config: &EditorConfig) -> Self {
        Self {
            sender,
            layout: Box::new(DeclaredLayout),
            state: RuntimeState::Idle,
            editing: None,
            hovered: None,
            handles: Vec::new(),
            timers: Scheduler::new(),
            hover_delay: config.hover_delay,
            hide_delay: config.image_button_hide_delay,
            feedback: config.link_feedback,
            installed: false,
            observed_revision: 0,
        }
    }

    pub fn with_layout(mut self, layout: impl LayoutProvider + 'static) -> Self {
        self.layout = Box::new(layout);
        self
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn editing(&self) -> Option<&EditSession> {
        self.editing.as_ref()
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Wire the runtime into `tree`. Only the first call has any effect.
    pub fn install(&mut self, tree: &mut DomTree) {
        if self.installed {
            return;
        }
        self.installed = true;

        let style = Artifact::RuntimeStyle.create(tree, "style");
        let css = tree.create_text(RUNTIME_CSS);
        tree.append_child(style, css);
        let style_parent = tree.head().unwrap_or_else(|| tree.body_or_root());
        tree.append_child(style_parent, style);

        let indicator = Artifact::Indicator.create(tree, "div");
        tree.set_attr(indicator, "id", INDICATOR_ID);
        tree.set_text_content(indicator, "Edit mode");
        let body = tree.body_or_root();
        tree.append_child(body, indicator);

        let (links, controls) = neutralize_navigation(tree);
        let images = self.process_images(tree);
        self.observed_revision = tree.revision();
        debug!(links, controls, images, "interaction runtime installed");
    }

    /// Mutation observer: wrap images added since the last look.
    pub fn observe(&mut self, tree: &mut DomTree) {
        if !self.installed || tree.revision() == self.observed_revision {
            return;
        }
        let wrapped = self.process_images(tree);
        if wrapped > 0 {
            trace!(wrapped, "wrapped newly added images");
        }
        self.observed_revision = tree.revision();
    }

    fn process_images(&mut self, tree: &mut DomTree) -> usize {
        let body = tree.body_or_root();
        let pending: Vec<NodeId> = tree
            .element_descendants(body)
            .into_iter()
            .filter(|n| tree.tag_name(*n) == Some("img"))
            .filter(|n| !tree.has_attr(*n, PROCESSED_ATTR) && !is_artifact(tree, *n))
            .collect();
        for img in &pending {
            let img = *img;
            tree.set_attr(img, PROCESSED_ATTR, "");
            let Some(parent) = tree.parent(img) else {
                continue;
            };
            let wrapper = Artifact::ImageWrapper.create(tree, "div");
            tree.set_attr(wrapper, "class", IMAGE_WRAPPER_CLASS);
            tree.insert_before(parent, wrapper, img);
            tree.append_child(wrapper, img);

            let button = Artifact::ImageButton.create(tree, "button");
            tree.set_attr(button, "class", IMAGE_BUTTON_CLASS);
            tree.set_attr(button, "type", "button");
            tree.set_text_content(button, "Change image");
            tree.append_child(wrapper, button);
        }
        pending.len()
    }

    /// Dispatch one surface event.
    pub fn handle_event(
        &mut self,
        tree: &mut DomTree,
        event: &SandboxEvent,
        now: Instant,
    ) -> EventResponse {
        let response = match *event {
            SandboxEvent::Click { target } => self.on_click(tree, target, now),
            SandboxEvent::PointerOver { target } => self.on_pointer_over(tree, target, now),
            SandboxEvent::PointerOut { target, related } => {
                self.on_pointer_out(tree, target, related, now)
            }
            SandboxEvent::DoubleClick { target } => self.on_double_click(tree, target),
            SandboxEvent::Input { target, ref text } => {
                match &self.editing {
                    Some(session) if tree.contains(session.node, target) => {
                        let node = session.node;
                        tree.set_text_content(node, text);
                    }
                    _ => {}
                }
                EventResponse::IGNORED
            }
            SandboxEvent::KeyDown {
                target,
                ref key,
                shift,
            } => self.on_key_down(tree, target, key, shift),
            SandboxEvent::Blur { target } => {
                if self.editing.as_ref().is_some_and(|s| s.node == target) {
                    self.finish_editing(tree);
                }
                EventResponse::IGNORED
            }
            SandboxEvent::DragStart { target } => self.on_drag_start(tree, target),
            SandboxEvent::DragEnd { .. } => {
                self.end_drag(tree);
                EventResponse::IGNORED
            }
            SandboxEvent::Drop { target } => self.on_drop(tree, target),
            SandboxEvent::ContextMenu { target, x, y } => {
                let target = element_target(tree, target);
                self.sender.send(SandboxMessage::ContextMenu {
                    x,
                    y,
                    target: target_info(tree, target),
                });
                EventResponse::CONSUMED
            }
            SandboxEvent::Submit { .. } => EventResponse {
                default_prevented: true,
                ..EventResponse::IGNORED
            },
            SandboxEvent::Navigate { .. } => {
                EventResponse::navigation(NavigationDecision::Blocked)
            }
        };
        self.observe(tree);
        response
    }

    /// Run timers that are due.
    pub fn tick(&mut self, tree: &mut DomTree, now: Instant) {
        for (timer, node) in self.timers.take_due(now) {
            match timer {
                RuntimeTimer::Hover => {
                    let busy = self.state.selected() == Some(node)
                        || self.editing.as_ref().is_some_and(|s| s.node == node);
                    if !busy && tree.is_attached(node) {
                        tree.set_attr(node, HOVER_ATTR, "");
                        self.hovered = Some(node);
                    }
                }
                RuntimeTimer::HideImageButton(button) => {
                    tree.remove_attr(button, VISIBLE_ATTR);
                }
                RuntimeTimer::LinkFeedback(link) => {
                    tree.remove_attr(link, FEEDBACK_ATTR);
                }
            }
        }
        self.observe(tree);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    fn on_click(&mut self, tree: &mut DomTree, target: NodeId, now: Instant) -> EventResponse {
        if let Some(button) = tree.closest(target, |el| {
            el.attr(ARTIFACT_ATTR) == Some(Artifact::ImageButton.as_str())
        }) {
            self.request_image_change(tree, button);
            return EventResponse::CONSUMED;
        }
        if is_artifact(tree, target) {
            return EventResponse::CONSUMED;
        }
        // Anchors and submit controls only play their feedback animation.
        if let Some(control) = tree.closest(target, |el| el.has_attr(DIMMED_ATTR)) {
            tree.set_attr(control, FEEDBACK_ATTR, "");
            self.timers.schedule(
                RuntimeTimer::LinkFeedback(control),
                now,
                self.feedback,
                control,
            );
            return EventResponse::CONSUMED;
        }
        if self.editing.as_ref().is_some_and(|s| tree.contains(s.node, target)) {
            return EventResponse {
                propagation_stopped: true,
                ..EventResponse::IGNORED
            };
        }

        let node = element_target(tree, target);
        if node == tree.root() {
            return EventResponse::IGNORED;
        }
        self.select(tree, node);
        EventResponse::CONSUMED
    }

    fn select(&mut self, tree: &mut DomTree, node: NodeId) {
        self.clear_selection(tree);
        tree.set_attr(node, SELECTED_ATTR, "");
        if tree.remove_attr(node, HOVER_ATTR).is_some() {
            self.hovered = None;
        }

        if let Some(rect) = self.layout.bounding_rect(tree, node) {
            let body = tree.body_or_root();
            for corner in HANDLES {
                let handle = Artifact::Handle.create(tree, "div");
                let (left, top) = handle_position(&rect, corner);
                tree.set_attr(handle, "class", format!("resize-handle resize-{corner}"));
                tree.set_attr(
                    handle,
                    "style",
                    format!("top: {top}px; left: {left}px; cursor: {corner}-resize;"),
                );
                tree.append_child(body, handle);
                self.handles.push(handle);
            }
        }
        self.state = RuntimeState::Selected(node);

        let style = StyleResolver::new(tree).computed(node);
        let target = target_info(tree, node);
        self.sender.send(SandboxMessage::ElementSelected {
            element: ElementInfo {
                node,
                tag_name: target.tag_name,
                class_name: target.class_name,
                id: target.id,
                styles: StyleSnapshot {
                    width: style.width.clone(),
                    height: style.height.clone(),
                    margin: style.margin.clone(),
                    padding: style.padding.clone(),
                    font_size: style.font_size.clone(),
                    font_family: style.font_family.clone(),
                    color: style.color.to_css(),
                    background_color: style.background_color.to_css(),
                    display: style.display.clone(),
                    position: style.position.clone(),
                },
            },
        });
    }

    /// Drop the current selection's outline and handles.
    pub fn clear_selection(&mut self, tree: &mut DomTree) {
        if let Some(previous) = self.state.selected() {
            tree.remove_attr(previous, SELECTED_ATTR);
        }
        for handle in self.handles.drain(..) {
            tree.detach(handle);
        }
        if matches!(self.state, RuntimeState::Selected(_)) {
            self.state = RuntimeState::Idle;
        }
    }

    fn request_image_change(&mut self, tree: &DomTree, button: NodeId) {
        let img = tree.parent(button).and_then(|wrapper| {
            tree.children(wrapper)
                .iter()
                .copied()
                .find(|c| tree.tag_name(*c) == Some("img"))
        });
        let Some(img) = img else {
            return;
        };
        let size = natural_size(tree, img);
        self.sender.send(SandboxMessage::ChangeImage {
            target: img,
            current_src: tree.attr(img, "src").unwrap_or_default().to_string(),
            width: size.width,
            height: size.height,
            aspect_ratio: size.aspect_ratio(),
        });
    }

    fn on_pointer_over(&mut self, tree: &mut DomTree, target: NodeId, now: Instant) -> EventResponse {
        if let Some(wrapper) = image_wrapper(tree, target) {
            if let Some(button) = wrapper_button(tree, wrapper) {
                self.timers.cancel(&RuntimeTimer::HideImageButton(button));
                tree.set_attr(button, VISIBLE_ATTR, "");
            }
        }
        if is_artifact(tree, target) {
            return EventResponse::IGNORED;
        }
        let node = element_target(tree, target);
        self.timers
            .schedule(RuntimeTimer::Hover, now, self.hover_delay, node);
        EventResponse::IGNORED
    }

    fn on_pointer_out(
        &mut self,
        tree: &mut DomTree,
        target: NodeId,
        related: Option<NodeId>,
        now: Instant,
    ) -> EventResponse {
        if let Some(wrapper) = image_wrapper(tree, target) {
            let still_inside = related.is_some_and(|r| tree.contains(wrapper, r));
            if !still_inside {
                if let Some(button) = wrapper_button(tree, wrapper) {
                    self.timers.schedule(
                        RuntimeTimer::HideImageButton(button),
                        now,
                        self.hide_delay,
                        button,
                    );
                }
            }
        }
        let node = element_target(tree, target);
        self.timers.cancel(&RuntimeTimer::Hover);
        if self.state.selected() != Some(node) {
            tree.remove_attr(node, HOVER_ATTR);
            if self.hovered == Some(node) {
                self.hovered = None;
            }
        }
        EventResponse::IGNORED
    }

    fn on_double_click(&mut self, tree: &mut DomTree, target: NodeId) -> EventResponse {
        if is_artifact(tree, target) {
            return EventResponse::CONSUMED;
        }
        let node = element_target(tree, target);
        let editable = tree
            .tag_name(node)
            .is_some_and(|tag| EDITABLE_TAGS.contains(&tag));
        if !editable {
            return EventResponse::CONSUMED;
        }
        if self.editing.as_ref().is_some_and(|s| s.node == node) {
            return EventResponse::CONSUMED;
        }
        if self.editing.is_some() {
            self.finish_editing(tree);
        }
        tree.set_attr(node, "contenteditable", "true");
        tree.set_attr(node, EDITING_ATTR, "");
        tree.remove_attr(node, HOVER_ATTR);
        self.editing = Some(EditSession {
            node,
            original: tree.text_content(node),
        });
        debug!(%node, "inline edit started");
        EventResponse::CONSUMED
    }

    fn on_key_down(&mut self, tree: &mut DomTree, target: NodeId, key: &Key, shift: bool) -> EventResponse {
        let Some(session) = &self.editing else {
            return EventResponse::IGNORED;
        };
        if !tree.contains(session.node, target) {
            return EventResponse::IGNORED;
        }
        match key {
            Key::Enter if !shift => {
                self.finish_editing(tree);
                EventResponse {
                    default_prevented: true,
                    ..EventResponse::IGNORED
                }
            }
            Key::Escape => {
                let (node, original) = (session.node, session.original.clone());
                if tree.text_content(node) != original {
                    tree.set_text_content(node, &original);
                }
                self.finish_editing(tree);
                EventResponse {
                    default_prevented: true,
                    ..EventResponse::IGNORED
                }
            }
            _ => EventResponse::IGNORED,
        }
    }

    /// End the inline edit, reporting the change if the text differs.
    pub fn finish_editing(&mut self, tree: &mut DomTree) {
        let Some(EditSession { node, original }) = self.editing.take() else {
            return;
        };
        tree.remove_attr(node, "contenteditable");
        tree.remove_attr(node, EDITING_ATTR);
        let current = tree.text_content(node);
        if current != original {
            debug!(%node, "inline edit committed");
            self.sender.send(SandboxMessage::ContentChanged {
                element: Some(TextEdit {
                    node,
                    tag_name: tree.tag_name(node).unwrap_or_default().to_ascii_uppercase(),
                    old_content: original,
                    new_content: current,
                }),
            });
        }
    }

    fn on_drag_start(&mut self, tree: &mut DomTree, target: NodeId) -> EventResponse {
        let Some(node) = tree.closest(target, |el| el.has_class(DRAGGABLE_CLASS)) else {
            return EventResponse::IGNORED;
        };
        let resume = self.state.selected();
        tree.set_attr(node, DRAGGING_ATTR, "");
        self.state = RuntimeState::Dragging { node, resume };
        EventResponse::IGNORED
    }

    fn end_drag(&mut self, tree: &mut DomTree) {
        if let RuntimeState::Dragging { node, resume } = self.state {
            tree.remove_attr(node, DRAGGING_ATTR);
            self.state = match resume {
                Some(sel) if tree.is_attached(sel) => RuntimeState::Selected(sel),
                _ => RuntimeState::Idle,
            };
        }
    }

    fn on_drop(&mut self, tree: &mut DomTree, target: NodeId) -> EventResponse {
        let RuntimeState::Dragging { node, .. } = self.state else {
            return EventResponse::IGNORED;
        };
        let zone = tree.closest(target, |el| el.has_class(DROPPABLE_CLASS));
        self.end_drag(tree);
        match zone {
            Some(zone) if !tree.contains(node, zone) => {
                if tree.append_child(zone, node) {
                    debug!(%node, %zone, "element dropped");
                    self.sender
                        .send(SandboxMessage::ContentChanged { element: None });
                }
            }
            Some(_) => debug!(%node, "ignored drop into own subtree"),
            None => {}
        }
        EventResponse {
            default_prevented: true,
            ..EventResponse::IGNORED
        }
    }
}

/// Dim anchors and submit controls and park anchor destinations.
/// Returns `(links, controls)` touched.
fn neutralize_navigation(tree: &mut DomTree) -> (usize, usize) {
    let mut links = 0;
    let mut controls = 0;
    for node in tree.elements() {
        if is_artifact(tree, node) {
            continue;
        }
        let Some(el) = tree.element(node) else {
            continue;
        };
        if el.is("a") {
            if let Some(href) = el.attr("href").map(str::to_string) {
                tree.set_attr(node, ORIGINAL_HREF_ATTR, href);
                tree.remove_attr(node, "href");
            }
            tree.set_attr(node, DIMMED_ATTR, "");
            links += 1;
            continue;
        }
        let is_submit = (el.is("button") || el.is("input"))
            && el
                .attr("type")
                .is_some_and(|t| t.eq_ignore_ascii_case("submit"));
        if is_submit {
            if !el.has_attr("disabled") {
                tree.set_attr(node, "disabled", "");
                tree.set_attr(node, DISABLED_ATTR, "");
            }
            tree.set_attr(node, DIMMED_ATTR, "");
            controls += 1;
        }
    }
    (links, controls)
}

/// Events on text nodes land on their parent element.
fn element_target(tree: &DomTree, target: NodeId) -> NodeId {
    if tree.is_element(target) {
        target
    } else {
        tree.parent_element(target).unwrap_or(target)
    }
}

fn target_info(tree: &DomTree, node: NodeId) -> TargetInfo {
    let el = tree.element(node);
    TargetInfo {
        node,
        tag_name: el
            .map(|el| el.name.to_ascii_uppercase())
            .unwrap_or_default(),
        class_name: el.map(|el| el.class_name().to_string()).unwrap_or_default(),
        id: el
            .and_then(|el| el.id())
            .map(str::to_string)
            .unwrap_or_default(),
    }
}

fn image_wrapper(tree: &DomTree, node: NodeId) -> Option<NodeId> {
    tree.closest(node, |el| {
        el.attr(ARTIFACT_ATTR) == Some(Artifact::ImageWrapper.as_str())
    })
}

fn wrapper_button(tree: &DomTree, wrapper: NodeId) -> Option<NodeId> {
    tree.children(wrapper)
        .iter()
        .copied()
        .find(|c| Artifact::of(tree, *c) == Some(Artifact::ImageButton))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageReceiver, channel};

    const PAGE: &str = r#"<!DOCTYPE html><html><head><style>h1 { color: red; }</style></head><body>
<h1 id="title" class="hero">Hello</h1>
<a href="https://example.com/x">Link</a>
<form><button type="submit">Send</button></form>
<div class="grid droppable"><div class="card draggable"><p>Card</p></div></div>
<div class="other droppable"></div>
<img src="a.png" width="40" height="20">
</body></html>"#;

    fn setup() -> (DomTree, InteractionRuntime, MessageReceiver) {
        let mut tree = DomTree::parse(PAGE);
        let (tx, rx) = channel();
        let mut runtime = InteractionRuntime::new(tx, &EditorConfig::default());
        runtime.install(&mut tree);
        (tree, runtime, rx)
    }

    fn find(tree: &DomTree, tag: &str) -> NodeId {
        tree.elements()
            .into_iter()
            .find(|n| tree.tag_name(*n) == Some(tag))
            .unwrap()
    }

    fn stripped(tree: &DomTree) -> String {
        let mut copy = tree.clone();
        strip_artifacts(&mut copy);
        copy.to_html()
    }

    #[test]
    fn test_install_is_idempotent_and_strippable() {
        let (mut tree, mut runtime, _rx) = setup();
        let once = tree.to_html();
        runtime.install(&mut tree);
        assert_eq!(tree.to_html(), once);
        assert_eq!(stripped(&tree), DomTree::parse(PAGE).to_html());
    }

    #[test]
    fn test_links_are_parked() {
        let (tree, _runtime, _rx) = setup();
        let link = find(&tree, "a");
        assert_eq!(tree.attr(link, "href"), None);
        assert_eq!(tree.attr(link, ORIGINAL_HREF_ATTR), Some("https://example.com/x"));
        assert!(tree.has_attr(find(&tree, "button"), "disabled"));
    }

    #[test]
    fn test_click_link_gives_feedback_only() {
        let (mut tree, mut runtime, mut rx) = setup();
        let link = find(&tree, "a");
        let now = Instant::now();
        let response = runtime.handle_event(&mut tree, &SandboxEvent::Click { target: link }, now);
        assert!(response.default_prevented);
        assert!(tree.has_attr(link, FEEDBACK_ATTR));
        assert!(rx.drain().is_empty());
        assert_eq!(runtime.state(), RuntimeState::Idle);

        runtime.tick(&mut tree, now + Duration::from_millis(300));
        assert!(!tree.has_attr(link, FEEDBACK_ATTR));
    }

    #[test]
    fn test_click_selects_and_reports() {
        let (mut tree, mut runtime, mut rx) = setup();
        let h1 = find(&tree, "h1");
        let text = tree.children(h1)[0];
        let response =
            runtime.handle_event(&mut tree, &SandboxEvent::Click { target: text }, Instant::now());
        assert!(response.propagation_stopped);
        assert_eq!(runtime.state(), RuntimeState::Selected(h1));

        let handles = tree
            .elements()
            .into_iter()
            .filter(|n| Artifact::of(&tree, *n) == Some(Artifact::Handle))
            .count();
        assert_eq!(handles, 4);

        let messages = rx.drain();
        let [SandboxMessage::ElementSelected { element }] = messages.as_slice() else {
            panic!("expected one selection message, got {messages:?}");
        };
        assert_eq!(element.tag_name, "H1");
        assert_eq!(element.id, "title");
        assert_eq!(element.styles.color, "rgb(255, 0, 0)");

        let p = find(&tree, "p");
        runtime.handle_event(&mut tree, &SandboxEvent::Click { target: p }, Instant::now());
        assert!(!tree.has_attr(h1, SELECTED_ATTR));
        assert_eq!(runtime.handles.len(), 4);
    }

    #[test]
    fn test_hover_waits_for_settle_delay() {
        let (mut tree, mut runtime, _rx) = setup();
        let h1 = find(&tree, "h1");
        let p = find(&tree, "p");
        let now = Instant::now();

        runtime.handle_event(&mut tree, &SandboxEvent::PointerOver { target: h1 }, now);
        runtime.tick(&mut tree, now + Duration::from_millis(20));
        assert!(!tree.has_attr(h1, HOVER_ATTR));
        runtime.tick(&mut tree, now + Duration::from_millis(50));
        assert!(tree.has_attr(h1, HOVER_ATTR));

        runtime.handle_event(
            &mut tree,
            &SandboxEvent::PointerOut { target: h1, related: Some(p) },
            now,
        );
        assert!(!tree.has_attr(h1, HOVER_ATTR));

        // Leaving before the delay cancels the outline.
        runtime.handle_event(&mut tree, &SandboxEvent::PointerOver { target: p }, now);
        runtime.handle_event(&mut tree, &SandboxEvent::PointerOut { target: p, related: None }, now);
        runtime.tick(&mut tree, now + Duration::from_secs(1));
        assert!(!tree.has_attr(p, HOVER_ATTR));
    }

    #[test]
    fn test_inline_edit_commit_and_revert() {
        let (mut tree, mut runtime, mut rx) = setup();
        let h1 = find(&tree, "h1");
        let now = Instant::now();

        runtime.handle_event(&mut tree, &SandboxEvent::DoubleClick { target: h1 }, now);
        assert_eq!(tree.attr(h1, "contenteditable"), Some("true"));
        runtime.handle_event(&mut tree, &SandboxEvent::Input { target: h1, text: "Bye".into() }, now);
        runtime.handle_event(
            &mut tree,
            &SandboxEvent::KeyDown { target: h1, key: Key::Enter, shift: false },
            now,
        );
        assert!(runtime.editing().is_none());
        assert!(!tree.has_attr(h1, "contenteditable"));
        let messages = rx.drain();
        let [SandboxMessage::ContentChanged { element: Some(edit) }] = messages.as_slice() else {
            panic!("expected a content change, got {messages:?}");
        };
        assert_eq!((edit.old_content.as_str(), edit.new_content.as_str()), ("Hello", "Bye"));

        runtime.handle_event(&mut tree, &SandboxEvent::DoubleClick { target: h1 }, now);
        runtime.handle_event(&mut tree, &SandboxEvent::Input { target: h1, text: "Oops".into() }, now);
        runtime.handle_event(
            &mut tree,
            &SandboxEvent::KeyDown { target: h1, key: Key::Escape, shift: false },
            now,
        );
        assert_eq!(tree.text_content(h1), "Bye");
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_double_click_outside_allow_list() {
        let (mut tree, mut runtime, _rx) = setup();
        let img = find(&tree, "img");
        runtime.handle_event(&mut tree, &SandboxEvent::DoubleClick { target: img }, Instant::now());
        assert!(runtime.editing().is_none());
    }

    #[test]
    fn test_drag_and_drop_reparents() {
        let (mut tree, mut runtime, mut rx) = setup();
        let p = find(&tree, "p");
        let card = tree.parent(p).unwrap();
        let other = tree.elements_with_class("other")[0];
        let now = Instant::now();

        runtime.handle_event(&mut tree, &SandboxEvent::DragStart { target: p }, now);
        assert!(matches!(runtime.state(), RuntimeState::Dragging { node, .. } if node == card));
        runtime.handle_event(&mut tree, &SandboxEvent::Drop { target: other }, now);
        assert_eq!(tree.parent(card), Some(other));
        assert_eq!(rx.drain(), vec![SandboxMessage::ContentChanged { element: None }]);
        assert!(!tree.has_attr(card, DRAGGING_ATTR));
    }

    #[test]
    fn test_drop_into_own_subtree_is_ignored() {
        let mut tree = DomTree::parse(
            r#"<body><div class="draggable droppable" id="outer"><div class="droppable" id="inner"></div></div></body>"#,
        );
        let (tx, mut rx) = channel();
        let mut runtime = InteractionRuntime::new(tx, &EditorConfig::default());
        runtime.install(&mut tree);
        let outer = tree.element_by_id("outer").unwrap();
        let inner = tree.element_by_id("inner").unwrap();
        let now = Instant::now();

        runtime.handle_event(&mut tree, &SandboxEvent::DragStart { target: outer }, now);
        runtime.handle_event(&mut tree, &SandboxEvent::Drop { target: inner }, now);
        assert_eq!(tree.parent(inner), Some(outer));
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_image_button_reports_its_own_image() {
        let (mut tree, mut runtime, mut rx) = setup();
        let img = find(&tree, "img");
        let wrapper = tree.parent(img).unwrap();
        assert_eq!(Artifact::of(&tree, wrapper), Some(Artifact::ImageWrapper));
        let button = wrapper_button(&tree, wrapper).unwrap();
        let now = Instant::now();

        runtime.handle_event(&mut tree, &SandboxEvent::PointerOver { target: img }, now);
        assert!(tree.has_attr(button, VISIBLE_ATTR));
        runtime.handle_event(&mut tree, &SandboxEvent::PointerOut { target: img, related: None }, now);
        runtime.tick(&mut tree, now + Duration::from_millis(100));
        assert!(!tree.has_attr(button, VISIBLE_ATTR));

        runtime.handle_event(&mut tree, &SandboxEvent::Click { target: button }, now);
        let messages = rx.drain();
        let [SandboxMessage::ChangeImage { target, width, height, aspect_ratio, .. }] =
            messages.as_slice()
        else {
            panic!("expected changeImage, got {messages:?}");
        };
        assert_eq!(*target, img);
        assert_eq!((*width, *height, *aspect_ratio), (40, 20, 2.0));
    }

    #[test]
    fn test_added_images_are_wrapped_once() {
        let (mut tree, mut runtime, _rx) = setup();
        let body = tree.body().unwrap();
        let img = tree.create_element("img");
        tree.append_child(body, img);
        runtime.observe(&mut tree);
        runtime.observe(&mut tree);
        let wrappers = tree
            .elements()
            .into_iter()
            .filter(|n| Artifact::of(&tree, *n) == Some(Artifact::ImageWrapper))
            .count();
        assert_eq!(wrappers, 2);
    }

    #[test]
    fn test_context_menu_is_intercepted() {
        let (mut tree, mut runtime, mut rx) = setup();
        let h1 = find(&tree, "h1");
        let response = runtime.handle_event(
            &mut tree,
            &SandboxEvent::ContextMenu { target: h1, x: 5.0, y: 6.0 },
            Instant::now(),
        );
        assert!(response.default_prevented);
        let messages = rx.drain();
        let [SandboxMessage::ContextMenu { target, x, .. }] = messages.as_slice() else {
            panic!("expected contextMenu, got {messages:?}");
        };
        assert_eq!((target.class_name.as_str(), *x), ("hero", 5.0));
    }
}
