//! Arena-backed document tree.
//!
//! Nodes live in a single `Vec` and are addressed by [`NodeId`]. Detached
//! nodes stay in the arena (ids are never reused), so a stale id is always
//! safe to query: it simply reports as detached.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Index of a node inside a [`DomTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single `name="value"` pair on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: SmolStr,
    pub value: String,
}

/// Element name plus attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Lowercase local name.
    pub name: SmolStr,
    pub attrs: Vec<Attribute>,
}

impl ElementData {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: SmolStr::new(name.as_ref().to_ascii_lowercase()),
            attrs: Vec::new(),
        }
    }

    /// Check the element name, ignoring ASCII case.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attrs
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.value = value,
            None => self.attrs.push(Attribute {
                name: SmolStr::new(name.to_ascii_lowercase()),
                value,
            }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self
            .attrs
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(pos).value)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|id| !id.is_empty())
    }

    /// Whitespace-separated entries of the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// The raw `class` attribute, as a DOM `className` would report it.
    pub fn class_name(&self) -> &str {
        self.attr("class").unwrap_or_default()
    }
}

/// Payload of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Doctype(SmolStr),
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// A mutable HTML document tree.
///
/// Every structural or attribute mutation bumps [`DomTree::revision`], which
/// observers compare against a remembered value to detect changes.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
    revision: u64,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    /// Create a tree holding only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
            revision: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Mutation counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn reset_revision(&mut self) {
        self.revision = 0;
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub(crate) fn create_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.create_node(NodeData::Element(ElementData::new(name)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.create_node(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.create_node(NodeData::Comment(text.into()))
    }

    // === Reading ===

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.node(id).map(|n| &n.data)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.data(id)? {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or_default()
    }

    /// Parent, but only when it is an element.
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    /// Whether `id` is reachable from the document node.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root() {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Whether `node` is `ancestor` or lies somewhere beneath it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// All nodes below `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Element descendants of `id` in document order.
    pub fn element_descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.is_element(*n))
            .collect()
    }

    /// Every attached element in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        self.element_descendants(self.root())
    }

    /// Nearest inclusive ancestor element satisfying `pred`.
    pub fn closest(&self, id: NodeId, pred: impl Fn(&ElementData) -> bool) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(n) = current {
            if let Some(el) = self.element(n) {
                if pred(el) {
                    return Some(n);
                }
            }
            current = self.parent(n);
        }
        None
    }

    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).iter().copied().find(|c| self.is_element(*c))
    }

    /// The `<html>` element, or whatever element sits at the top.
    pub fn document_element(&self) -> Option<NodeId> {
        self.first_element_child(self.root())
    }

    fn first_named(&self, name: &str) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|n| self.element(*n).is_some_and(|el| el.is(name)))
    }

    pub fn head(&self) -> Option<NodeId> {
        self.first_named("head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.first_named("body")
    }

    /// Where page-level overlays go: the body, else the top element, else the document.
    pub fn body_or_root(&self) -> NodeId {
        self.body()
            .or_else(|| self.document_element())
            .unwrap_or_else(|| self.root())
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|n| self.element(*n).and_then(|el| el.id()) == Some(id))
    }

    /// All elements carrying `class`.
    pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|n| self.has_class(*n, class))
            .collect()
    }

    /// Concatenated text of every text node under `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        match self.data(id) {
            Some(NodeData::Text(text)) => return text.clone(),
            Some(NodeData::Comment(_)) | None => return String::new(),
            _ => {}
        }
        let mut out = String::new();
        for n in self.descendants(id) {
            if let Some(NodeData::Text(text)) = self.data(n) {
                out.push_str(text);
            }
        }
        out
    }

    // === Attributes ===

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    /// Set an attribute. Returns false when `id` is not an element.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) -> bool {
        let Some(el) = self.element_mut(id) else {
            return false;
        };
        el.set_attr(name, value);
        self.touch();
        true
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        let removed = self.element_mut(id)?.remove_attr(name);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_class(class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> bool {
        let Some(el) = self.element(id) else {
            return false;
        };
        if el.has_class(class) {
            return true;
        }
        let joined = match el.attr("class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", joined)
    }

    /// Remove a class; drops the `class` attribute once it is empty.
    pub fn remove_class(&mut self, id: NodeId, class: &str) -> bool {
        let Some(el) = self.element(id) else {
            return false;
        };
        if !el.has_class(class) {
            return false;
        }
        let remaining = el
            .classes()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        if remaining.is_empty() {
            self.remove_attr(id, "class");
        } else {
            self.set_attr(id, "class", remaining);
        }
        true
    }

    // === Structure ===

    /// Unlink `id` from its parent. The node and its subtree stay valid.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(n) = self.node_mut(id) {
            n.parent = None;
        }
        self.touch();
    }

    fn can_adopt(&self, parent: NodeId, child: NodeId) -> bool {
        child != self.root()
            && self.node(parent).is_some()
            && self.node(child).is_some()
            && !self.contains(child, parent)
    }

    /// Move `child` to the end of `parent`'s children.
    ///
    /// Returns false (and leaves the tree untouched) when the move would
    /// create a cycle or either id is unknown.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.can_adopt(parent, child) {
            return false;
        }
        self.detach(child);
        if let Some(p) = self.node_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
        self.touch();
        true
    }

    /// Insert `child` into `parent` right before `reference`.
    ///
    /// Falls back to appending when `reference` is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> bool {
        if !self.can_adopt(parent, child) || child == reference {
            return false;
        }
        self.detach(child);
        let Some(p) = self.node_mut(parent) else {
            return false;
        };
        match p.children.iter().position(|c| *c == reference) {
            Some(pos) => p.children.insert(pos, child),
            None => p.children.push(child),
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
        self.touch();
        true
    }

    /// Insert `new` as the next sibling of `anchor`.
    pub fn insert_after(&mut self, anchor: NodeId, new: NodeId) -> bool {
        let Some(parent) = self.parent(anchor) else {
            return false;
        };
        let next = self
            .children(parent)
            .iter()
            .position(|c| *c == anchor)
            .and_then(|pos| self.children(parent).get(pos + 1).copied());
        match next {
            Some(next) => self.insert_before(parent, new, next),
            None => self.append_child(parent, new),
        }
    }

    /// Replace `id` with its own children.
    pub fn unwrap_node(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        let children = self.children(id).to_vec();
        for child in children {
            self.insert_before(parent, child, id);
        }
        self.detach(id);
        true
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if let Some(NodeData::Text(existing)) = self.node_mut(id).map(|n| &mut n.data) {
            *existing = text.to_string();
            self.touch();
            return;
        }
        for child in self.children(id).to_vec() {
            self.detach(child);
        }
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.append_child(id, text_node);
        }
        self.touch();
    }

    /// Append text to `parent`, merging with a trailing text node.
    pub(crate) fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.children(parent).last() {
            if let Some(NodeData::Text(existing)) = self.node_mut(last).map(|n| &mut n.data) {
                existing.push_str(text);
                self.touch();
                return;
            }
        }
        let node = self.create_text(text);
        self.append_child(parent, node);
    }

    /// Copy `id` and its subtree. The copy is detached.
    pub fn deep_clone(&mut self, id: NodeId) -> Option<NodeId> {
        let source = self.clone();
        self.import_subtree(&source, id)
    }

    /// Copy a subtree out of another tree. The copy is detached.
    pub fn import_subtree(&mut self, other: &DomTree, id: NodeId) -> Option<NodeId> {
        let data = match other.data(id)? {
            NodeData::Document => return None,
            data => data.clone(),
        };
        let copy = self.create_node(data);
        for &child in other.children(id) {
            if let Some(child_copy) = self.import_subtree(other, child) {
                self.append_child(copy, child_copy);
            }
        }
        Some(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DomTree, NodeId, NodeId, NodeId) {
        let mut tree = DomTree::new();
        let html = tree.create_element("html");
        let body = tree.create_element("body");
        let div = tree.create_element("div");
        let root = tree.root();
        tree.append_child(root, html);
        tree.append_child(html, body);
        tree.append_child(body, div);
        (tree, html, body, div)
    }

    #[test]
    fn test_append_moves_node() {
        let (mut tree, html, body, div) = sample();
        assert_eq!(tree.parent(div), Some(body));
        assert!(tree.append_child(html, div));
        assert_eq!(tree.parent(div), Some(html));
        assert!(tree.children(body).is_empty());
    }

    #[test]
    fn test_append_rejects_cycles() {
        let (mut tree, html, _body, div) = sample();
        let before = tree.revision();
        assert!(!tree.append_child(div, html));
        assert!(!tree.append_child(div, div));
        assert_eq!(tree.revision(), before);
    }

    #[test]
    fn test_classes() {
        let (mut tree, _, _, div) = sample();
        tree.add_class(div, "card");
        tree.add_class(div, "draggable");
        tree.add_class(div, "card");
        assert_eq!(tree.attr(div, "class"), Some("card draggable"));
        tree.remove_class(div, "card");
        tree.remove_class(div, "draggable");
        assert!(!tree.has_attr(div, "class"));
    }

    #[test]
    fn test_unwrap_keeps_order() {
        let (mut tree, _, body, div) = sample();
        let a = tree.create_element("span");
        let b = tree.create_element("em");
        tree.append_child(div, a);
        tree.append_child(div, b);
        let tail = tree.create_element("p");
        tree.append_child(body, tail);

        assert!(tree.unwrap_node(div));
        assert_eq!(tree.children(body), &[a, b, tail]);
        assert!(!tree.is_attached(div));
    }

    #[test]
    fn test_insert_after_last_child_appends() {
        let (mut tree, _, body, div) = sample();
        let p = tree.create_element("p");
        assert!(tree.insert_after(div, p));
        assert_eq!(tree.children(body), &[div, p]);
    }

    #[test]
    fn test_deep_clone_is_detached_copy() {
        let (mut tree, _, _, div) = sample();
        tree.set_attr(div, "id", "hero");
        tree.set_text_content(div, "hello");
        let copy = tree.deep_clone(div).unwrap();
        assert_ne!(copy, div);
        assert!(!tree.is_attached(copy));
        assert_eq!(tree.text_content(copy), "hello");
        assert_eq!(tree.attr(copy, "id"), Some("hero"));
    }

    #[test]
    fn test_stale_ids_are_harmless() {
        let (mut tree, _, _, div) = sample();
        tree.detach(div);
        assert!(!tree.is_attached(div));
        assert_eq!(tree.text_content(NodeId(9999)), "");
        assert!(tree.element(NodeId(9999)).is_none());
    }
}
