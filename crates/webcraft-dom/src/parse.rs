//! HTML parsing on top of the html5ever tokenizer.
//!
//! The tokenizer handles the hard lexical parts (entities, attribute quoting,
//! raw-text bodies). Tree construction here is deliberately simpler than the
//! full HTML5 algorithm: no implied `<html>`/`<head>`/`<body>`, no foster
//! parenting. What is kept is the behaviour authors rely on when they write
//! pages by hand: void elements, implicitly closed `<p>`/`<li>`/table cells,
//! and self-closing tags inside SVG/MathML.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use smol_str::SmolStr;

use crate::tree::{Attribute, DomTree, ElementData, NodeData, NodeId};

/// Elements that never have children or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are emitted verbatim.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "iframe", "noembed", "noframes"];

const RCDATA_ELEMENTS: &[&str] = &["title", "textarea"];

/// Start tags that close an open `<p>`.
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset", "figure",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "menu", "nav",
    "ol", "p", "pre", "section", "table", "ul",
];

/// Elements that stop the search for an implicitly closed element.
const SCOPE_BOUNDARY: &[&str] = &[
    "html", "body", "table", "td", "th", "caption", "button", "object", "template", "svg", "math",
];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

pub fn is_raw_text(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&name)
}

struct TreeBuilder {
    tree: DomTree,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn new() -> Self {
        let tree = DomTree::new();
        let root = tree.root();
        Self {
            tree,
            open: vec![root],
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or_else(|| self.tree.root())
    }

    fn open_name(&self, idx: usize) -> Option<&str> {
        self.open
            .get(idx)
            .and_then(|id| self.tree.tag_name(*id))
    }

    fn in_foreign_content(&self) -> bool {
        self.open
            .iter()
            .any(|id| matches!(self.tree.tag_name(*id), Some("svg" | "math")))
    }

    /// Pop up to and including the nearest open element named in `targets`,
    /// unless an element from `boundary` is found first.
    fn close_nearest(&mut self, targets: &[&str], boundary: &[&str]) {
        for idx in (1..self.open.len()).rev() {
            let Some(name) = self.open_name(idx) else {
                continue;
            };
            if targets.contains(&name) {
                self.open.truncate(idx);
                return;
            }
            if boundary.contains(&name) || SCOPE_BOUNDARY.contains(&name) {
                return;
            }
        }
    }

    fn close_implied(&mut self, name: &str) {
        if CLOSES_PARAGRAPH.contains(&name) {
            self.close_nearest(&["p"], &[]);
        }
        match name {
            "li" => self.close_nearest(&["li"], &["ul", "ol"]),
            "dt" | "dd" => self.close_nearest(&["dt", "dd"], &["dl"]),
            "option" => {
                if self.open_name(self.open.len() - 1) == Some("option") {
                    self.open.pop();
                }
            }
            "tr" => self.close_nearest(&["tr"], &["tbody", "thead", "tfoot"]),
            "td" | "th" => {
                // Cells are themselves scope boundaries, so check the top directly.
                if matches!(self.open_name(self.open.len() - 1), Some("td" | "th")) {
                    self.open.pop();
                }
            }
            _ => {}
        }
    }

    /// `<html>`, `<head>` and `<body>` appear once; repeats merge attributes.
    fn merge_singleton(&mut self, name: &str, tag: &Tag) -> bool {
        if !matches!(name, "html" | "head" | "body") {
            return false;
        }
        let existing = self
            .tree
            .elements()
            .into_iter()
            .find(|id| self.tree.tag_name(*id) == Some(name));
        let Some(existing) = existing else {
            return false;
        };
        for attr in &tag.attrs {
            let attr_name = &*attr.name.local;
            if !self.tree.has_attr(existing, attr_name) {
                self.tree.set_attr(existing, attr_name, attr.value.to_string());
            }
        }
        true
    }

    fn start_tag(&mut self, tag: Tag) -> TokenSinkResult<()> {
        let name = SmolStr::new(&*tag.name);
        if self.merge_singleton(&name, &tag) {
            return TokenSinkResult::Continue;
        }
        self.close_implied(&name);

        let mut element = ElementData::new(&name);
        for attr in tag.attrs {
            let attr_name = SmolStr::new(&*attr.name.local);
            if element.has_attr(&attr_name) {
                continue;
            }
            element.attrs.push(Attribute {
                name: attr_name,
                value: attr.value.to_string(),
            });
        }
        let id = self.tree.create_node(NodeData::Element(element));
        let parent = self.current();
        self.tree.append_child(parent, id);

        let foreign = self.in_foreign_content() || matches!(name.as_str(), "svg" | "math");
        if is_void(&name) || (tag.self_closing && foreign) {
            return TokenSinkResult::Continue;
        }
        self.open.push(id);

        if name == "script" {
            TokenSinkResult::RawData(RawKind::ScriptData)
        } else if is_raw_text(&name) {
            TokenSinkResult::RawData(RawKind::Rawtext)
        } else if RCDATA_ELEMENTS.contains(&name.as_str()) {
            TokenSinkResult::RawData(RawKind::Rcdata)
        } else {
            TokenSinkResult::Continue
        }
    }

    fn end_tag(&mut self, name: &str) {
        if let Some(idx) = (1..self.open.len())
            .rev()
            .find(|idx| self.open_name(*idx) == Some(name))
        {
            self.open.truncate(idx);
        }
    }
}

impl TokenSink for TreeBuilder {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::DoctypeToken(doctype) => {
                let name = doctype
                    .name
                    .map(|n| SmolStr::new(&*n))
                    .unwrap_or_else(|| SmolStr::new_static("html"));
                let id = self.tree.create_node(NodeData::Doctype(name));
                let parent = self.current();
                self.tree.append_child(parent, id);
            }
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => return self.start_tag(tag),
                TagKind::EndTag => self.end_tag(&tag.name),
            },
            Token::CommentToken(text) => {
                let id = self.tree.create_comment(text.to_string());
                let parent = self.current();
                self.tree.append_child(parent, id);
            }
            Token::CharacterTokens(text) => {
                let parent = self.current();
                self.tree.append_text(parent, &text);
            }
            Token::NullCharacterToken | Token::EOFToken | Token::ParseError(_) => {}
        }
        TokenSinkResult::Continue
    }
}

impl DomTree {
    /// Parse a complete page. Never fails; malformed markup degrades the
    /// same way a forgiving browser would.
    pub fn parse(html: &str) -> DomTree {
        let mut queue = BufferQueue::default();
        queue.push_back(StrTendril::from_slice(html));

        let mut tokenizer = Tokenizer::new(TreeBuilder::new(), TokenizerOpts::default());
        let _ = tokenizer.feed(&mut queue);
        tokenizer.end();

        let mut tree = tokenizer.sink.tree;
        tree.reset_revision();
        tracing::trace!(nodes = tree.descendants(tree.root()).len(), "parsed document");
        tree
    }

    /// Parse a fragment; returns the tree plus its top-level nodes.
    pub fn parse_fragment(html: &str) -> (DomTree, Vec<NodeId>) {
        let tree = Self::parse(html);
        let top = tree.children(tree.root()).to_vec();
        (tree, top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tree: &DomTree, id: NodeId) -> Vec<String> {
        tree.children(id)
            .iter()
            .filter_map(|c| tree.tag_name(*c).map(str::to_string))
            .collect()
    }

    #[test]
    fn test_basic_structure() {
        let tree = DomTree::parse(
            "<!DOCTYPE html><html><head><title>T</title></head><body><p class=\"x\">Hi</p></body></html>",
        );
        assert!(matches!(
            tree.data(tree.children(tree.root())[0]),
            Some(NodeData::Doctype(name)) if name == "html"
        ));
        let body = tree.body().unwrap();
        let p = tree.first_element_child(body).unwrap();
        assert_eq!(tree.attr(p, "class"), Some("x"));
        assert_eq!(tree.text_content(p), "Hi");
        assert_eq!(tree.revision(), 0);
    }

    #[test]
    fn test_script_body_is_raw() {
        let tree = DomTree::parse("<body><script>if (a < b && c) { x = '<p>'; }</script></body>");
        let script = tree.elements().into_iter().find(|n| tree.tag_name(*n) == Some("script"));
        let script = script.unwrap();
        assert_eq!(tree.text_content(script), "if (a < b && c) { x = '<p>'; }");
        assert!(tree.element_descendants(script).is_empty());
    }

    #[test]
    fn test_void_elements_take_no_children() {
        let tree = DomTree::parse("<div><img src=a.png><span>x</span></div>");
        let div = tree.document_element().unwrap();
        assert_eq!(names(&tree, div), vec!["img", "span"]);
    }

    #[test]
    fn test_implied_list_item_close() {
        let tree = DomTree::parse("<ul><li>one<li>two</ul>");
        let ul = tree.document_element().unwrap();
        assert_eq!(names(&tree, ul), vec!["li", "li"]);
    }

    #[test]
    fn test_paragraph_closed_by_block() {
        let tree = DomTree::parse("<body><p>one<div>two</div></body>");
        let body = tree.body().unwrap();
        assert_eq!(names(&tree, body), vec!["p", "div"]);
    }

    #[test]
    fn test_svg_self_closing() {
        let tree = DomTree::parse("<svg><path d=\"M0\"/><circle r=\"1\"/></svg><p>after</p>");
        let svg = tree.document_element().unwrap();
        assert_eq!(names(&tree, svg), vec!["path", "circle"]);
        assert_eq!(names(&tree, tree.root()), vec!["svg", "p"]);
    }

    #[test]
    fn test_stray_end_tag_ignored() {
        let tree = DomTree::parse("<div>a</span>b</div>");
        let div = tree.document_element().unwrap();
        assert_eq!(tree.text_content(div), "ab");
    }

    #[test]
    fn test_entities_decoded() {
        let tree = DomTree::parse("<p>Fish &amp; chips</p>");
        let p = tree.document_element().unwrap();
        assert_eq!(tree.text_content(p), "Fish & chips");
    }
}
