//! Inline `style` attribute helpers.

use crate::tree::{DomTree, NodeId};

/// One `name: value` pair from a declaration block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lowercase property name.
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// Split `text` on `sep`, ignoring separators inside parentheses or quotes.
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Parse a declaration block such as the body of a `style` attribute.
///
/// Malformed entries (no colon, empty name) are dropped.
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    split_top_level(block, ';')
        .into_iter()
        .filter_map(|entry| {
            let (name, value) = entry.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            let mut value = value.trim();
            let mut important = false;
            if let Some(idx) = value.to_ascii_lowercase().rfind("!important") {
                important = true;
                value = value[..idx].trim_end();
            }
            Some(Declaration {
                name,
                value: value.to_string(),
                important,
            })
        })
        .collect()
}

pub fn serialize_declarations(decls: &[Declaration]) -> String {
    decls
        .iter()
        .map(|d| {
            if d.important {
                format!("{}: {} !important;", d.name, d.value)
            } else {
                format!("{}: {};", d.name, d.value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Convert `backgroundColor` style names to `background-color`.
pub fn css_property_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

impl DomTree {
    /// Inline declarations of an element, in source order.
    pub fn inline_declarations(&self, id: NodeId) -> Vec<Declaration> {
        self.attr(id, "style")
            .map(parse_declarations)
            .unwrap_or_default()
    }

    /// Value of an inline style property. Accepts either spelling of the name.
    pub fn style_property(&self, id: NodeId, name: &str) -> Option<String> {
        let name = css_property_name(name);
        self.inline_declarations(id)
            .into_iter()
            .rev()
            .find(|d| d.name == name)
            .map(|d| d.value)
    }

    /// Set an inline style property, replacing earlier occurrences.
    pub fn set_style_property(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        if !self.is_element(id) {
            return false;
        }
        let name = css_property_name(name);
        let mut decls = self.inline_declarations(id);
        decls.retain(|d| d.name != name);
        decls.push(Declaration {
            name,
            value: value.trim().to_string(),
            important: false,
        });
        self.set_attr(id, "style", serialize_declarations(&decls))
    }

    /// Remove an inline style property; the attribute goes away once empty.
    pub fn remove_style_property(&mut self, id: NodeId, name: &str) -> Option<String> {
        let name = css_property_name(name);
        let mut decls = self.inline_declarations(id);
        let pos = decls.iter().rposition(|d| d.name == name)?;
        let removed = decls.remove(pos).value;
        decls.retain(|d| d.name != name);
        if decls.is_empty() {
            self.remove_attr(id, "style");
        } else {
            self.set_attr(id, "style", serialize_declarations(&decls));
        }
        Some(removed)
    }
}
