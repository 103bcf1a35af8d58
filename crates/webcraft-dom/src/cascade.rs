//! A small, string-level style cascade.
//!
//! Good enough to answer "what colour does this element end up with" for
//! hand-written pages: type/class/id/universal compound selectors with
//! descendant and child combinators, specificity, `!important`, inline
//! styles, inheritance of text properties and colour shorthands. Anything
//! more exotic (pseudo-classes, attribute selectors, sibling combinators,
//! at-rules) is skipped rather than guessed at.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::color::{CssColor, Rgba, parse_color};
use crate::style::{Declaration, parse_declarations, split_top_level};
use crate::tree::{DomTree, NodeData, NodeId};

/// Colour-bearing properties the editor inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorProperty {
    Color,
    BackgroundColor,
    BorderColor,
    BorderTopColor,
    BorderRightColor,
    BorderBottomColor,
    BorderLeftColor,
}

impl ColorProperty {
    /// Every property a palette scan reads, in reporting order.
    pub const SCANNED: [ColorProperty; 7] = [
        ColorProperty::Color,
        ColorProperty::BackgroundColor,
        ColorProperty::BorderColor,
        ColorProperty::BorderTopColor,
        ColorProperty::BorderRightColor,
        ColorProperty::BorderBottomColor,
        ColorProperty::BorderLeftColor,
    ];

    /// Properties a bulk colour replacement rewrites.
    pub const REPLACEABLE: [ColorProperty; 3] = [
        ColorProperty::Color,
        ColorProperty::BackgroundColor,
        ColorProperty::BorderColor,
    ];

    /// Script-style name, e.g. `backgroundColor`.
    pub fn camel_name(self) -> &'static str {
        match self {
            ColorProperty::Color => "color",
            ColorProperty::BackgroundColor => "backgroundColor",
            ColorProperty::BorderColor => "borderColor",
            ColorProperty::BorderTopColor => "borderTopColor",
            ColorProperty::BorderRightColor => "borderRightColor",
            ColorProperty::BorderBottomColor => "borderBottomColor",
            ColorProperty::BorderLeftColor => "borderLeftColor",
        }
    }

    /// Stylesheet name, e.g. `background-color`.
    pub fn css_name(self) -> &'static str {
        match self {
            ColorProperty::Color => "color",
            ColorProperty::BackgroundColor => "background-color",
            ColorProperty::BorderColor => "border-color",
            ColorProperty::BorderTopColor => "border-top-color",
            ColorProperty::BorderRightColor => "border-right-color",
            ColorProperty::BorderBottomColor => "border-bottom-color",
            ColorProperty::BorderLeftColor => "border-left-color",
        }
    }
}

impl std::fmt::Display for ColorProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.camel_name())
    }
}

/// Resolved style of one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub width: String,
    pub height: String,
    pub margin: String,
    pub padding: String,
    pub font_size: String,
    pub font_family: String,
    pub color: Rgba,
    pub background_color: Rgba,
    pub border_top_color: Rgba,
    pub border_right_color: Rgba,
    pub border_bottom_color: Rgba,
    pub border_left_color: Rgba,
    pub display: String,
    pub position: String,
    pub top: String,
    pub left: String,
}

impl ComputedStyle {
    /// The initial values for an element with no styling at all.
    fn initial(tag: &str) -> Self {
        Self {
            width: "auto".into(),
            height: "auto".into(),
            margin: "0px".into(),
            padding: "0px".into(),
            font_size: "16px".into(),
            font_family: "\"Times New Roman\"".into(),
            color: Rgba::BLACK,
            background_color: Rgba::TRANSPARENT,
            border_top_color: Rgba::BLACK,
            border_right_color: Rgba::BLACK,
            border_bottom_color: Rgba::BLACK,
            border_left_color: Rgba::BLACK,
            display: default_display(tag).into(),
            position: "static".into(),
            top: "auto".into(),
            left: "auto".into(),
        }
    }

    /// Shorthand border colour the way computed style reports it: one value
    /// when all sides agree, otherwise the four sides.
    pub fn border_color(&self) -> String {
        let sides = [
            self.border_top_color,
            self.border_right_color,
            self.border_bottom_color,
            self.border_left_color,
        ];
        if sides.iter().all(|s| *s == sides[0]) {
            sides[0].to_css()
        } else {
            sides
                .iter()
                .map(Rgba::to_css)
                .collect::<Vec<_>>()
                .join(" ")
        }
    }

    pub fn color_value(&self, prop: ColorProperty) -> String {
        match prop {
            ColorProperty::Color => self.color.to_css(),
            ColorProperty::BackgroundColor => self.background_color.to_css(),
            ColorProperty::BorderColor => self.border_color(),
            ColorProperty::BorderTopColor => self.border_top_color.to_css(),
            ColorProperty::BorderRightColor => self.border_right_color.to_css(),
            ColorProperty::BorderBottomColor => self.border_bottom_color.to_css(),
            ColorProperty::BorderLeftColor => self.border_left_color.to_css(),
        }
    }
}

fn default_display(tag: &str) -> &'static str {
    match tag {
        "head" | "script" | "style" | "title" | "meta" | "link" | "template" | "noscript" => {
            "none"
        }
        "li" => "list-item",
        "table" => "table",
        "tr" => "table-row",
        "td" | "th" => "table-cell",
        "thead" => "table-header-group",
        "tbody" => "table-row-group",
        "tfoot" => "table-footer-group",
        "img" | "button" | "input" | "select" | "textarea" => "inline-block",
        "html" | "body" | "div" | "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "ul" | "ol"
        | "section" | "article" | "header" | "footer" | "nav" | "main" | "aside" | "form"
        | "figure" | "blockquote" | "pre" | "hr" | "address" | "dl" | "dd" | "dt"
        | "fieldset" | "details" | "summary" | "figcaption" => "block",
        _ => "inline",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(text: &str) -> Option<Self> {
        let mut compound = Compound::default();
        let mut kind = '\0';
        let mut current = String::new();
        let flush = |kind: char, current: &mut String, compound: &mut Compound| {
            let part = std::mem::take(current);
            match kind {
                '\0' if part == "*" || part.is_empty() => {}
                '\0' => compound.tag = Some(part.to_ascii_lowercase()),
                '.' if !part.is_empty() => compound.classes.push(part),
                '#' if !part.is_empty() => compound.id = Some(part),
                _ => return false,
            }
            true
        };
        for c in text.chars() {
            match c {
                '.' | '#' => {
                    if !flush(kind, &mut current, &mut compound) {
                        return None;
                    }
                    kind = c;
                }
                c if c.is_alphanumeric() || c == '-' || c == '_' || c == '*' => current.push(c),
                _ => return None,
            }
        }
        if !flush(kind, &mut current, &mut compound) {
            return None;
        }
        Some(compound)
    }

    fn matches(&self, tree: &DomTree, id: NodeId) -> bool {
        let Some(el) = tree.element(id) else {
            return false;
        };
        if self.tag.as_deref().is_some_and(|tag| !el.is(tag)) {
            return false;
        }
        if self.id.as_deref().is_some_and(|want| el.id() != Some(want)) {
            return false;
        }
        self.classes.iter().all(|c| el.has_class(c))
    }
}

/// `(ids, classes, types)`
type Specificity = (u32, u32, u32);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Selector {
    parts: Vec<Compound>,
    /// `combinators[i]` joins `parts[i]` and `parts[i + 1]`.
    combinators: Vec<Combinator>,
}

impl Selector {
    fn parse(text: &str) -> Option<Self> {
        if text.contains([':', '[', '+', '~', '|']) {
            return None;
        }
        let spaced = text.replace('>', " > ");
        let mut parts = Vec::new();
        let mut combinators = Vec::new();
        let mut pending = Combinator::Descendant;
        for token in spaced.split_whitespace() {
            if token == ">" {
                if parts.is_empty() {
                    return None;
                }
                pending = Combinator::Child;
                continue;
            }
            if !parts.is_empty() {
                combinators.push(pending);
            }
            parts.push(Compound::parse(token)?);
            pending = Combinator::Descendant;
        }
        if parts.is_empty() || combinators.len() + 1 != parts.len() {
            return None;
        }
        Some(Self { parts, combinators })
    }

    fn specificity(&self) -> Specificity {
        self.parts.iter().fold((0, 0, 0), |(a, b, c), part| {
            (
                a + u32::from(part.id.is_some()),
                b + part.classes.len() as u32,
                c + u32::from(part.tag.is_some()),
            )
        })
    }

    fn matches(&self, tree: &DomTree, id: NodeId) -> bool {
        self.matches_at(tree, id, self.parts.len() - 1)
    }

    fn matches_at(&self, tree: &DomTree, id: NodeId, idx: usize) -> bool {
        if !self.parts[idx].matches(tree, id) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match self.combinators[idx - 1] {
            Combinator::Child => tree
                .parent_element(id)
                .is_some_and(|p| self.matches_at(tree, p, idx - 1)),
            Combinator::Descendant => {
                let mut ancestor = tree.parent_element(id);
                while let Some(a) = ancestor {
                    if self.matches_at(tree, a, idx - 1) {
                        return true;
                    }
                    ancestor = tree.parent_element(a);
                }
                false
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    selectors: Vec<(Selector, Specificity)>,
    declarations: Vec<Declaration>,
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Byte offset just past the brace matching the `{` at `open`.
fn matching_brace(text: &str, open: usize) -> usize {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return open + i + 1;
                }
            }
            _ => {}
        }
    }
    text.len()
}

fn parse_stylesheet(css: &str, rules: &mut Vec<Rule>) {
    let css = strip_comments(css);
    let mut pos = 0;
    while pos < css.len() {
        let rest = &css[pos..];
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            break;
        }
        pos += rest.len() - trimmed.len();

        if trimmed.starts_with('@') {
            // At-rules are skipped whole, block or statement.
            let semi = trimmed.find(';');
            let brace = trimmed.find('{');
            pos = match (semi, brace) {
                (Some(s), Some(b)) if s < b => pos + s + 1,
                (_, Some(b)) => matching_brace(&css, pos + b),
                (Some(s), None) => pos + s + 1,
                (None, None) => css.len(),
            };
            continue;
        }

        let Some(open) = trimmed.find('{') else {
            break;
        };
        let close = trimmed[open..]
            .find('}')
            .map(|c| open + c)
            .unwrap_or(trimmed.len());
        let prelude = &trimmed[..open];
        let body = &trimmed[(open + 1).min(close)..close];
        pos += (close + 1).min(trimmed.len());

        let selectors: Vec<_> = split_top_level(prelude, ',')
            .into_iter()
            .filter_map(|s| Selector::parse(s.trim()))
            .map(|s| {
                let spec = s.specificity();
                (s, spec)
            })
            .collect();
        if selectors.is_empty() {
            continue;
        }
        rules.push(Rule {
            selectors,
            declarations: parse_declarations(body),
        });
    }
}

/// Split a shorthand value into top-level tokens.
fn value_tokens(value: &str) -> Vec<&str> {
    split_top_level(value, ' ')
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

fn first_color_token(value: &str) -> Option<String> {
    value_tokens(value)
        .into_iter()
        .find(|t| parse_color(t).is_some())
        .map(str::to_string)
}

const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];

/// Apply one declaration to the declared-value map, expanding the colour
/// shorthands into their longhands.
fn apply_declaration(declared: &mut HashMap<String, String>, decl: &Declaration) {
    let value = decl.value.clone();
    match decl.name.as_str() {
        "background" => {
            let color = first_color_token(&value).unwrap_or_else(|| "transparent".into());
            declared.insert("background-color".into(), color);
        }
        "border" => {
            let color = first_color_token(&value).unwrap_or_else(|| "currentcolor".into());
            for side in SIDES {
                declared.insert(format!("border-{side}-color"), color.clone());
            }
        }
        "border-top" | "border-right" | "border-bottom" | "border-left" => {
            let color = first_color_token(&value).unwrap_or_else(|| "currentcolor".into());
            declared.insert(format!("{}-color", decl.name), color);
        }
        "border-color" => {
            let tokens = value_tokens(&value);
            let pick = |idx: [usize; 4]| -> Option<[String; 4]> {
                Some(idx.map(|i| tokens.get(i).map(|t| t.to_string()).unwrap_or_default()))
            };
            let expanded = match tokens.len() {
                1 => pick([0, 0, 0, 0]),
                2 => pick([0, 1, 0, 1]),
                3 => pick([0, 1, 2, 1]),
                4 => pick([0, 1, 2, 3]),
                _ => None,
            };
            if let Some(values) = expanded {
                for (side, v) in SIDES.iter().zip(values) {
                    declared.insert(format!("border-{side}-color"), v);
                }
            }
        }
        name => {
            declared.insert(name.to_string(), value);
        }
    }
}

/// Resolves computed styles for elements of one tree.
///
/// Results are memoised; create a new resolver after mutating the tree.
pub struct StyleResolver<'a> {
    tree: &'a DomTree,
    rules: Vec<Rule>,
    cache: RefCell<HashMap<NodeId, ComputedStyle>>,
}

impl<'a> StyleResolver<'a> {
    pub fn new(tree: &'a DomTree) -> Self {
        let mut rules = Vec::new();
        for id in tree.elements() {
            if tree.tag_name(id) == Some("style") {
                parse_stylesheet(&tree.text_content(id), &mut rules);
            }
        }
        tracing::trace!(rules = rules.len(), "collected stylesheet rules");
        Self {
            tree,
            rules,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn tree(&self) -> &'a DomTree {
        self.tree
    }

    /// Cascaded declared values for one element, shorthands expanded.
    fn declared(&self, id: NodeId) -> HashMap<String, String> {
        // (important, inline, specificity, order)
        let mut matched: Vec<((bool, bool, Specificity, usize), &Declaration)> = Vec::new();
        let mut order = 0usize;
        for rule in &self.rules {
            let best = rule
                .selectors
                .iter()
                .filter(|(sel, _)| sel.matches(self.tree, id))
                .map(|(_, spec)| *spec)
                .max();
            if let Some(spec) = best {
                for decl in &rule.declarations {
                    matched.push(((decl.important, false, spec, order), decl));
                    order += 1;
                }
            }
        }
        let inline = self.tree.inline_declarations(id);
        for decl in &inline {
            matched.push(((decl.important, true, (0, 0, 0), order), decl));
            order += 1;
        }
        matched.sort_by(|a, b| a.0.cmp(&b.0));

        let mut declared = HashMap::new();
        for (_, decl) in matched {
            apply_declaration(&mut declared, decl);
        }
        declared
    }

    /// Computed style of `id`. Non-elements get the initial style.
    pub fn computed(&self, id: NodeId) -> ComputedStyle {
        if let Some(cached) = self.cache.borrow().get(&id) {
            return cached.clone();
        }
        let style = self.compute(id);
        self.cache.borrow_mut().insert(id, style.clone());
        style
    }

    fn compute(&self, id: NodeId) -> ComputedStyle {
        let tag = match self.tree.data(id) {
            Some(NodeData::Element(el)) => el.name.to_string(),
            _ => return ComputedStyle::initial(""),
        };
        let parent = self.tree.parent_element(id).map(|p| self.computed(p));
        let mut style = ComputedStyle::initial(&tag);
        let declared = self.declared(id);
        let get = |name: &str| declared.get(name).map(|v| v.trim().to_string());

        // Inherited properties first; everything else may reference `color`.
        let inherited_color = parent.as_ref().map(|p| p.color).unwrap_or(Rgba::BLACK);
        style.color = match get("color").as_deref().map(parse_color) {
            Some(Some(CssColor::Rgba(c))) => c,
            _ => inherited_color,
        };
        if let Some(p) = &parent {
            style.font_size = p.font_size.clone();
            style.font_family = p.font_family.clone();
        }
        if let Some(v) = get("font-size").filter(|v| v != "inherit") {
            style.font_size = v;
        }
        if let Some(v) = get("font-family").filter(|v| v != "inherit") {
            style.font_family = v;
        }

        let resolve = |name: &str, initial: Rgba, inherited: Option<Rgba>| -> Rgba {
            match get(name).as_deref() {
                Some("inherit") => inherited.unwrap_or(initial),
                Some(v) => parse_color(v)
                    .map(|c| c.resolve(style.color))
                    .unwrap_or(initial),
                None => initial,
            }
        };
        style.background_color = resolve(
            "background-color",
            Rgba::TRANSPARENT,
            parent.as_ref().map(|p| p.background_color),
        );
        style.border_top_color = resolve(
            "border-top-color",
            style.color,
            parent.as_ref().map(|p| p.border_top_color),
        );
        style.border_right_color = resolve(
            "border-right-color",
            style.color,
            parent.as_ref().map(|p| p.border_right_color),
        );
        style.border_bottom_color = resolve(
            "border-bottom-color",
            style.color,
            parent.as_ref().map(|p| p.border_bottom_color),
        );
        style.border_left_color = resolve(
            "border-left-color",
            style.color,
            parent.as_ref().map(|p| p.border_left_color),
        );

        for (name, slot) in [
            ("width", &mut style.width),
            ("height", &mut style.height),
            ("margin", &mut style.margin),
            ("padding", &mut style.padding),
            ("display", &mut style.display),
            ("position", &mut style.position),
            ("top", &mut style.top),
            ("left", &mut style.left),
        ] {
            if let Some(v) = get(name).filter(|v| !v.is_empty()) {
                *slot = v;
            }
        }
        style
    }
}
