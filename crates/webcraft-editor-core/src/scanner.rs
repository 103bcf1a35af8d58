//! Colour usage across the rendered tree.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};
use webcraft_dom::{ColorProperty, DomTree, NodeId, StyleResolver, normalize_color};

use crate::runtime::is_artifact;

/// Elements whose styles never reach the screen.
const NON_RENDERED: &[&str] = &[
    "head", "script", "style", "meta", "title", "link", "template", "noscript", "base",
];

/// One place a colour is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSite {
    pub node: NodeId,
    pub tag_name: String,
    pub property: ColorProperty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorUsage {
    /// Normalized `rgb(...)`/`rgba(...)` value.
    pub color: String,
    pub count: usize,
    pub usages: Vec<UsageSite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub processed: usize,
    pub total: usize,
    pub percent: u8,
}

impl ScanProgress {
    fn new(processed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            (processed * 100 / total) as u8
        };
        Self {
            processed,
            total,
            percent,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColorScanner {
    progress_interval: usize,
}

impl Default for ColorScanner {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ColorScanner {
    pub fn new(progress_interval: usize) -> Self {
        Self {
            progress_interval: progress_interval.max(1),
        }
    }

    /// Page elements that take part in scanning and replacement.
    fn candidates(tree: &DomTree) -> Vec<NodeId> {
        tree.elements()
            .into_iter()
            .filter(|n| !is_artifact(tree, *n))
            .filter(|n| {
                tree.closest(*n, |el| NON_RENDERED.iter().any(|tag| el.is(tag)))
                    .is_none()
            })
            .collect()
    }

    /// Aggregate colour usage, most used first. Equal counts keep the order
    /// in which the colours were first seen.
    pub fn scan(
        &self,
        tree: &DomTree,
        mut on_progress: impl FnMut(ScanProgress),
    ) -> Vec<ColorUsage> {
        let elements = Self::candidates(tree);
        let total = elements.len();
        let resolver = StyleResolver::new(tree);
        let mut palette: IndexMap<String, ColorUsage> = IndexMap::new();

        for (i, &node) in elements.iter().enumerate() {
            let style = resolver.computed(node);
            let tag_name = tree.tag_name(node).unwrap_or_default().to_ascii_uppercase();
            for property in ColorProperty::SCANNED {
                let transparent = match property {
                    ColorProperty::Color => style.color.is_transparent(),
                    ColorProperty::BackgroundColor => style.background_color.is_transparent(),
                    ColorProperty::BorderColor => [
                        style.border_top_color,
                        style.border_right_color,
                        style.border_bottom_color,
                        style.border_left_color,
                    ]
                    .iter()
                    .all(|c| c.is_transparent()),
                    ColorProperty::BorderTopColor => style.border_top_color.is_transparent(),
                    ColorProperty::BorderRightColor => style.border_right_color.is_transparent(),
                    ColorProperty::BorderBottomColor => {
                        style.border_bottom_color.is_transparent()
                    }
                    ColorProperty::BorderLeftColor => style.border_left_color.is_transparent(),
                };
                if transparent {
                    continue;
                }
                let color = style.color_value(property);
                let usage = palette.entry(color.clone()).or_insert_with(|| ColorUsage {
                    color,
                    count: 0,
                    usages: Vec::new(),
                });
                usage.count += 1;
                usage.usages.push(UsageSite {
                    node,
                    tag_name: tag_name.clone(),
                    property,
                });
            }

            let processed = i + 1;
            if processed % self.progress_interval == 0 && processed < total {
                on_progress(ScanProgress::new(processed, total));
            }
        }
        on_progress(ScanProgress::new(total, total));

        let mut colors: Vec<ColorUsage> = palette.into_values().collect();
        colors.sort_by(|a, b| b.count.cmp(&a.count));
        info!(colors = colors.len(), elements = total, "colour scan finished");
        colors
    }

    /// Set `new` inline wherever `color`, `background-color` or
    /// `border-color` resolves to `old`. Returns the number of sites changed.
    pub fn replace(&self, tree: &mut DomTree, old: &str, new: &str) -> usize {
        let old = normalize_color(old).unwrap_or_else(|| old.trim().to_string());
        let new = new.trim();
        let target = old.as_str();

        let matches: Vec<(NodeId, ColorProperty)> = {
            let resolver = StyleResolver::new(tree);
            Self::candidates(tree)
                .into_iter()
                .flat_map(|node| {
                    let style = resolver.computed(node);
                    ColorProperty::REPLACEABLE
                        .into_iter()
                        .filter(move |prop| style.color_value(*prop) == target)
                        .map(move |prop| (node, prop))
                })
                .collect()
        };
        for (node, property) in &matches {
            tree.set_style_property(*node, property.css_name(), new);
        }
        debug!(old = %old, new, sites = matches.len(), "colour replaced");
        matches.len()
    }
}
