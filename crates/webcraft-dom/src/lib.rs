//! Document model for the webcraft editor.
//!
//! An arena-backed HTML tree with a forgiving parser, a serializer that
//! round-trips hand-written markup, and just enough of the CSS cascade to
//! resolve the colours and box properties the editor shows.

pub mod cascade;
pub mod color;
pub mod parse;
pub mod serialize;
pub mod style;
pub mod tree;

pub use cascade::{ColorProperty, ComputedStyle, StyleResolver};
pub use color::{CssColor, Rgba, normalize_color, parse_color};
pub use parse::{is_raw_text, is_void};
pub use style::{Declaration, css_property_name, parse_declarations, serialize_declarations};
pub use tree::{Attribute, DomTree, ElementData, NodeData, NodeId};
