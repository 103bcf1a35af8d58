//! The canonical document and its presentation metadata.

use serde::{Deserialize, Serialize};

/// Device preset controlling the sandbox surface size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportProfile {
    #[default]
    Desktop,
    Tablet,
    Mobile,
}

impl ViewportProfile {
    pub const ALL: [ViewportProfile; 3] = [
        ViewportProfile::Desktop,
        ViewportProfile::Tablet,
        ViewportProfile::Mobile,
    ];

    /// `(width, height)` in CSS pixels.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ViewportProfile::Desktop => (1038, 653),
            ViewportProfile::Tablet => (768, 1024),
            ViewportProfile::Mobile => (375, 667),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewportProfile::Desktop => "desktop",
            ViewportProfile::Tablet => "tablet",
            ViewportProfile::Mobile => "mobile",
        }
    }
}

/// Edit neutralises links and enables the editing affordances; Navigate
/// leaves the page live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Edit,
    Navigate,
}

/// Toolbar tool. Recorded in auto-saves; has no effect on the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Select,
    Text,
    Rectangle,
    Image,
    Move,
}

impl Tool {
    /// Keyboard shortcut shown in the toolbar.
    pub fn shortcut(self) -> char {
        match self {
            Tool::Select => 'V',
            Tool::Text => 'T',
            Tool::Rectangle => 'R',
            Tool::Image => 'I',
            Tool::Move => 'M',
        }
    }
}

/// Owner of the document string.
///
/// Every change replaces the whole string; the store never patches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentStore {
    content: String,
    viewport: ViewportProfile,
    revision: u64,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl DocumentStore {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            viewport: ViewportProfile::default(),
            revision: 0,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Bumped on every content change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn viewport(&self) -> ViewportProfile {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: ViewportProfile) {
        self.viewport = viewport;
    }

    /// Swap in new content, returning the previous string.
    pub fn replace(&mut self, content: String) -> String {
        self.revision += 1;
        std::mem::replace(&mut self.content, content)
    }
}

/// Document shown when nothing was imported or restored.
pub const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>My Website</title>
  <style>
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
      background: #f5f5f5;
      min-height: 100vh;
    }
    .container { max-width: 1200px; margin: 0 auto; padding: 2rem; text-align: center; }
    h1 { font-size: 3rem; color: #333; margin-bottom: 1rem; }
    p { font-size: 1.2rem; color: #666; margin-bottom: 2rem; }
    .card-grid {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(300px, 1fr));
      gap: 2rem;
      margin-top: 3rem;
    }
    .card { background: white; padding: 2rem; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
    .card img { width: 100%; height: 200px; object-fit: cover; border-radius: 4px; margin-bottom: 1rem; }
    .card h3 { color: #333; margin-bottom: 0.5rem; }
    .btn {
      display: inline-block;
      padding: 0.75rem 2rem;
      background: #667eea;
      color: white;
      text-decoration: none;
      border-radius: 5px;
    }
  </style>
</head>
<body>
  <div class="container">
    <h1>Welcome to WebCraft</h1>
    <p>Build professional websites with an intuitive visual editor</p>
    <a href="https://example.com/get-started" class="btn">Get started</a>

    <div class="card-grid droppable">
      <div class="card draggable" draggable="true">
        <img src="https://picsum.photos/300/200?random=1" alt="Feature 1">
        <h3>Modern design</h3>
        <p>Clean, modern layouts out of the box</p>
      </div>
      <div class="card draggable" draggable="true">
        <img src="https://picsum.photos/300/200?random=2" alt="Feature 2">
        <h3>Responsive</h3>
        <p>Pages that adapt to every screen</p>
      </div>
      <div class="card draggable" draggable="true">
        <img src="https://picsum.photos/300/200?random=3" alt="Feature 3">
        <h3>Easy to use</h3>
        <p>A simple interface with real power underneath</p>
      </div>
    </div>
  </div>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_dimensions() {
        assert_eq!(ViewportProfile::Desktop.dimensions(), (1038, 653));
        assert_eq!(ViewportProfile::Tablet.dimensions(), (768, 1024));
        assert_eq!(ViewportProfile::Mobile.dimensions(), (375, 667));
        assert_eq!(serde_json::to_string(&ViewportProfile::Mobile).unwrap(), "\"mobile\"");
    }

    #[test]
    fn test_replace_bumps_revision() {
        let mut store = DocumentStore::new("<p>a</p>");
        let old = store.replace("<p>b</p>".into());
        assert_eq!(old, "<p>a</p>");
        assert_eq!(store.content(), "<p>b</p>");
        assert_eq!(store.revision(), 1);
    }
}
