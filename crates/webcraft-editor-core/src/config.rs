//! Editor tuning knobs.

use std::time::Duration;

use webcraft_project::ImportOptions;

/// Static configuration for an [`Editor`](crate::Editor).
///
/// Persisted, user-facing preferences live in
/// [`Settings`](crate::persist::Settings) instead.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Maximum number of undo snapshots kept.
    pub history_capacity: usize,
    /// How long the pointer must rest on an element before it is outlined.
    pub hover_delay: Duration,
    /// Delay between writing a document and injecting behaviour into it.
    pub settle_delay: Duration,
    /// Quiet period before a document change is rendered.
    pub render_debounce: Duration,
    /// Quiet period before a document change is auto-saved.
    pub autosave_debounce: Duration,
    /// Delay before an image's change button hides after the pointer leaves.
    pub image_button_hide_delay: Duration,
    /// Length of the feedback animation on neutralised links.
    pub link_feedback: Duration,
    /// Elements processed between colour-scan progress reports.
    pub scan_progress_interval: usize,
    /// Length of the recent-colours list.
    pub recent_colors_limit: usize,
    /// Host the editor itself is served from; navigation there is blocked.
    pub editor_host: String,
    /// Markup the sandbox is cleared to before each render.
    pub shell_markup: String,
    pub import: ImportOptions,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            hover_delay: Duration::from_millis(50),
            settle_delay: Duration::from_millis(10),
            render_debounce: Duration::from_millis(30),
            autosave_debounce: Duration::from_millis(2000),
            image_button_hide_delay: Duration::from_millis(100),
            link_feedback: Duration::from_millis(300),
            scan_progress_interval: 10,
            recent_colors_limit: 16,
            editor_host: "localhost".into(),
            shell_markup: "<!DOCTYPE html><html><head></head><body></body></html>".into(),
            import: ImportOptions::default(),
        }
    }
}
