//! Turning an uploaded file set into one self-contained document.
//!
//! Classification picks the entry document; for static sites the local
//! stylesheets, scripts and small images are then inlined so the result
//! renders without any of the other files.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ImportError;
use crate::files::ProjectFile;
use crate::tree::{ProjectFileNode, build_file_tree};

static HEAD_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</head\s*>").unwrap());
static BODY_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</body\s*>").unwrap());
static HTML_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</html\s*>").unwrap());
static HTML_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<html(\s[^>]*)?>").unwrap());
static DOCTYPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<!doctype[^>]*>").unwrap());
static LINK_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<link\b[^>]*>").unwrap());
static SCRIPT_SRC_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script\b[^>]*\bsrc\s*=\s*["'][^"']*["'][^>]*>\s*</script\s*>"#).unwrap()
});
static ATTR_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']*)["']"#).unwrap());
static ATTR_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']*)["']"#).unwrap());
static REL_STYLESHEET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\brel\s*=\s*["']?stylesheet"#).unwrap());

/// Knobs for [`import_project`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Images at or above this many bytes stay external.
    pub image_size_limit: u64,
    /// Lowercase extensions treated as inlinable images.
    pub image_extensions: Vec<String>,
    /// Directory names holding build output, in priority order.
    pub build_dirs: Vec<String>,
    /// Directory holding an unbuilt framework entry page.
    pub public_dir: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            image_size_limit: 500_000,
            image_extensions: ["jpg", "jpeg", "png", "gif", "svg", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            build_dirs: ["build", "dist", "out"].into_iter().map(String::from).collect(),
            public_dir: "public".into(),
        }
    }
}

/// Front-end framework named in `package.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Framework {
    React,
    Vue,
    Svelte,
    Angular,
    NextJs,
    Generic,
}

impl Framework {
    /// Detect from the text of a `package.json`.
    pub fn detect(package_json: &str) -> Self {
        let manifest: serde_json::Value = match serde_json::from_str(package_json) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "package.json is not valid JSON");
                return Framework::Generic;
            }
        };
        let has = |dep: &str| {
            ["dependencies", "devDependencies"]
                .iter()
                .any(|section| manifest.get(section).and_then(|d| d.get(dep)).is_some())
        };
        if has("next") {
            Framework::NextJs
        } else if has("react") {
            Framework::React
        } else if has("vue") || has("nuxt") {
            Framework::Vue
        } else if has("svelte") || has("@sveltejs/kit") {
            Framework::Svelte
        } else if has("@angular/core") {
            Framework::Angular
        } else {
            Framework::Generic
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Framework::React => "React",
            Framework::Vue => "Vue",
            Framework::Svelte => "Svelte",
            Framework::Angular => "Angular",
            Framework::NextJs => "Next.js",
            Framework::Generic => "JavaScript",
        }
    }
}

/// Which branch produced the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectKind {
    BuildOutput { entry: String },
    /// Unbuilt framework entry page; usually missing its bundles.
    PublicEntry { entry: String },
    /// Framework project with no usable page; a placeholder was generated.
    Placeholder { framework: Framework },
    StaticSite { entry: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineSummary {
    pub styles: usize,
    pub scripts: usize,
    pub images: usize,
}

/// A file left out of the document, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ImportedProject {
    pub html: String,
    pub kind: ProjectKind,
    pub file_tree: Vec<ProjectFileNode>,
    pub warnings: Vec<String>,
    pub skipped: Vec<SkippedFile>,
    pub inlined: InlineSummary,
    pub file_count: usize,
}

fn in_dir(file: &ProjectFile, dir: &str) -> bool {
    dir.is_empty() || file.path.starts_with(&format!("{dir}/"))
}

fn parent_name(file: &ProjectFile) -> &str {
    file.dir().rsplit('/').next().unwrap_or("")
}

fn shallowest<'a>(files: impl Iterator<Item = &'a ProjectFile>) -> Option<&'a ProjectFile> {
    files.min_by(|a, b| a.depth().cmp(&b.depth()).then_with(|| a.path.cmp(&b.path)))
}

fn is_dependency_path(file: &ProjectFile) -> bool {
    file.path.split('/').any(|s| s == "node_modules")
}

enum Entry<'a> {
    Page(&'a ProjectFile, ProjectKind),
    Placeholder(Framework),
}

fn classify<'a>(files: &'a [ProjectFile], options: &ImportOptions) -> Option<Entry<'a>> {
    let candidates = || {
        files
            .iter()
            .filter(|f| !is_dependency_path(f))
            .filter(|f| f.name().eq_ignore_ascii_case("index.html"))
    };
    let package_json = shallowest(
        files
            .iter()
            .filter(|f| !is_dependency_path(f) && f.name() == "package.json"),
    );
    let has_sources = files
        .iter()
        .any(|f| f.path.starts_with("src/") || f.path.contains("/src/"));

    for dir in &options.build_dirs {
        if let Some(entry) = shallowest(candidates().filter(|f| parent_name(f) == dir)) {
            return Some(Entry::Page(
                entry,
                ProjectKind::BuildOutput {
                    entry: entry.path.clone(),
                },
            ));
        }
    }

    let framework = || {
        package_json
            .and_then(|f| f.text().ok().map(|t| Framework::detect(&t)))
            .unwrap_or(Framework::Generic)
    };
    if package_json.is_some() {
        if let Some(entry) =
            shallowest(candidates().filter(|f| parent_name(f) == options.public_dir))
        {
            return Some(Entry::Page(
                entry,
                ProjectKind::PublicEntry {
                    entry: entry.path.clone(),
                },
            ));
        }
        if has_sources {
            return Some(Entry::Placeholder(framework()));
        }
    }

    if let Some(entry) = shallowest(candidates()) {
        return Some(Entry::Page(
            entry,
            ProjectKind::StaticSite {
                entry: entry.path.clone(),
            },
        ));
    }
    package_json.map(|_| Entry::Placeholder(framework()))
}

/// Import an uploaded project.
///
/// Fails only when no document can be produced at all. Files that cannot
/// be read or are too large to inline are recorded in
/// [`ImportedProject::skipped`] and otherwise ignored.
pub fn import_project(
    files: &[ProjectFile],
    options: &ImportOptions,
) -> Result<ImportedProject, ImportError> {
    if files.is_empty() {
        return Err(ImportError::Empty);
    }
    let entry = classify(files, options).ok_or(ImportError::NoDocument {
        file_count: files.len(),
    })?;

    let mut project = ImportedProject {
        html: String::new(),
        kind: ProjectKind::Placeholder {
            framework: Framework::Generic,
        },
        file_tree: build_file_tree(files),
        warnings: Vec::new(),
        skipped: Vec::new(),
        inlined: InlineSummary::default(),
        file_count: files.len(),
    };

    match entry {
        Entry::Placeholder(framework) => {
            debug!(?framework, "framework project without build output");
            project.html = placeholder_document(framework);
            project.warnings.push(format!(
                "Detected {} project without a build - showing a placeholder",
                framework.display_name()
            ));
            project.kind = ProjectKind::Placeholder { framework };
        }
        Entry::Page(file, kind) => {
            let text = file.text().map_err(|reason| ImportError::EntryUnreadable {
                path: file.path.clone(),
                reason: reason.to_string(),
            })?;
            project.html = text.into_owned();
            match &kind {
                ProjectKind::PublicEntry { .. } => project.warnings.push(format!(
                    "Using {}/index.html - consider building the project first",
                    options.public_dir
                )),
                ProjectKind::StaticSite { .. } => {
                    inline_assets(&mut project, files, file, options);
                }
                _ => {}
            }
            project.kind = kind;
        }
    }

    for skipped in &project.skipped {
        warn!(path = %skipped.path, reason = %skipped.reason, "skipped file during import");
    }
    info!(
        files = project.file_count,
        styles = project.inlined.styles,
        scripts = project.inlined.scripts,
        images = project.inlined.images,
        "project imported"
    );
    Ok(project)
}

fn inline_assets(
    project: &mut ImportedProject,
    files: &[ProjectFile],
    entry: &ProjectFile,
    options: &ImportOptions,
) {
    let mut assets: Vec<&ProjectFile> = files
        .iter()
        .filter(|f| in_dir(f, entry.dir()) && !is_dependency_path(f) && f.path != entry.path)
        .collect();
    assets.sort_by(|a, b| a.path.cmp(&b.path));

    let mut html = std::mem::take(&mut project.html);
    for file in assets {
        let ext = file.extension().unwrap_or_default();
        match ext.as_str() {
            "css" => match file.text() {
                Ok(css) => {
                    html = remove_stylesheet_links(&html, file.name());
                    html = inject_style(&html, &css, file.name());
                    project.inlined.styles += 1;
                }
                Err(reason) => project.skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason: reason.to_string(),
                }),
            },
            "js" => match file.text() {
                Ok(js) => {
                    html = remove_script_sources(&html, file.name());
                    html = inject_script(&html, &js, file.name());
                    project.inlined.scripts += 1;
                }
                Err(reason) => project.skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason: reason.to_string(),
                }),
            },
            ext if options.image_extensions.iter().any(|e| e == ext) => {
                if file.size >= options.image_size_limit {
                    project.skipped.push(SkippedFile {
                        path: file.path.clone(),
                        reason: format!(
                            "{} bytes exceeds the {} byte inline limit",
                            file.size, options.image_size_limit
                        ),
                    });
                    continue;
                }
                match file.bytes() {
                    Ok(bytes) => {
                        let (rewritten, count) =
                            rewrite_image_sources(&html, file.name(), &data_url(ext, bytes));
                        html = rewritten;
                        if count > 0 {
                            project.inlined.images += 1;
                        }
                    }
                    Err(reason) => project.skipped.push(SkippedFile {
                        path: file.path.clone(),
                        reason: reason.to_string(),
                    }),
                }
            }
            _ => {}
        }
    }
    project.html = html;
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Insert `fragment` before the first match of `close`, if any.
fn insert_before(html: &str, close: &Regex, fragment: &str, last: bool) -> Option<String> {
    let found = if last {
        close.find_iter(html).last()
    } else {
        close.find(html)
    };
    let at = found?.start();
    Some(format!("{}{}\n{}", &html[..at], fragment, &html[at..]))
}

/// Add a `<style>` block before `</head>`, creating a head when missing.
pub fn inject_style(html: &str, css: &str, source: &str) -> String {
    let tag = format!(
        "\n<style data-source=\"{}\">\n{}\n</style>",
        escape_attr(source),
        css
    );
    if let Some(out) = insert_before(html, &HEAD_CLOSE, &tag, false) {
        return out;
    }
    let head = format!("<head>{tag}\n</head>");
    let at = HTML_OPEN
        .find(html)
        .or_else(|| DOCTYPE.find(html))
        .map(|m| m.end())
        .unwrap_or(0);
    format!("{}{}\n{}", &html[..at], head, &html[at..])
}

/// Add a `<script>` block before `</body>` (or `</html>`), else at the end.
pub fn inject_script(html: &str, js: &str, source: &str) -> String {
    let tag = format!(
        "\n<script data-source=\"{}\">\n{}\n</script>",
        escape_attr(source),
        js
    );
    insert_before(html, &BODY_CLOSE, &tag, true)
        .or_else(|| insert_before(html, &HTML_CLOSE, &tag, true))
        .unwrap_or_else(|| format!("{html}\n{tag}"))
}

fn references(url: &str, name: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path == name || path.ends_with(&format!("/{name}"))
}

/// Drop `<link rel="stylesheet">` tags pointing at `name`.
fn remove_stylesheet_links(html: &str, name: &str) -> String {
    LINK_TAG
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            let points_here = ATTR_HREF
                .captures(tag)
                .is_some_and(|href| references(&href[1], name));
            if points_here && REL_STYLESHEET.is_match(tag) {
                String::new()
            } else {
                tag.to_string()
            }
        })
        .into_owned()
}

/// Drop external `<script src>` tags pointing at `name`.
fn remove_script_sources(html: &str, name: &str) -> String {
    SCRIPT_SRC_TAG
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            let points_here = ATTR_SRC
                .captures(tag)
                .is_some_and(|src| references(&src[1], name));
            if points_here {
                String::new()
            } else {
                tag.to_string()
            }
        })
        .into_owned()
}

fn image_mime(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

pub fn data_url(ext: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", image_mime(ext), STANDARD.encode(bytes))
}

/// Point every `src` attribute naming `file_name` at `replacement`.
/// Returns the new markup and how many references were rewritten.
pub fn rewrite_image_sources(html: &str, file_name: &str, replacement: &str) -> (String, usize) {
    let pattern = format!(
        r#"src=["']((?:[^"']*/)?{})["']"#,
        regex::escape(file_name)
    );
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(err) => {
            warn!(%err, file_name, "could not build image pattern");
            return (html.to_string(), 0);
        }
    };
    let count = re.find_iter(html).count();
    let replaced = re
        .replace_all(html, NoExpand(&format!("src=\"{replacement}\"")))
        .into_owned();
    (replaced, count)
}

/// Stand-in page for framework projects that have not been built.
pub fn placeholder_document(framework: Framework) -> String {
    let name = framework.display_name();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{name} Project Preview</title>
  <style>
    body {{ margin: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f0f2f5; min-height: 100vh; display: flex; align-items: center; justify-content: center; }}
    .preview-container {{ background: white; padding: 2rem; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); max-width: 600px; text-align: center; }}
    code {{ background: #f4f4f4; padding: 0.5rem; border-radius: 4px; display: block; margin: 1rem 0; }}
  </style>
</head>
<body>
  <div class="preview-container">
    <h1>{name} Project Preview</h1>
    <p>This is a preview of your {name} project structure.</p>
    <p>To see your actual app, please build your project first:</p>
    <code>npm run build</code>
    <p>Then import the build folder.</p>
  </div>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ImportOptions {
        ImportOptions::default()
    }

    #[test]
    fn test_static_site_inlines_assets() {
        let files = vec![
            ProjectFile::new(
                "site/index.html",
                "<!DOCTYPE html><html><head><link rel=\"stylesheet\" href=\"css/style.css\"></head>\
                 <body><img src=\"img/logo.png\"><script src=\"app.js\"></script></body></html>",
            ),
            ProjectFile::new("site/css/style.css", "body { color: red; }"),
            ProjectFile::new("site/app.js", "console.log(1);"),
            ProjectFile::new("site/img/logo.png", vec![1u8, 2, 3]),
        ];
        let project = import_project(&files, &opts()).unwrap();

        assert!(matches!(project.kind, ProjectKind::StaticSite { ref entry } if entry == "site/index.html"));
        assert!(project.html.contains("<style data-source=\"style.css\">\nbody { color: red; }\n</style>"));
        assert!(project.html.contains("<script data-source=\"app.js\">\nconsole.log(1);\n</script>"));
        assert!(project.html.contains("<img src=\"data:image/png;base64,AQID\">"));
        assert!(!project.html.contains("href=\"css/style.css\""));
        assert!(!project.html.contains("src=\"app.js\""));
        assert_eq!(
            project.inlined,
            InlineSummary {
                styles: 1,
                scripts: 1,
                images: 1
            }
        );
        assert!(project.skipped.is_empty());
    }

    #[test]
    fn test_head_created_when_missing() {
        let html = inject_style("<!DOCTYPE html><p>x</p>", "p{}", "a.css");
        assert_eq!(
            html,
            "<!DOCTYPE html><head>\n<style data-source=\"a.css\">\np{}\n</style>\n</head>\n<p>x</p>"
        );
        let html = inject_script("<p>x</p>", "go()", "a.js");
        assert_eq!(html, "<p>x</p>\n\n<script data-source=\"a.js\">\ngo()\n</script>");
    }

    #[test]
    fn test_oversized_and_unreadable_files_are_skipped() {
        let mut options = opts();
        options.image_size_limit = 2;
        let files = vec![
            ProjectFile::new("index.html", "<body><img src=\"big.png\"></body>"),
            ProjectFile::new("big.png", vec![0u8; 3]),
            ProjectFile::failed("broken.css", 12, "read error"),
        ];
        let project = import_project(&files, &options).unwrap();
        assert!(project.html.contains("src=\"big.png\""));
        let paths: Vec<_> = project.skipped.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["big.png", "broken.css"]);
    }

    #[test]
    fn test_build_output_preferred() {
        let files = vec![
            ProjectFile::new("app/package.json", r#"{"dependencies":{"react":"18"}}"#),
            ProjectFile::new("app/src/App.js", "export default 1"),
            ProjectFile::new("app/public/index.html", "<p>public</p>"),
            ProjectFile::new("app/build/index.html", "<p>built</p>"),
        ];
        let project = import_project(&files, &opts()).unwrap();
        assert_eq!(project.html, "<p>built</p>");
        assert!(project.warnings.is_empty());
    }

    #[test]
    fn test_public_entry_warns() {
        let files = vec![
            ProjectFile::new("app/package.json", "{}"),
            ProjectFile::new("app/public/index.html", "<p>public</p>"),
        ];
        let project = import_project(&files, &opts()).unwrap();
        assert!(matches!(project.kind, ProjectKind::PublicEntry { .. }));
        assert_eq!(project.warnings.len(), 1);
    }

    #[test]
    fn test_placeholder_names_framework() {
        let files = vec![
            ProjectFile::new("app/package.json", r#"{"devDependencies":{"svelte":"4"}}"#),
            ProjectFile::new("app/src/main.js", "x"),
        ];
        let project = import_project(&files, &opts()).unwrap();
        assert_eq!(
            project.kind,
            ProjectKind::Placeholder {
                framework: Framework::Svelte
            }
        );
        assert!(project.html.contains("<h1>Svelte Project Preview</h1>"));
    }

    #[test]
    fn test_no_document() {
        let files = vec![ProjectFile::new("notes.txt", "hi")];
        assert!(matches!(
            import_project(&files, &opts()),
            Err(ImportError::NoDocument { file_count: 1 })
        ));
        assert!(matches!(import_project(&[], &opts()), Err(ImportError::Empty)));
    }

    #[test]
    fn test_image_name_must_match_whole_segment() {
        let (html, count) =
            rewrite_image_sources("<img src='biglogo.png'><img src='a/logo.png'>", "logo.png", "X");
        assert_eq!(count, 1);
        assert_eq!(html, "<img src='biglogo.png'><img src=\"X\">");
    }
}
