//! Splitting the document back into a portable set of files.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{info, warn};

use crate::archive::{ArchiveEntry, ArchivePacker};

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>(.*?)</style>").unwrap());
static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>(.*?)</script>").unwrap());

/// Files making up an exported project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBundle {
    /// The document, unchanged.
    pub index_html: String,
    pub styles: Vec<String>,
    /// Non-empty script bodies only.
    pub scripts: Vec<String>,
    pub readme: String,
}

impl ExportBundle {
    /// Extract stylesheets and scripts from `html`.
    pub fn extract(html: &str, exported_at: DateTime<Utc>) -> Self {
        let styles = STYLE_BLOCK
            .captures_iter(html)
            .map(|c| c[1].to_string())
            .collect();
        let scripts = SCRIPT_BLOCK
            .captures_iter(html)
            .map(|c| c[1].to_string())
            .filter(|body| !body.trim().is_empty())
            .collect();
        Self {
            index_html: html.to_string(),
            styles,
            scripts,
            readme: readme(exported_at),
        }
    }

    /// Archive layout: `index.html`, `styles/style{N}.css`,
    /// `scripts/script{N}.js`, `README.txt`.
    pub fn entries(&self) -> Vec<ArchiveEntry> {
        let mut entries = vec![ArchiveEntry::new("index.html", self.index_html.as_bytes())];
        entries.extend(
            self.styles
                .iter()
                .enumerate()
                .map(|(i, css)| ArchiveEntry::new(format!("styles/style{i}.css"), css.as_bytes())),
        );
        entries.extend(
            self.scripts
                .iter()
                .enumerate()
                .map(|(i, js)| ArchiveEntry::new(format!("scripts/script{i}.js"), js.as_bytes())),
        );
        entries.push(ArchiveEntry::new("README.txt", self.readme.as_bytes()));
        entries
    }
}

fn readme(exported_at: DateTime<Utc>) -> String {
    format!(
        "WebCraft Project\n\
         Exported: {}\n\
         \n\
         Structure:\n\
         - index.html: main document\n\
         - styles/: CSS files\n\
         - scripts/: JavaScript files\n",
        exported_at.to_rfc3339()
    )
}

/// What an export produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportArtifact {
    Archive {
        file_name: String,
        bytes: Vec<u8>,
        files: usize,
    },
    /// Archive packaging failed; only the document itself is offered.
    SingleFile {
        file_name: String,
        bytes: Vec<u8>,
        notice: String,
    },
}

impl ExportArtifact {
    pub fn file_name(&self) -> &str {
        match self {
            ExportArtifact::Archive { file_name, .. }
            | ExportArtifact::SingleFile { file_name, .. } => file_name,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            ExportArtifact::Archive { bytes, .. } | ExportArtifact::SingleFile { bytes, .. } => {
                bytes
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ExportArtifact::SingleFile { .. })
    }
}

/// Export the document. Never fails: packaging errors degrade to a single
/// `index.html`.
pub fn export_project(
    html: &str,
    packer: &dyn ArchivePacker,
    exported_at: DateTime<Utc>,
) -> ExportArtifact {
    let bundle = ExportBundle::extract(html, exported_at);
    let entries = bundle.entries();
    match packer.pack(&entries) {
        Ok(bytes) => {
            let file_name = format!(
                "webcraft-project-{}.{}",
                exported_at.timestamp_millis(),
                packer.extension()
            );
            info!(
                file_name = %file_name,
                styles = bundle.styles.len(),
                scripts = bundle.scripts.len(),
                "project exported"
            );
            ExportArtifact::Archive {
                file_name,
                bytes,
                files: entries.len(),
            }
        }
        Err(err) => {
            warn!(%err, "archive packaging failed, exporting the document alone");
            ExportArtifact::SingleFile {
                file_name: "index.html".into(),
                bytes: html.as_bytes().to_vec(),
                notice: "Archive not available - exported as plain HTML".into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::archive::Unavailable;

    const DOC: &str = "<html><head><style>a{}</style><style media=\"print\">b{}</style></head>\
                       <body><script src=\"x.js\"></script><script>go();</script></body></html>";

    #[test]
    fn test_extract_numbers_blocks() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let bundle = ExportBundle::extract(DOC, at);
        assert_eq!(bundle.styles, vec!["a{}", "b{}"]);
        assert_eq!(bundle.scripts, vec!["go();"]);
        let paths: Vec<_> = bundle.entries().into_iter().map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec![
                "index.html",
                "styles/style0.css",
                "styles/style1.css",
                "scripts/script0.js",
                "README.txt"
            ]
        );
        insta::assert_snapshot!(bundle.readme, @r"
        WebCraft Project
        Exported: 2024-05-01T12:00:00+00:00

        Structure:
        - index.html: main document
        - styles/: CSS files
        - scripts/: JavaScript files
        ");
    }

    #[test]
    fn test_export_falls_back_to_single_file() {
        let artifact = export_project(DOC, &Unavailable, Utc::now());
        assert!(artifact.is_degraded());
        assert_eq!(artifact.file_name(), "index.html");
        assert_eq!(artifact.bytes(), DOC.as_bytes());
    }

    #[cfg(feature = "zip")]
    #[test]
    fn test_export_archive_name() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let artifact = export_project(DOC, &crate::archive::ZipPacker, at);
        assert_eq!(artifact.file_name(), "webcraft-project-1700000000123.zip");
        assert!(matches!(artifact, ExportArtifact::Archive { files: 5, .. }));
    }
}
