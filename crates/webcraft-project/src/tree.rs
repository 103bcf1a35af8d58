//! Folder/file tree for the project explorer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::files::ProjectFile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProjectFileNode {
    Folder {
        name: String,
        children: Vec<ProjectFileNode>,
    },
    File {
        name: String,
        path: String,
        size: u64,
        modified: bool,
    },
}

impl ProjectFileNode {
    pub fn name(&self) -> &str {
        match self {
            ProjectFileNode::Folder { name, .. } | ProjectFileNode::File { name, .. } => name,
        }
    }

    /// Number of files at or below this node.
    pub fn file_count(&self) -> usize {
        match self {
            ProjectFileNode::Folder { children, .. } => {
                children.iter().map(ProjectFileNode::file_count).sum()
            }
            ProjectFileNode::File { .. } => 1,
        }
    }
}

#[derive(Default)]
struct PendingFolder {
    folders: BTreeMap<String, PendingFolder>,
    files: Vec<ProjectFileNode>,
}

impl PendingFolder {
    fn into_children(self) -> Vec<ProjectFileNode> {
        let mut files = self.files;
        files.sort_by(|a, b| a.name().cmp(b.name()));
        self.folders
            .into_iter()
            .map(|(name, folder)| ProjectFileNode::Folder {
                name,
                children: folder.into_children(),
            })
            .chain(files)
            .collect()
    }
}

/// Build the explorer tree from a flat file list.
///
/// Folders come before files at every level, each group sorted by name.
/// The returned nodes are the children of the (implicit) upload root.
pub fn build_file_tree(files: &[ProjectFile]) -> Vec<ProjectFileNode> {
    // Group by path prefix first, then freeze into nodes.
    let mut root = PendingFolder::default();
    for file in files {
        let mut segments: Vec<&str> = file.path.split('/').filter(|s| !s.is_empty()).collect();
        let Some(name) = segments.pop() else {
            continue;
        };
        let mut folder = &mut root;
        for segment in segments {
            folder = folder.folders.entry(segment.to_string()).or_default();
        }
        folder.files.push(ProjectFileNode::File {
            name: name.to_string(),
            path: file.path.clone(),
            size: file.size,
            modified: false,
        });
    }
    root.into_children()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_shape() {
        let files = vec![
            ProjectFile::new("site/index.html", "<p>"),
            ProjectFile::new("site/css/main.css", "p{}"),
            ProjectFile::new("site/about.html", "<p>"),
            ProjectFile::new("site/img/logo.png", vec![0u8; 4]),
        ];
        let tree = build_file_tree(&files);
        assert_eq!(tree.len(), 1);
        let ProjectFileNode::Folder { name, children } = &tree[0] else {
            panic!("expected a folder");
        };
        assert_eq!(name, "site");
        let names: Vec<_> = children.iter().map(ProjectFileNode::name).collect();
        assert_eq!(names, vec!["css", "img", "about.html", "index.html"]);
        assert_eq!(tree[0].file_count(), 4);
    }

    #[test]
    fn test_serialized_shape() {
        let tree = build_file_tree(&[ProjectFile::new("a/b.css", "x")]);
        let json = serde_json::to_string(&tree).unwrap();
        assert_eq!(
            json,
            r#"[{"type":"folder","name":"a","children":[{"type":"file","name":"b.css","path":"a/b.css","size":1,"modified":false}]}]"#
        );
    }
}
