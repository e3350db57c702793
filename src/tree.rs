//! Hierarchical view of an index snapshot.
//!
//! Groups files by directory relative to the project root. At every level
//! folders come before files, then entries sort by label.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::storage::{FileEntry, IndexSnapshot, Tag};

/// Where an occurrence lives, 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
}

/// Leaf of the tree: one occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagItem {
    pub tag: Tag,
    pub text: String,
    /// 1-based line number for display.
    pub display_line: u32,
    pub location: Location,
}

impl TagItem {
    /// Display label, e.g. `[FIXME] null check`.
    #[must_use]
    pub fn label(&self) -> String {
        if self.text.is_empty() {
            format!("[{}]", self.tag)
        } else {
            format!("[{}] {}", self.tag, self.text)
        }
    }
}

/// A folder or a file with its occurrences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TreeNode {
    Folder {
        label: String,
        path: PathBuf,
        children: Vec<TreeNode>,
    },
    File {
        label: String,
        path: PathBuf,
        items: Vec<TagItem>,
    },
}

impl TreeNode {
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Folder { label, .. } | Self::File { label, .. } => label,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Folder { path, .. } | Self::File { path, .. } => path,
        }
    }

    const fn is_folder(&self) -> bool {
        matches!(self, Self::Folder { .. })
    }
}

#[derive(Default)]
struct FolderBuilder<'a> {
    folders: BTreeMap<String, FolderBuilder<'a>>,
    files: Vec<(String, &'a FileEntry)>,
}

impl<'a> FolderBuilder<'a> {
    fn insert(&mut self, dirs: &[String], file_name: String, entry: &'a FileEntry) {
        match dirs.split_first() {
            Some((first, rest)) => self
                .folders
                .entry(first.clone())
                .or_default()
                .insert(rest, file_name, entry),
            None => self.files.push((file_name, entry)),
        }
    }

    fn build(self, path: &Path) -> Vec<TreeNode> {
        let mut nodes: Vec<TreeNode> = self
            .folders
            .into_iter()
            .map(|(label, folder)| {
                let path = path.join(&label);
                TreeNode::Folder {
                    children: folder.build(&path),
                    label,
                    path,
                }
            })
            .collect();

        nodes.extend(self.files.into_iter().map(|(label, entry)| TreeNode::File {
            label,
            path: entry.path.clone(),
            items: items_for(entry),
        }));

        nodes.sort_by(|a, b| {
            b.is_folder()
                .cmp(&a.is_folder())
                .then_with(|| a.label().cmp(b.label()))
        });
        nodes
    }
}

fn items_for(entry: &FileEntry) -> Vec<TagItem> {
    entry
        .occurrences
        .iter()
        .map(|occ| TagItem {
            tag: occ.tag,
            text: occ.text.clone(),
            display_line: occ.line.saturating_add(1),
            location: Location {
                path: entry.path.clone(),
                line: occ.line,
                column: occ.column,
            },
        })
        .collect()
}

/// Materialize the snapshot as a tree rooted at `root`.
///
/// Files outside `root` are grouped by their full path.
#[must_use]
pub fn build_tree(snapshot: &IndexSnapshot, root: &Path) -> Vec<TreeNode> {
    let mut top = FolderBuilder::default();

    for entry in snapshot.iter() {
        let relative = entry.path.strip_prefix(root).unwrap_or(&entry.path);
        let mut parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let Some(file_name) = parts.pop() else {
            continue;
        };
        top.insert(&parts, file_name, entry);
    }

    top.build(root)
}

/// Render a tree as an indented listing, two spaces per level.
#[must_use]
pub fn render(nodes: &[TreeNode]) -> String {
    let mut out = String::new();
    render_into(&mut out, nodes, 0);
    out.truncate(out.trim_end().len());
    out
}

fn render_into(out: &mut String, nodes: &[TreeNode], depth: usize) {
    let indent = "  ".repeat(depth);
    for node in nodes {
        match node {
            TreeNode::Folder {
                label, children, ..
            } => {
                let _ = writeln!(out, "{indent}{label}/");
                render_into(out, children, depth + 1);
            }
            TreeNode::File { label, items, .. } => {
                let _ = writeln!(out, "{indent}{label}");
                for item in items {
                    let _ = writeln!(
                        out,
                        "{indent}  {} (line {})",
                        item.label(),
                        item.display_line
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStamp, IndexStore, Occurrence};

    fn store_with(files: &[(&str, Vec<Occurrence>)]) -> IndexStore {
        let store = IndexStore::new();
        for (path, occ) in files {
            store.apply(Path::new(path), occ.clone(), FileStamp::new(1, None));
        }
        store
    }

    #[test]
    fn test_single_file_in_folder() {
        let store = store_with(&[(
            "/p/a/b.ts",
            vec![Occurrence::new(Tag::Fixme, "null check", 2, 3)],
        )]);

        let tree = build_tree(&store.snapshot(), Path::new("/p"));
        assert_eq!(tree.len(), 1);
        let TreeNode::Folder {
            label, children, ..
        } = &tree[0]
        else {
            panic!("expected folder");
        };
        assert_eq!(label, "a");
        let TreeNode::File { label, items, path } = &children[0] else {
            panic!("expected file");
        };
        assert_eq!(label, "b.ts");
        assert_eq!(path, Path::new("/p/a/b.ts"));
        assert_eq!(items[0].display_line, 3);
        assert_eq!(items[0].label(), "[FIXME] null check");
        assert_eq!(
            items[0].location,
            Location {
                path: PathBuf::from("/p/a/b.ts"),
                line: 2,
                column: 3,
            }
        );
    }

    #[test]
    fn test_folders_before_files() {
        let store = store_with(&[
            ("/p/z.rs", vec![Occurrence::new(Tag::Todo, "z", 0, 0)]),
            ("/p/a.rs", vec![Occurrence::new(Tag::Todo, "a", 0, 0)]),
            ("/p/zz/x.rs", vec![Occurrence::new(Tag::Todo, "x", 0, 0)]),
            ("/p/b/y.rs", vec![Occurrence::new(Tag::Todo, "y", 0, 0)]),
        ]);

        let tree = build_tree(&store.snapshot(), Path::new("/p"));
        let labels: Vec<&str> = tree.iter().map(TreeNode::label).collect();
        assert_eq!(labels, vec!["b", "zz", "a.rs", "z.rs"]);
        assert_eq!(tree[0].path(), Path::new("/p/b"));
    }

    #[test]
    fn test_empty_snapshot() {
        let tree = build_tree(&IndexSnapshot::default(), Path::new("/p"));
        assert!(tree.is_empty());
        assert_eq!(render(&tree), "");
    }

    #[test]
    fn test_render() {
        let store = store_with(&[
            (
                "/p/a/b.ts",
                vec![Occurrence::new(Tag::Fixme, "null check", 2, 3)],
            ),
            (
                "/p/a/deep/c.py",
                vec![
                    Occurrence::new(Tag::Todo, "first", 0, 2),
                    Occurrence::new(Tag::Hack, "", 9, 0),
                ],
            ),
            ("/p/main.rs", vec![Occurrence::new(Tag::Xxx, "why", 41, 4)]),
        ]);

        let tree = build_tree(&store.snapshot(), Path::new("/p"));
        insta::assert_snapshot!(render(&tree), @r###"
        a/
          deep/
            c.py
              [TODO] first (line 1)
              [HACK] (line 10)
          b.ts
            [FIXME] null check (line 3)
        main.rs
          [XXX] why (line 42)
        "###);
    }
}
