//! Candidate file filtering.
//!
//! Decides from the path alone (no stat) whether a file belongs in the
//! index, so the same rules apply to discovery and to change events for
//! files that may already be gone.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Directory names never descended into.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "bower_components",
    "target",
    "dist",
    "build",
    "out",
    ".next",
    "coverage",
    "__pycache__",
    ".venv",
    "venv",
];

/// Extensions of binary, font, image, media, and archive files.
const IGNORED_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svg", "tif", "tiff", "psd",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // archives
    "zip", "gz", "tgz", "tar", "bz2", "xz", "7z", "rar", "jar",
    // binaries
    "exe", "dll", "so", "dylib", "o", "a", "lib", "class", "pyc", "wasm", "bin",
    // media and documents
    "mp3", "mp4", "mov", "avi", "wav", "ogg", "webm", "flac", "pdf",
    // databases
    "db", "sqlite", "sqlite3",
];

/// File filter for indexing.
#[derive(Debug)]
pub struct FileFilter {
    root: PathBuf,
    exclude_dirs: HashSet<String>,
    gitignore: Option<Gitignore>,
}

impl FileFilter {
    /// Create a filter rooted at `root`.
    ///
    /// If `respect_gitignore` is set and a `.gitignore` exists in `root`, it
    /// is used for filtering change events. Discovery additionally honors
    /// nested ignore files through the walker.
    pub fn new(root: impl AsRef<Path>, exclude_dirs: &[String], respect_gitignore: bool) -> Self {
        let root = root.as_ref().to_path_buf();
        let gitignore_path = root.join(".gitignore");

        let gitignore = if respect_gitignore && gitignore_path.exists() {
            let mut builder = GitignoreBuilder::new(&root);
            if let Some(e) = builder.add(&gitignore_path) {
                tracing::warn!(error = %e, "Ignoring malformed .gitignore");
                None
            } else {
                builder.build().ok()
            }
        } else {
            None
        };

        Self {
            root,
            exclude_dirs: exclude_dirs.iter().cloned().collect(),
            gitignore,
        }
    }

    /// Check if a path should be indexed.
    #[must_use]
    pub fn is_candidate(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };

        if Self::is_ignored_extension(path) {
            return false;
        }

        // Every directory component, not the file name itself.
        let mut dirs = relative.components();
        dirs.next_back();
        let excluded = dirs.any(|c| match c {
            Component::Normal(name) => self.is_excluded_dir(&name.to_string_lossy()),
            _ => false,
        });
        if excluded {
            return false;
        }

        if let Some(ref gi) = self.gitignore {
            if gi.matched_path_or_any_parents(path, false).is_ignore() {
                return false;
            }
        }

        true
    }

    /// Check if files below directory `dir` may be indexed.
    ///
    /// False when `dir` is outside the root, or it or one of its ancestors
    /// is excluded or gitignored.
    #[must_use]
    pub fn is_candidate_dir(&self, dir: &Path) -> bool {
        let Ok(relative) = dir.strip_prefix(&self.root) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return true;
        }

        let excluded = relative.components().any(|c| match c {
            Component::Normal(name) => self.is_excluded_dir(&name.to_string_lossy()),
            _ => false,
        });
        if excluded {
            return false;
        }

        self.gitignore
            .as_ref()
            .map_or(true, |gi| !gi.matched_path_or_any_parents(dir, true).is_ignore())
    }

    /// Whether a directory with this name is pruned.
    #[must_use]
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.contains(name)
    }

    /// Check if a path has a binary/font/image extension.
    #[must_use]
    pub fn is_ignored_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_lowercase();
                IGNORED_EXTENSIONS.contains(&ext.as_str())
            })
    }

    /// Root this filter was built for.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
