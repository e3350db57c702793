//! Discovery of candidate files under the project root.
//!
//! Walks the first root with the `ignore` crate, pruning excluded
//! directories before descending and dropping ignored extensions.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;

use super::filter::{FileFilter, DEFAULT_EXCLUDED_DIRS};

/// Discovery configuration.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Project roots. Only the first one is indexed.
    pub roots: Vec<PathBuf>,
    /// Directory names never descended into.
    pub exclude_dirs: Vec<String>,
    /// Upper bound on files returned.
    pub max_files: usize,
    /// Honor `.gitignore` / `.ignore` files.
    pub respect_gitignore: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            exclude_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(ToString::to_string).collect(),
            max_files: 100_000,
            respect_gitignore: true,
        }
    }
}

/// Walk statistics, logged after each pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscoveryStats {
    pub files_found: u64,
    pub files_skipped: u64,
    pub errors: u64,
    pub truncated: bool,
}

/// Enumerates candidate files for indexing.
#[derive(Debug, Clone)]
pub struct Discovery {
    root: Option<PathBuf>,
    config: Arc<DiscoveryConfig>,
    filter: Arc<FileFilter>,
}

impl Discovery {
    /// Create a discovery pass over the first configured root.
    #[must_use]
    pub fn new(config: DiscoveryConfig) -> Self {
        if config.roots.len() > 1 {
            tracing::warn!(
                roots = config.roots.len(),
                "Multiple roots configured, only the first is indexed"
            );
        }

        let root = config.roots.first().map(|r| absolute_root(r));
        let filter = FileFilter::new(
            root.clone().unwrap_or_default(),
            &config.exclude_dirs,
            config.respect_gitignore,
        );

        Self {
            root,
            config: Arc::new(config),
            filter: Arc::new(filter),
        }
    }

    /// The indexed project root, if any.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Path filter shared with change-event handling.
    #[must_use]
    pub fn filter(&self) -> Arc<FileFilter> {
        Arc::clone(&self.filter)
    }

    /// Enumerate candidate files, sorted and deduplicated.
    ///
    /// A missing or unreadable root yields an empty set.
    #[must_use]
    pub fn discover(&self) -> Vec<PathBuf> {
        self.discover_with_stats().0
    }

    /// Enumerate candidate files along with walk statistics.
    #[must_use]
    pub fn discover_with_stats(&self) -> (Vec<PathBuf>, DiscoveryStats) {
        let mut stats = DiscoveryStats::default();

        let Some(root) = self.root.as_deref() else {
            tracing::info!("No project root, nothing to discover");
            return (Vec::new(), stats);
        };
        if !root.is_dir() {
            tracing::warn!(path = %root.display(), "Project root is not a directory");
            return (Vec::new(), stats);
        }

        tracing::info!(path = %root.display(), "Starting discovery");
        let files = self.walk(root, &mut stats);

        tracing::info!(
            path = %root.display(),
            found = stats.files_found,
            candidates = files.len(),
            skipped = stats.files_skipped,
            errors = stats.errors,
            "Discovery complete"
        );

        (files, stats)
    }

    /// Enumerate candidate files below `dir`, e.g. a directory that was just
    /// created or moved into the project.
    ///
    /// Returns nothing when `dir` is outside the root or excluded.
    #[must_use]
    pub fn discover_under(&self, dir: &Path) -> Vec<PathBuf> {
        if self.root.is_none() || !dir.is_dir() || !self.filter.is_candidate_dir(dir) {
            return Vec::new();
        }

        let mut stats = DiscoveryStats::default();
        let files = self.walk(dir, &mut stats);
        tracing::debug!(
            path = %dir.display(),
            candidates = files.len(),
            errors = stats.errors,
            "Discovered files under directory"
        );
        files
    }

    fn walk(&self, start: &Path, stats: &mut DiscoveryStats) -> Vec<PathBuf> {
        let prune = Arc::clone(&self.filter);
        let respect = self.config.respect_gitignore;
        let walker = WalkBuilder::new(start)
            .hidden(false)
            .git_ignore(respect)
            .git_global(respect)
            .git_exclude(respect)
            .ignore(respect)
            .parents(respect)
            .require_git(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                let name = entry.file_name().to_string_lossy();
                !(is_dir && entry.depth() > 0 && prune.is_excluded_dir(&name))
            })
            .build();

        let mut files = BTreeSet::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if !entry.file_type().is_some_and(|t| t.is_file()) {
                        continue;
                    }

                    stats.files_found += 1;
                    if FileFilter::is_ignored_extension(entry.path()) {
                        stats.files_skipped += 1;
                        continue;
                    }

                    if files.len() >= self.config.max_files {
                        stats.truncated = true;
                        tracing::warn!(
                            limit = self.config.max_files,
                            "Discovery limit reached, remaining files are not indexed"
                        );
                        break;
                    }
                    files.insert(entry.into_path());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Error walking directory");
                    stats.errors += 1;
                }
            }
        }

        files.into_iter().collect()
    }
}

fn absolute_root(root: &Path) -> PathBuf {
    if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::fs::canonicalize(root)
            .or_else(|_| std::env::current_dir().map(|cwd| cwd.join(root)))
            .unwrap_or_else(|_| root.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn discovery_for(root: &Path) -> Discovery {
        Discovery::new(DiscoveryConfig {
            roots: vec![root.to_path_buf()],
            ..Default::default()
        })
    }

    #[test]
    fn test_discover_filters_dirs_and_extensions() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("main.rs"), "fn main() {}").unwrap();
        fs::write(src.join("logo.png"), [0u8; 8]).unwrap();
        fs::write(tmp.path().join("Makefile"), "all:").unwrap();
        fs::write(tmp.path().join(".eslintrc.js"), "// TODO").unwrap();

        let node_modules = tmp.path().join("node_modules").join("pkg");
        fs::create_dir_all(&node_modules).unwrap();
        fs::write(node_modules.join("index.js"), "// TODO").unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();
        fs::write(tmp.path().join(".git").join("HEAD"), "ref").unwrap();

        let files = discovery_for(tmp.path()).discover();

        assert!(files.contains(&src.join("main.rs")));
        assert!(files.contains(&tmp.path().join("Makefile")));
        assert!(files.contains(&tmp.path().join(".eslintrc.js")));
        assert!(!files.iter().any(|p| p.ends_with("logo.png")));
        assert!(!files.iter().any(|p| p.starts_with(tmp.path().join("node_modules"))));
        assert!(!files.iter().any(|p| p.starts_with(tmp.path().join(".git"))));
    }

    #[test]
    fn test_discover_respects_gitignore() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();
        fs::write(tmp.path().join("app.py"), "# TODO").unwrap();
        fs::write(tmp.path().join("debug.log"), "TODO").unwrap();

        let files = discovery_for(tmp.path()).discover();
        assert!(files.contains(&tmp.path().join("app.py")));
        assert!(!files.contains(&tmp.path().join("debug.log")));
    }

    #[test]
    fn test_discover_bounded() {
        let tmp = TempDir::new().unwrap();
        for i in 0..10 {
            fs::write(tmp.path().join(format!("f{i}.txt")), "x").unwrap();
        }

        let discovery = Discovery::new(DiscoveryConfig {
            roots: vec![tmp.path().to_path_buf()],
            max_files: 4,
            ..Default::default()
        });
        let (files, stats) = discovery.discover_with_stats();
        assert_eq!(files.len(), 4);
        assert!(stats.truncated);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let discovery = discovery_for(Path::new("/definitely/not/here"));
        assert!(discovery.discover().is_empty());

        let none = Discovery::new(DiscoveryConfig::default());
        assert!(none.root().is_none());
        assert!(none.discover().is_empty());
    }

    #[test]
    fn test_discover_under_subdirectory() {
        let tmp = TempDir::new().unwrap();
        let moved = tmp.path().join("moved");
        fs::create_dir_all(moved.join("deep")).unwrap();
        fs::create_dir_all(moved.join("node_modules")).unwrap();
        fs::write(moved.join("a.rs"), "// TODO").unwrap();
        fs::write(moved.join("deep").join("b.py"), "# FIXME").unwrap();
        fs::write(moved.join("logo.png"), [0u8; 4]).unwrap();
        fs::write(moved.join("node_modules").join("c.js"), "// XXX").unwrap();
        fs::write(tmp.path().join("outside.rs"), "// HACK").unwrap();

        let discovery = discovery_for(tmp.path());
        let files = discovery.discover_under(&moved);
        assert_eq!(files, vec![moved.join("a.rs"), moved.join("deep").join("b.py")]);

        fs::create_dir_all(tmp.path().join("target").join("x")).unwrap();
        fs::write(tmp.path().join("target").join("x").join("d.rs"), "// TODO").unwrap();
        assert!(discovery.discover_under(&tmp.path().join("target").join("x")).is_empty());
        assert!(discovery.discover_under(&tmp.path().join("missing")).is_empty());
    }
}
