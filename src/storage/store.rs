//! In-memory index of marker occurrences per file.
//!
//! The store is the single owner of index state. Readers get an immutable
//! [`IndexSnapshot`]; writers go through `apply`/`remove`. Snapshots share the
//! map with the store until the next write, which copies on demand.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use super::models::{FileEntry, FileStamp, Occurrence};

type EntryMap = HashMap<PathBuf, Arc<FileEntry>>;

#[derive(Default)]
struct StoreState {
    entries: Arc<EntryMap>,
    revision: u64,
}

/// Mapping from file path to its occurrences and staleness metadata.
#[derive(Default)]
pub struct IndexStore {
    state: RwLock<StoreState>,
}

impl IndexStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `path` with `occurrences`.
    ///
    /// An empty occurrence list removes the entry instead of storing an empty
    /// one. Returns `true` if the store changed.
    pub fn apply(&self, path: &Path, occurrences: Vec<Occurrence>, stamp: FileStamp) -> bool {
        if occurrences.is_empty() {
            return self.remove(path);
        }

        let entry = Arc::new(FileEntry::new(path, stamp, occurrences));
        let mut state = self.state.write();
        Arc::make_mut(&mut state.entries).insert(path.to_path_buf(), entry);
        state.revision += 1;
        true
    }

    /// Drop the entry for `path`. Returns `true` if one existed.
    pub fn remove(&self, path: &Path) -> bool {
        let mut state = self.state.write();
        if !state.entries.contains_key(path) {
            return false;
        }
        Arc::make_mut(&mut state.entries).remove(path);
        state.revision += 1;
        true
    }

    /// Drop the entries for `paths` with a single revision bump. Returns the
    /// number removed.
    pub fn remove_many(&self, paths: &[PathBuf]) -> usize {
        let mut state = self.state.write();
        let present = paths
            .iter()
            .filter(|p| state.entries.contains_key(p.as_path()))
            .count();
        if present == 0 {
            return 0;
        }

        let entries = Arc::make_mut(&mut state.entries);
        for path in paths {
            entries.remove(path);
        }
        state.revision += 1;
        present
    }

    /// Drop every entry at or below `dir`. Returns the number removed.
    pub fn remove_under(&self, dir: &Path) -> usize {
        let mut state = self.state.write();
        let doomed: Vec<PathBuf> = state
            .entries
            .keys()
            .filter(|p| p.starts_with(dir))
            .cloned()
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        let entries = Arc::make_mut(&mut state.entries);
        for path in &doomed {
            entries.remove(path);
        }
        state.revision += 1;
        doomed.len()
    }

    /// Replace the whole store, e.g. with entries loaded from the cache.
    ///
    /// Entries without occurrences are dropped.
    pub fn replace_all(&self, entries: impl IntoIterator<Item = FileEntry>) {
        let map: EntryMap = entries
            .into_iter()
            .filter(|e| !e.occurrences.is_empty())
            .map(|e| (e.path.clone(), Arc::new(e)))
            .collect();

        let mut state = self.state.write();
        state.entries = Arc::new(map);
        state.revision += 1;
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries = Arc::new(EntryMap::new());
        state.revision += 1;
    }

    /// Check whether `path` needs scanning given its current metadata.
    ///
    /// True when no entry exists, the modification time differs, or a size
    /// is given and differs from the stored one.
    #[must_use]
    pub fn is_stale(&self, path: &Path, modified_at: i64, size: Option<u64>) -> bool {
        let state = self.state.read();
        state.entries.get(path).map_or(true, |entry| {
            entry.modified_at != modified_at || (size.is_some() && entry.size != size)
        })
    }

    /// Take an immutable view of the current index.
    #[must_use]
    pub fn snapshot(&self) -> IndexSnapshot {
        let state = self.state.read();
        IndexSnapshot {
            entries: Arc::clone(&state.entries),
            revision: state.revision,
        }
    }

    /// Number of indexed files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Whether no file has occurrences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutation counter, bumped on every effective change.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }
}

/// Immutable view of the index at one point in time.
#[derive(Clone, Default)]
pub struct IndexSnapshot {
    entries: Arc<EntryMap>,
    revision: u64,
}

impl IndexSnapshot {
    /// Occurrences for `path`, or `None` if the file has none.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&[Occurrence]> {
        self.entries.get(path).map(|e| e.occurrences.as_slice())
    }

    /// Full entry for `path`.
    #[must_use]
    pub fn entry(&self, path: &Path) -> Option<&FileEntry> {
        self.entries.get(path).map(AsRef::as_ref)
    }

    /// Whether `path` has any occurrences.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Iterate over entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values().map(AsRef::as_ref)
    }

    /// Owned entries sorted by path.
    #[must_use]
    pub fn to_entries(&self) -> Vec<FileEntry> {
        let mut entries: Vec<FileEntry> = self.iter().cloned().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// Number of indexed files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total occurrences across all files.
    #[must_use]
    pub fn total_occurrences(&self) -> usize {
        self.iter().map(|e| e.occurrences.len()).sum()
    }

    /// Store revision this snapshot was taken at.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }
}

impl std::fmt::Debug for IndexSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSnapshot")
            .field("files", &self.entries.len())
            .field("revision", &self.revision)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Tag;

    fn occ(line: u32) -> Occurrence {
        Occurrence::new(Tag::Todo, format!("item {line}"), line, 0)
    }

    #[test]
    fn test_apply_and_get() {
        let store = IndexStore::new();
        let path = Path::new("/p/a.rs");
        assert!(store.apply(path, vec![occ(1), occ(4)], FileStamp::new(10, Some(3))));

        let snap = store.snapshot();
        assert_eq!(snap.get(path).unwrap(), &[occ(1), occ(4)]);
        assert_eq!(snap.total_occurrences(), 2);
    }

    #[test]
    fn test_apply_replaces_wholesale() {
        let store = IndexStore::new();
        let path = Path::new("/p/a.rs");
        store.apply(path, vec![occ(1), occ(2)], FileStamp::new(1, None));
        store.apply(path, vec![occ(9)], FileStamp::new(2, None));

        assert_eq!(store.snapshot().get(path).unwrap(), &[occ(9)]);
    }

    #[test]
    fn test_apply_empty_removes_entry() {
        let store = IndexStore::new();
        let path = Path::new("/p/a.rs");
        store.apply(path, vec![occ(1)], FileStamp::new(1, None));
        store.apply(path, vec![], FileStamp::new(2, None));

        let snap = store.snapshot();
        assert!(snap.get(path).is_none());
        assert!(!snap.contains(path));
        assert!(store.is_empty());
    }

    #[test]
    fn test_apply_empty_on_missing_is_noop() {
        let store = IndexStore::new();
        let before = store.revision();
        assert!(!store.apply(Path::new("/x"), vec![], FileStamp::new(1, None)));
        assert_eq!(store.revision(), before);
    }

    #[test]
    fn test_is_stale() {
        let store = IndexStore::new();
        let path = Path::new("/p/a.rs");
        assert!(store.is_stale(path, 100, None));

        store.apply(path, vec![occ(0)], FileStamp::new(100, Some(20)));
        assert!(!store.is_stale(path, 100, None));
        assert!(!store.is_stale(path, 100, Some(20)));
        assert!(store.is_stale(path, 101, None));
        assert!(store.is_stale(path, 100, Some(21)));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let store = IndexStore::new();
        let a = Path::new("/p/a.rs");
        let b = Path::new("/p/b.rs");
        store.apply(a, vec![occ(0)], FileStamp::new(1, None));

        let snap = store.snapshot();
        store.apply(b, vec![occ(1)], FileStamp::new(1, None));
        store.remove(a);

        assert!(snap.contains(a));
        assert!(!snap.contains(b));
        assert_eq!(snap.len(), 1);
        assert!(store.snapshot().revision() > snap.revision());
    }

    #[test]
    fn test_remove_under_directory() {
        let store = IndexStore::new();
        store.apply(Path::new("/p/gen/a.rs"), vec![occ(0)], FileStamp::new(1, None));
        store.apply(Path::new("/p/gen/sub/b.rs"), vec![occ(0)], FileStamp::new(1, None));
        store.apply(Path::new("/p/generated.rs"), vec![occ(0)], FileStamp::new(1, None));

        assert_eq!(store.remove_under(Path::new("/p/gen")), 2);
        assert_eq!(store.len(), 1);
        assert!(store.snapshot().contains(Path::new("/p/generated.rs")));
        assert_eq!(store.remove_under(Path::new("/p/gen")), 0);
    }

    #[test]
    fn test_remove_many_bumps_revision_once() {
        let store = IndexStore::new();
        store.apply(Path::new("/p/a.rs"), vec![occ(0)], FileStamp::new(1, None));
        store.apply(Path::new("/p/b.rs"), vec![occ(0)], FileStamp::new(1, None));
        store.apply(Path::new("/p/c.rs"), vec![occ(0)], FileStamp::new(1, None));
        let before = store.revision();

        let gone = vec![
            PathBuf::from("/p/a.rs"),
            PathBuf::from("/p/b.rs"),
            PathBuf::from("/p/missing.rs"),
        ];
        assert_eq!(store.remove_many(&gone), 2);
        assert_eq!(store.revision(), before + 1);
        assert_eq!(store.len(), 1);

        assert_eq!(store.remove_many(&gone), 0);
        assert_eq!(store.revision(), before + 1);
    }

    #[test]
    fn test_replace_all_drops_empty_entries() {
        let store = IndexStore::new();
        store.replace_all(vec![
            FileEntry::new("/a", FileStamp::new(1, None), vec![occ(0)]),
            FileEntry::new("/b", FileStamp::new(1, None), vec![]),
        ]);

        let snap = store.snapshot();
        assert!(snap.contains(Path::new("/a")));
        assert!(!snap.contains(Path::new("/b")));
    }

    #[test]
    fn test_clear_and_to_entries_sorted() {
        let store = IndexStore::new();
        store.apply(Path::new("/z"), vec![occ(0)], FileStamp::new(1, None));
        store.apply(Path::new("/a"), vec![occ(0)], FileStamp::new(1, None));

        let paths: Vec<_> = store
            .snapshot()
            .to_entries()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(paths, vec![PathBuf::from("/a"), PathBuf::from("/z")]);

        store.clear();
        assert!(store.snapshot().is_empty());
    }
}
