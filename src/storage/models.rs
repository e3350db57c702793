//! Data models for the tag index.
//!
//! This module defines the core data structures used for:
//! - Marker tags and their occurrences
//! - Per-file index entries with staleness metadata

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Marker keywords recognized by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tag {
    Todo,
    Fixme,
    Bug,
    Hack,
    Xxx,
}

impl Tag {
    /// All tags, in display order.
    pub const ALL: [Self; 5] = [Self::Todo, Self::Fixme, Self::Bug, Self::Hack, Self::Xxx];

    /// Canonical uppercase keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::Fixme => "FIXME",
            Self::Bug => "BUG",
            Self::Hack => "HACK",
            Self::Xxx => "XXX",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = ();

    /// Case-insensitive keyword lookup.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

/// One matched marker instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occurrence {
    /// Marker kind.
    pub tag: Tag,

    /// Trimmed trailing content, may be empty.
    pub text: String,

    /// Line number (0-based).
    pub line: u32,

    /// Character offset of the keyword within the line (0-based).
    pub column: u32,
}

impl Occurrence {
    /// Create a new occurrence.
    #[must_use]
    pub fn new(tag: Tag, text: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            tag,
            text: text.into(),
            line,
            column,
        }
    }
}

/// Modification metadata captured from the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    /// Modification time in milliseconds since the Unix epoch.
    pub modified_at: i64,
    /// Size in bytes, when known.
    pub size: Option<u64>,
}

impl FileStamp {
    /// Create a stamp from raw values.
    #[must_use]
    pub const fn new(modified_at: i64, size: Option<u64>) -> Self {
        Self { modified_at, size }
    }

    /// Capture the stamp of a file from its metadata.
    #[must_use]
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let modified_at = metadata.modified().map_or(0, system_time_millis);
        Self {
            modified_at,
            size: Some(metadata.len()),
        }
    }
}

/// Convert a `SystemTime` into milliseconds since the Unix epoch.
fn system_time_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Per-file cache record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Absolute path to the source file.
    pub path: PathBuf,

    /// Modification time the occurrences were scanned at.
    pub modified_at: i64,

    /// File size at scan time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Occurrences ordered by line, then column.
    pub occurrences: Vec<Occurrence>,
}

impl FileEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, stamp: FileStamp, occurrences: Vec<Occurrence>) -> Self {
        Self {
            path: path.into(),
            modified_at: stamp.modified_at,
            size: stamp.size,
            occurrences,
        }
    }

    /// Staleness metadata of this entry.
    #[must_use]
    pub const fn stamp(&self) -> FileStamp {
        FileStamp::new(self.modified_at, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_from_str_case_insensitive() {
        assert_eq!("todo".parse::<Tag>(), Ok(Tag::Todo));
        assert_eq!("FixMe".parse::<Tag>(), Ok(Tag::Fixme));
        assert_eq!("XXX".parse::<Tag>(), Ok(Tag::Xxx));
        assert!("NOTE".parse::<Tag>().is_err());
    }

    #[test]
    fn test_tag_serializes_uppercase() {
        let json = serde_json::to_string(&Tag::Hack).unwrap();
        assert_eq!(json, "\"HACK\"");
        let tag: Tag = serde_json::from_str("\"BUG\"").unwrap();
        assert_eq!(tag, Tag::Bug);
    }

    #[test]
    fn test_file_entry_serialization() {
        let entry = FileEntry::new(
            "/project/src/main.rs",
            FileStamp::new(1_700_000_000_000, Some(42)),
            vec![Occurrence::new(Tag::Todo, "write docs", 3, 7)],
        );

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"modifiedAt\":1700000000000"));

        let back: FileEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
        assert_eq!(back.stamp(), FileStamp::new(1_700_000_000_000, Some(42)));
    }

    #[test]
    fn test_file_entry_without_size() {
        let json = r#"{"path":"/a.rs","modifiedAt":5,"occurrences":[]}"#;
        let entry: FileEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.size, None);
    }

    #[test]
    fn test_stamp_from_metadata() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "hello").unwrap();
        let stamp = FileStamp::from_metadata(&std::fs::metadata(tmp.path()).unwrap());
        assert_eq!(stamp.size, Some(5));
        assert!(stamp.modified_at > 0);
    }
}
