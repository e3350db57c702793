//! Line-oriented marker tag scanner.
//!
//! Matches a tag keyword anywhere on a line, not only inside comments, so a
//! keyword in a string literal is reported too.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ScanError;
use crate::storage::{Occurrence, Tag};

/// Bytes inspected for NUL when sniffing binary content.
const BINARY_SNIFF_LEN: usize = 8192;

/// Keyword, word boundary, optional colon, optional whitespace.
static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(todo|fixme|bug|hack|xxx)\b:?[ \t]*").expect("tag pattern is valid")
});

/// Scan text content for marker tags.
///
/// Occurrences come back ordered by line, then column. Scanning the same
/// content twice yields identical results.
#[must_use]
pub fn scan(content: &str) -> Vec<Occurrence> {
    let content = normalize_line_endings(content);
    let mut occurrences = Vec::new();

    for (index, line) in content.split('\n').enumerate() {
        let line_no = u32::try_from(index).unwrap_or(u32::MAX);
        scan_line(line, line_no, &mut occurrences);
    }

    occurrences
}

/// Scan raw file bytes, rejecting binary or non-UTF-8 content.
///
/// # Errors
///
/// Returns `ScanError::Binary` when a NUL byte appears near the start of
/// the content and `ScanError::Decode` when it is not valid UTF-8.
pub fn scan_bytes(bytes: &[u8]) -> Result<Vec<Occurrence>, ScanError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    if sniff.contains(&0) {
        return Err(ScanError::Binary);
    }

    let text = std::str::from_utf8(bytes).map_err(|e| ScanError::Decode {
        valid_up_to: e.valid_up_to(),
    })?;

    Ok(scan(text))
}

fn scan_line(line: &str, line_no: u32, out: &mut Vec<Occurrence>) {
    let matches: Vec<_> = TAG_PATTERN.captures_iter(line).collect();

    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(keyword)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Ok(tag) = keyword.as_str().parse::<Tag>() else {
            continue;
        };

        // Text runs until the next keyword on the same line.
        let text_end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(line.len(), |next| next.start());
        let text = line[whole.end()..text_end].trim();

        let column = u32::try_from(line[..keyword.start()].chars().count()).unwrap_or(u32::MAX);
        out.push(Occurrence::new(tag, text, line_no, column));
    }
}

/// Fold `\r\n` and lone `\r` into `\n`.
fn normalize_line_endings(content: &str) -> Cow<'_, str> {
    if content.contains('\r') {
        Cow::Owned(content.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(content)
    }
}
