//! Deduplication of serialized bibliography entries.
//!
//! The remote API returns one text blob per page. Entries inside a blob are
//! separated by a blank line followed by the `@` record marker, which is the
//! boundary used here to split the concatenated text back into entries.

use std::collections::HashSet;

const ENTRY_BOUNDARY: &str = "\n\n@";

/// Outcome of deduplicating a bibliography
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deduplicated {
    /// Surviving entries, in original relative order
    pub entries: Vec<String>,
    /// Number of byte-identical entries dropped
    pub removed: usize,
    /// Citation keys of the dropped entries, one per drop
    pub duplicate_keys: Vec<String>,
    /// Citation keys seen more than once with differing text
    pub key_collisions: Vec<String>,
}

impl Deduplicated {
    /// Entries joined with blank lines
    pub fn text(&self) -> String {
        self.entries.join("\n\n")
    }
}

/// Citation key of an entry: text between the first `{` and the next `,`
pub fn citation_key(entry: &str) -> Option<&str> {
    let (_, rest) = entry.split_once('{')?;
    Some(rest.split(',').next().unwrap_or(rest))
}

/// Split concatenated bibliography text into trimmed, non-empty entries
pub fn split_entries(bibliography: &str) -> Vec<String> {
    bibliography
        .split(ENTRY_BOUNDARY)
        .enumerate()
        .filter_map(|(i, fragment)| {
            let fragment = fragment.trim();
            if fragment.is_empty() {
                return None;
            }
            if i == 0 {
                Some(fragment.to_string())
            } else {
                Some(format!("@{}", fragment))
            }
        })
        .collect()
}

/// Remove byte-identical entries and report citation key collisions.
///
/// Entries sharing a key but differing in text are kept; only their key is
/// reported. Entries without a key take part in exact-text deduplication only.
pub fn deduplicate_entries(bibliography: &str) -> Deduplicated {
    let mut seen_entries: HashSet<String> = HashSet::new();
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut result = Deduplicated::default();

    for entry in split_entries(bibliography) {
        if seen_entries.contains(&entry) {
            result.removed += 1;
            if let Some(key) = citation_key(&entry) {
                result.duplicate_keys.push(key.to_string());
            }
            continue;
        }
        if let Some(key) = citation_key(&entry) {
            if !seen_keys.insert(key.to_string()) {
                result.key_collisions.push(key.to_string());
            }
        }
        seen_entries.insert(entry.clone());
        result.entries.push(entry);
    }

    result
}
