//! Free-text splitting shared by validation, persistence and delivery.

use std::collections::HashSet;

/// Marker users put in front of tag names (`#joy`).
pub const TAG_MARKER: char = '#';

/// Split a comma-separated address list. Entries are trimmed and empty
/// entries dropped; no other checking happens here.
pub fn parse_external_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split whitespace-separated tag input, strip the `#` marker and keep the
/// first spelling of case-insensitive duplicates.
pub fn split_tags(raw: &str) -> Vec<String> {
    dedup_case_insensitive(
        raw.split_whitespace()
            .map(|token| token.trim_start_matches(TAG_MARKER).trim()),
    )
}

/// Split comma-separated location input, keeping the first spelling of
/// case-insensitive duplicates.
pub fn split_locations(raw: &str) -> Vec<String> {
    dedup_case_insensitive(raw.split(',').map(str::trim))
}

/// Case-folded form two names are compared by, here and in the tag and
/// location tables.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn dedup_case_insensitive<'a>(tokens: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(name_key(t)))
        .map(str::to_string)
        .collect()
}

/// Lowercase, with every run of non-alphanumeric characters collapsed to a
/// single `-` and no leading or trailing dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
