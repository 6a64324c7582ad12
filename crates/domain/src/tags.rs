//! Tag normalization

use std::collections::BTreeSet;

/// Normalize one raw tag: keep Unicode letters and digits, drop everything
/// else, lowercase the result. A tag of pure punctuation normalizes to the
/// empty string, which callers must tolerate.
pub fn normalize_tag(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalize a raw tag list into a set. Returns `None` when normalization
/// is disabled, so downstream consumers can tell "no tags" apart from
/// "normalization turned off".
pub fn normalize_tags(raw: &[String], enabled: bool) -> Option<BTreeSet<String>> {
    enabled.then(|| raw.iter().map(|tag| normalize_tag(tag)).collect())
}
