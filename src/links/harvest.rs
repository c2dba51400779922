use std::sync::LazyLock;

use regex::Regex;

use super::CandidateLink;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+|www\.\S+").unwrap());

/// Scan free text for URL-shaped substrings, in order of appearance.
/// Duplicates are kept.
pub fn harvest_links(text: &str) -> Vec<CandidateLink> {
    URL_RE
        .find_iter(text)
        .map(|m| CandidateLink::new(m.as_str()))
        .collect()
}
