/// Lexical markers of open/read tracking endpoints.
const TRACKER_MARKERS: &[&str] = &["open?", "track"];

/// Heuristic: does this (still wrapped) URL look like a tracking pixel?
/// False positives and negatives are expected.
pub fn is_probable_tracker(url: &str) -> bool {
    TRACKER_MARKERS.iter().any(|m| url.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_markers() {
        assert!(is_probable_tracker("https://mail.example.com/track/open?id=123"));
    }

    #[test]
    fn single_marker() {
        assert!(is_probable_tracker("https://t.example.com/open?u=1"));
        assert!(is_probable_tracker("https://example.com/tracking.gif"));
    }

    #[test]
    fn ordinary_link() {
        assert!(!is_probable_tracker("https://example.com/opened/page"));
        assert!(!is_probable_tracker(""));
    }
}
