use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use tracing::debug;

/// A redirect-wrapping service that embeds the real target in a query parameter.
struct WrapperScheme {
    name: &'static str,
    /// Substring that identifies the wrapper anywhere in the URL.
    marker: &'static str,
    /// Captures the still-encoded inner target.
    inner: Regex,
}

static WRAPPERS: LazyLock<Vec<WrapperScheme>> = LazyLock::new(|| {
    vec![WrapperScheme {
        name: "outlook-safelinks",
        marker: "safelinks.protection.outlook.com",
        inner: Regex::new(r"url=(http.+?)&").unwrap(),
    }]
});

/// Unwrap a single wrapper layer. `None` when no known scheme applies.
pub fn decode_once(url: &str) -> Option<String> {
    WRAPPERS.iter().find_map(|scheme| {
        if !url.contains(scheme.marker) {
            return None;
        }
        let encoded = scheme.inner.captures(url)?.get(1)?.as_str();
        let inner = percent_decode_str(encoded).decode_utf8_lossy().into_owned();
        debug!(scheme = scheme.name, inner = %inner, "unwrapped link");
        Some(inner)
    })
}

/// Unwrap known wrapper schemes until none match or `max_depth` layers are gone.
///
/// Idempotent only below the bound: a link nested more than `max_depth`
/// layers deep comes back still wrapped, and a second call unwraps further.
pub fn decode(url: &str, max_depth: usize) -> String {
    let mut current = url.to_string();
    for _ in 0..max_depth {
        match decode_once(&current) {
            Some(inner) if inner != current => current = inner,
            _ => break,
        }
    }
    current
}
