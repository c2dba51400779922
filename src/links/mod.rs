pub mod decode;
pub mod harvest;
pub mod resolve;
pub mod tracking;

use serde::Serialize;

/// A link as found in the document, before any unwrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateLink {
    pub original: String,
}

impl CandidateLink {
    pub fn new(original: impl Into<String>) -> Self {
        CandidateLink {
            original: original.into(),
        }
    }
}

/// Outcome of a network resolution. Both fields are absent when it failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub final_url: Option<String>,
    pub status_code: Option<u16>,
}

impl Resolution {
    pub fn unresolved() -> Self {
        Resolution::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLink {
    pub original: String,
    /// Same as `original` unless a wrapper scheme matched.
    pub decoded: String,
    pub final_destination: Option<String>,
    pub status_code: Option<u16>,
    pub is_probable_tracker: bool,
}

impl ResolvedLink {
    pub fn was_unwrapped(&self) -> bool {
        self.original != self.decoded
    }
}
