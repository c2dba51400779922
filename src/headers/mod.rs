pub mod auth;
pub mod origin;

use std::path::Path;

use tracing::debug;

use crate::error::ExtractError;
use crate::extract::{msg, FileFormat};

/// Unfolded header fields of a message, in the order they appear.
#[derive(Debug, Clone, Default)]
pub struct HeaderBlock {
    fields: Vec<(String, String)>,
}

impl HeaderBlock {
    /// Parse everything up to the first blank line. Continuation lines are
    /// joined onto their field; lines that are neither are skipped.
    pub fn parse(raw: &str) -> HeaderBlock {
        let mut fields: Vec<(String, String)> = Vec::new();

        for line in raw.lines() {
            if line.trim().is_empty() {
                break;
            }
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = fields.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) if !name.is_empty() && !name.contains(char::is_whitespace) => {
                    fields.push((name.to_string(), value.trim().to_string()));
                }
                _ => debug!(line, "skipping malformed header line"),
            }
        }

        HeaderBlock { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First value of `name` (case-insensitive).
    pub fn first<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.all(name).next()
    }

    /// Every value of `name`, top to bottom.
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Transport headers of a message file. `None` when the format carries none.
pub fn read_headers(path: &Path, format: FileFormat) -> Result<Option<HeaderBlock>, ExtractError> {
    let raw = match format {
        FileFormat::Email => {
            let bytes = std::fs::read(path)?;
            Some(String::from_utf8_lossy(&bytes).into_owned())
        }
        FileFormat::OutlookMessage => msg::transport_headers(path)?,
        _ => None,
    };
    Ok(raw.map(|r| HeaderBlock::parse(&r)).filter(|h| !h.is_empty()))
}
