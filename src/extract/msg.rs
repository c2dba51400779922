use std::fs::File;
use std::io::Read;
use std::path::Path;

use cfb::CompoundFile;
use tracing::debug;

use super::{html_hrefs, ExtractedDocument, FormatExtractor};
use crate::error::ExtractError;

// MAPI property streams, "__substg1.0_" + tag + type.
const BODY: &str = "1000";
const HTML_BODY: &str = "1013";
const TRANSPORT_HEADERS: &str = "007D";

const UNICODE: &str = "001F";
const STRING8: &str = "001E";
const BINARY: &str = "0102";

/// Outlook compound-file message (`.msg`).
pub struct MsgExtractor;

impl FormatExtractor for MsgExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedDocument, ExtractError> {
        let mut msg = cfb::open(path)?;

        let body = string_property(&mut msg, BODY);
        let html = property_stream(&mut msg, HTML_BODY, BINARY)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .or_else(|| string_property(&mut msg, HTML_BODY));

        let links = html.as_deref().map(html_hrefs).unwrap_or_default();
        debug!(plain = body.is_some(), html = html.is_some(), links = links.len(), "msg bodies");
        match body.or(html) {
            Some(text) => Ok(ExtractedDocument::new(text, links)),
            None => Err(ExtractError::Msg(path.display().to_string())),
        }
    }
}

/// Raw transport header block stored with the message, if any.
pub fn transport_headers(path: &Path) -> Result<Option<String>, ExtractError> {
    let mut msg = cfb::open(path)?;
    Ok(string_property(&mut msg, TRANSPORT_HEADERS))
}

fn string_property(msg: &mut CompoundFile<File>, tag: &str) -> Option<String> {
    if let Some(raw) = property_stream(msg, tag, UNICODE) {
        return Some(decode_utf16le(&raw));
    }
    property_stream(msg, tag, STRING8)
        .map(|raw| String::from_utf8_lossy(&raw).trim_end_matches('\0').to_string())
}

fn property_stream(msg: &mut CompoundFile<File>, tag: &str, kind: &str) -> Option<Vec<u8>> {
    let name = format!("/__substg1.0_{tag}{kind}");
    if !msg.is_stream(&name) {
        return None;
    }
    let mut buf = Vec::new();
    msg.open_stream(&name).ok()?.read_to_end(&mut buf).ok()?;
    Some(buf)
}

fn decode_utf16le(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units).trim_end_matches('\0').to_string()
}
