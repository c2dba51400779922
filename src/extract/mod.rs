pub mod eml;
pub mod image;
pub mod msg;
pub mod pdf;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use scraper::{Html, Selector};
use serde::Serialize;

use crate::config::Settings;
use crate::error::ExtractError;

const OLE_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const SNIFF_LEN: usize = 4096;

/// Header names that open an RFC-822 message (case-insensitive).
const RFC822_LEADERS: &[&str] = &[
    "received:",
    "return-path:",
    "delivered-to:",
    "from:",
    "to:",
    "subject:",
    "date:",
    "message-id:",
    "mime-version:",
    "authentication-results:",
    "arc-seal:",
    "dkim-signature:",
    "x-",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Image,
    Pdf,
    OutlookMessage,
    Email,
    Unknown,
}

impl FileFormat {
    pub fn label(self) -> &'static str {
        match self {
            FileFormat::Image => "image",
            FileFormat::Pdf => "application/pdf",
            FileFormat::OutlookMessage => "application/vnd.ms-outlook",
            FileFormat::Email => "message/rfc822",
            FileFormat::Unknown => "unknown",
        }
    }

    /// Formats that carry mail transport headers.
    pub fn is_message(self) -> bool {
        matches!(self, FileFormat::OutlookMessage | FileFormat::Email)
    }
}

/// Text and links pulled out of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub raw_text: String,
    /// Links the format exposes structurally (PDF annotations, HTML hrefs).
    pub structured_links: Vec<String>,
    pub truncated: bool,
}

impl ExtractedDocument {
    pub fn new(raw_text: String, structured_links: Vec<String>) -> Self {
        ExtractedDocument {
            raw_text,
            structured_links,
            truncated: false,
        }
    }

    /// Keep only the first `max_lines` lines of text.
    pub fn truncated_to(mut self, max_lines: usize) -> Self {
        if self.raw_text.lines().count() > max_lines {
            self.raw_text = self
                .raw_text
                .lines()
                .take(max_lines)
                .collect::<Vec<_>>()
                .join("\n");
            self.truncated = true;
        }
        self
    }
}

/// Adapter from a file on disk to `(text, structured links)`.
pub trait FormatExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedDocument, ExtractError>;
}

pub fn extractor_for(format: FileFormat, settings: &Settings) -> Result<Box<dyn FormatExtractor>, ExtractError> {
    match format {
        FileFormat::Image => Ok(Box::new(image::OcrExtractor::new(&settings.ocr_command))),
        FileFormat::Pdf => Ok(Box::new(pdf::PdfExtractor)),
        FileFormat::OutlookMessage => Ok(Box::new(msg::MsgExtractor)),
        FileFormat::Email => Ok(Box::new(eml::EmlExtractor)),
        FileFormat::Unknown => Err(ExtractError::Unsupported),
    }
}

/// Identify a file by content, falling back to its extension.
pub fn identify(path: &Path) -> std::io::Result<FileFormat> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?.take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    Ok(match detect_format(&head) {
        FileFormat::Unknown => format_from_extension(path),
        found => found,
    })
}

/// Detect format from leading bytes.
pub fn detect_format(data: &[u8]) -> FileFormat {
    if data.starts_with(b"%PDF-") {
        return FileFormat::Pdf;
    }
    if data.starts_with(OLE_SIGNATURE) {
        return FileFormat::OutlookMessage;
    }
    if is_image(data) {
        return FileFormat::Image;
    }
    if looks_like_rfc822(data) {
        return FileFormat::Email;
    }
    FileFormat::Unknown
}

fn is_image(data: &[u8]) -> bool {
    data.starts_with(b"\x89PNG\r\n\x1a\n")
        || data.starts_with(&[0xFF, 0xD8, 0xFF])
        || data.starts_with(b"GIF87a")
        || data.starts_with(b"GIF89a")
        || data.starts_with(b"BM")
        || data.starts_with(b"II*\x00")
        || data.starts_with(b"MM\x00*")
        || (data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP")
}

fn looks_like_rfc822(data: &[u8]) -> bool {
    let text = String::from_utf8_lossy(data);
    let Some(first) = text.lines().find(|l| !l.trim().is_empty()) else {
        return false;
    };
    let lower = first.to_ascii_lowercase();
    let leads_with_header = RFC822_LEADERS.iter().any(|h| lower.starts_with(h))
        && lower.split_once(':').is_some_and(|(name, _)| !name.contains(' '));
    if !leads_with_header {
        return false;
    }
    // A lone "From:" line is not enough; require a second header in the block.
    text.lines()
        .take_while(|l| !l.trim().is_empty())
        .filter(|l| !l.starts_with([' ', '\t']) && l.contains(':'))
        .count()
        >= 2
}

/// Web `href` targets of an HTML body's anchors, in document order.
pub(crate) fn html_hrefs(html: &str) -> Vec<String> {
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    Html::parse_document(html)
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .map(|h| h.trim().to_string())
        .filter(|h| {
            let lower = h.to_ascii_lowercase();
            lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.")
        })
        .collect()
}

fn format_from_extension(path: &Path) -> FileFormat {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tif" | "tiff" | "webp" => FileFormat::Image,
        "pdf" => FileFormat::Pdf,
        "msg" => FileFormat::OutlookMessage,
        "eml" => FileFormat::Email,
        _ => FileFormat::Unknown,
    }
}
