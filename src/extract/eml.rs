use std::path::Path;

use mail_parser::MessageParser;

use super::{html_hrefs, ExtractedDocument, FormatExtractor};
use crate::error::ExtractError;

/// RFC-822 message (`.eml`). Text comes from the decoded plain body; `href`
/// targets of the HTML body, when there is one, become structured links.
pub struct EmlExtractor;

impl FormatExtractor for EmlExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedDocument, ExtractError> {
        let raw = std::fs::read(path)?;
        parse_message(&raw)
    }
}

pub(crate) fn parse_message(raw: &[u8]) -> Result<ExtractedDocument, ExtractError> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or(ExtractError::Email)?;

    let text = message
        .body_text(0)
        .map(|t| t.into_owned())
        .unwrap_or_default();
    let links = message
        .body_html(0)
        .map(|html| html_hrefs(&html))
        .unwrap_or_default();

    Ok(ExtractedDocument::new(text, links))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_quoted_printable_body() {
        let raw = b"From: a@example.org\r\nTo: b@example.org\r\nSubject: verify\r\n\
MIME-Version: 1.0\r\nContent-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\r\n\
Please verify at https://login.example.com/verify?id=3D42 today.\r\n";
        let doc = parse_message(raw).unwrap();
        assert!(doc.raw_text.contains("https://login.example.com/verify?id=42"));
    }

    #[test]
    fn html_alternative_gives_hrefs() {
        let raw = b"From: a@example.org\r\nSubject: s\r\nMIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\r\n\
--b1\r\nContent-Type: text/plain\r\n\r\nOpen the portal\r\n\
--b1\r\nContent-Type: text/html\r\n\r\n<a href=\"https://portal.example/x\">Open the portal</a>\r\n\
--b1--\r\n";
        let doc = parse_message(raw).unwrap();
        assert!(doc.raw_text.contains("Open the portal"));
        assert_eq!(doc.structured_links, vec!["https://portal.example/x"]);
    }

    #[test]
    fn fixture_file() {
        let doc = EmlExtractor.extract(Path::new("tests/fixtures/phish.eml")).unwrap();
        assert!(doc.raw_text.contains("safelinks.protection.outlook.com"));
    }
}
