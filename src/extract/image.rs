use std::path::Path;
use std::process::Command;

use tracing::debug;

use super::{ExtractedDocument, FormatExtractor};
use crate::error::ExtractError;

/// OCR through an external command that prints recognised text on stdout
/// (`tesseract <image> stdout`).
pub struct OcrExtractor {
    command: String,
}

impl OcrExtractor {
    pub fn new(command: &str) -> Self {
        OcrExtractor {
            command: command.to_string(),
        }
    }

    fn failure(&self, reason: impl Into<String>) -> ExtractError {
        ExtractError::Ocr {
            command: self.command.clone(),
            reason: reason.into(),
        }
    }
}

impl FormatExtractor for OcrExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedDocument, ExtractError> {
        debug!(command = %self.command, path = %path.display(), "running OCR");
        let output = Command::new(&self.command)
            .arg(path)
            .arg("stdout")
            .output()
            .map_err(|e| self.failure(e.to_string()))?;

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() && text.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(format!("{} ({})", output.status, stderr.trim())));
        }
        // OCR yields text only; links are harvested downstream.
        Ok(ExtractedDocument::new(text, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_command_is_an_ocr_error() {
        let ocr = OcrExtractor::new("phishlens-no-such-ocr-binary");
        let err = ocr.extract(Path::new("whatever.png")).unwrap_err();
        assert!(matches!(err, ExtractError::Ocr { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn stdout_becomes_text() {
        // `echo <path> stdout` stands in for the OCR engine.
        let ocr = OcrExtractor::new("echo");
        let doc = ocr.extract(Path::new("http://shown.example/x")).unwrap();
        assert!(doc.raw_text.contains("http://shown.example/x stdout"));
        assert!(doc.structured_links.is_empty());
    }
}
