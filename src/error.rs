use std::path::PathBuf;

use thiserror::Error;

/// A format adapter could not produce text for a file.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parse error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Outlook message has no readable body: {0}")]
    Msg(String),

    #[error("Email could not be parsed")]
    Email,

    #[error("OCR command '{command}' failed: {reason}")]
    Ocr { command: String, reason: String },

    #[error("Unsupported file type")]
    Unsupported,
}

/// Why a single link could not be resolved. Never escapes the resolver.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum WhoisError {
    #[error("connect to {server} failed: {source}")]
    Connect {
        server: String,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out querying {0}")]
    Timeout(String),

    #[error("empty answer from {0}")]
    Empty(String),
}

/// The only error that stops an analysis before it starts.
#[derive(Error, Debug)]
#[error("File not found: {}", .0.display())]
pub struct PathNotFound(pub PathBuf);
