use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{AnalysisOptions, Mode, Settings};
use crate::error::PathNotFound;
use crate::extract::{self, ExtractedDocument, FileFormat};
use crate::headers::auth::AuthenticationVerdict;
use crate::headers::origin::{sender_origin, OriginIp};
use crate::headers::{self, HeaderBlock};
use crate::links::harvest::harvest_links;
use crate::links::resolve::{resolve_all, BatchOptions, LinkResolver};
use crate::links::{CandidateLink, ResolvedLink};
use crate::whois::{WhoisLookup, WhoisRecord};

/// Everything one analysis produced. Steps that were not requested stay `None`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub path: PathBuf,
    pub format: FileFormat,
    pub analyzed_at: DateTime<Utc>,
    pub mode: Mode,
    pub text_lines: usize,
    pub truncated: bool,
    pub links: Option<Vec<ResolvedLink>>,
    pub authentication: Option<AuthenticationVerdict>,
    pub origin_ip: Option<OriginIp>,
    pub whois: Option<WhoisRecord>,
    /// Non-fatal problems met along the way.
    pub notices: Vec<String>,
}

impl AnalysisReport {
    fn new(path: &Path, mode: Mode) -> Self {
        AnalysisReport {
            path: path.to_path_buf(),
            format: FileFormat::Unknown,
            analyzed_at: Utc::now(),
            mode,
            text_lines: 0,
            truncated: false,
            links: None,
            authentication: None,
            origin_ip: None,
            whois: None,
            notices: Vec::new(),
        }
    }

    fn notice(&mut self, msg: String) {
        warn!("{}", msg);
        self.notices.push(msg);
    }
}

/// Sequences extraction, link resolution, header verdicts and WHOIS for one file.
pub struct Analyzer {
    settings: Settings,
    resolver: Arc<dyn LinkResolver>,
    whois: Arc<dyn WhoisLookup>,
    show_progress: bool,
}

impl Analyzer {
    pub fn new(settings: Settings, resolver: Arc<dyn LinkResolver>, whois: Arc<dyn WhoisLookup>) -> Self {
        Analyzer {
            settings,
            resolver,
            whois,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Fails only when `path` does not exist; every later step degrades instead.
    pub async fn analyze(&self, path: &Path, opts: &AnalysisOptions) -> Result<AnalysisReport, PathNotFound> {
        if !path.exists() {
            return Err(PathNotFound(path.to_path_buf()));
        }

        let mut report = AnalysisReport::new(path, opts.mode);
        report.format = match extract::identify(path) {
            Ok(format) => format,
            Err(e) => {
                report.notice(format!("Could not identify file type: {e}"));
                FileFormat::Unknown
            }
        };
        info!("File type: {}", report.format.label());

        if opts.emit_links {
            let doc = self.extract_document(path, opts.mode, &mut report);
            report.text_lines = doc.raw_text.lines().count();
            report.truncated = doc.truncated;

            let candidates = candidate_links(&doc);
            info!("Found {} candidate links", candidates.len());
            let batch = BatchOptions::from_settings(&self.settings, self.show_progress);
            report.links = Some(resolve_all(Arc::clone(&self.resolver), &candidates, &batch).await);
        }

        let header_block = if (opts.emit_headers || opts.do_whois) && report.format.is_message() {
            self.read_headers(path, &mut report)
        } else {
            None
        };

        if opts.emit_headers {
            if !report.format.is_message() {
                report.notice(format!(
                    "Header analysis needs an .eml or .msg message, not {}",
                    report.format.label()
                ));
            }
            report.authentication = Some(AuthenticationVerdict::from_headers(header_block.as_ref()));
        }

        if opts.do_whois {
            self.run_whois(opts, header_block.as_ref(), &mut report).await;
        }

        Ok(report)
    }

    fn extract_document(&self, path: &Path, mode: Mode, report: &mut AnalysisReport) -> ExtractedDocument {
        let doc = match extract::extractor_for(report.format, &self.settings).and_then(|x| x.extract(path)) {
            Ok(doc) => doc,
            Err(e) => {
                report.notice(format!("Extraction failed: {e}"));
                ExtractedDocument::default()
            }
        };

        match mode {
            Mode::Summary => doc.truncated_to(self.settings.summary_lines),
            Mode::Full => doc,
        }
    }

    fn read_headers(&self, path: &Path, report: &mut AnalysisReport) -> Option<HeaderBlock> {
        match headers::read_headers(path, report.format) {
            Ok(block) => block,
            Err(e) => {
                report.notice(format!("Could not read message headers: {e}"));
                None
            }
        }
    }

    async fn run_whois(&self, opts: &AnalysisOptions, headers: Option<&HeaderBlock>, report: &mut AnalysisReport) {
        let target = match &opts.whois_target {
            Some(target) => target.clone(),
            None => match headers.and_then(sender_origin) {
                Some(origin) => {
                    info!("Sender origin {} (from {})", origin.ip, origin.source);
                    let ip = origin.ip.to_string();
                    report.origin_ip = Some(origin);
                    ip
                }
                None => {
                    report.notice("No sender IP found for WHOIS; pass --whois-ip".to_string());
                    return;
                }
            },
        };

        match self.whois.lookup(&target).await {
            Ok(record) => report.whois = Some(record),
            Err(e) => report.notice(format!("WHOIS lookup failed: {e}")),
        }
    }
}

/// Structured links when the format supplied any, otherwise links harvested from text.
pub fn candidate_links(doc: &ExtractedDocument) -> Vec<CandidateLink> {
    if doc.structured_links.is_empty() {
        harvest_links(&doc.raw_text)
    } else {
        doc.structured_links.iter().map(CandidateLink::new).collect()
    }
}
