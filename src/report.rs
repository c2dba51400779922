use std::io::Write;

use anyhow::Result;

use crate::links::ResolvedLink;
use crate::pipeline::AnalysisReport;

const RULE_WIDTH: usize = 40;

/// Presentation boundary: the analyzer hands its report here and keeps no display state.
pub trait Reporter {
    fn report(&mut self, report: &AnalysisReport) -> Result<()>;
}

/// Plain sectioned text.
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        ConsoleReporter { out }
    }

    fn rule(&mut self) -> Result<()> {
        writeln!(self.out, "{}", "-".repeat(RULE_WIDTH))?;
        Ok(())
    }

    fn link(&mut self, link: &ResolvedLink) -> Result<()> {
        writeln!(self.out, "Original URL: {}", link.original)?;
        if link.was_unwrapped() {
            writeln!(self.out, "Decoded URL: {}", link.decoded)?;
        }
        writeln!(self.out, "Final URL: {}", or_none(link.final_destination.as_deref()))?;
        writeln!(
            self.out,
            "HTTP Status Code: {}",
            link.status_code.map(|c| c.to_string()).unwrap_or_else(|| "None".into())
        )?;
        if link.is_probable_tracker {
            writeln!(self.out, "Potential Tracking Pixel Detected: {}", link.original)?;
        }
        self.rule()
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn report(&mut self, report: &AnalysisReport) -> Result<()> {
        writeln!(self.out, "File: {}", report.path.display())?;
        writeln!(self.out, "File Type: {}", report.format.label())?;
        if report.truncated {
            writeln!(self.out, "Text truncated to {} lines (summary mode)", report.text_lines)?;
        }

        if let Some(links) = &report.links {
            self.rule()?;
            writeln!(self.out, "URL Analysis: {} link(s)", links.len())?;
            self.rule()?;
            for link in links {
                self.link(link)?;
            }
        }

        if let Some(auth) = &report.authentication {
            writeln!(self.out, "{auth}")?;
        }

        if let Some(origin) = &report.origin_ip {
            writeln!(self.out, "Sender IP: {} (from {})", origin.ip, origin.source)?;
        }
        if let Some(whois) = &report.whois {
            writeln!(self.out, "WHOIS Information ({}):\n{}", whois.server, whois.raw.trim_end())?;
        }

        for notice in &report.notices {
            writeln!(self.out, "Notice: {}", notice)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

fn or_none(v: Option<&str>) -> &str {
    v.unwrap_or("None")
}

/// Pretty JSON, one document per report.
pub struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        JsonReporter { out }
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn report(&mut self, report: &AnalysisReport) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.out, report)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
