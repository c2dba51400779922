use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "PHISHLENS";

/// Upper bound on parallel link resolutions.
pub const MAX_RESOLVE_CONCURRENCY: usize = 64;

/// Operational knobs. Loaded once in `main`, then shared read-only.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub resolve_timeout_secs: u64,
    pub max_redirects: usize,
    /// 1 keeps resolution strictly sequential.
    pub resolve_concurrency: usize,
    pub summary_lines: usize,
    pub max_unwrap_depth: usize,
    pub user_agent: String,
    pub ocr_command: String,
    pub whois_server: String,
    pub whois_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            resolve_timeout_secs: 5,
            max_redirects: 10,
            resolve_concurrency: 1,
            summary_lines: 100,
            max_unwrap_depth: 8,
            user_agent: format!("phishlens/{}", env!("CARGO_PKG_VERSION")),
            ocr_command: "tesseract".to_string(),
            whois_server: "whois.iana.org".to_string(),
            whois_timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Environment (`PHISHLENS_*`) overrides the optional TOML file, which
    /// overrides the built-in defaults.
    pub fn load(file: Option<&Path>) -> Result<Settings> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize::<Settings>()
            .context("Invalid configuration values")?;
        Ok(settings.sanitized())
    }

    fn sanitized(mut self) -> Self {
        self.resolve_concurrency = self.resolve_concurrency.clamp(1, MAX_RESOLVE_CONCURRENCY);
        self.resolve_timeout_secs = self.resolve_timeout_secs.max(1);
        self.whois_timeout_secs = self.whois_timeout_secs.max(1);
        self
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn whois_timeout(&self) -> Duration {
        Duration::from_secs(self.whois_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Extracted text is capped to `Settings::summary_lines` lines.
    Summary,
    Full,
}

/// What one `analyze` invocation should do. Built from CLI flags.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub mode: Mode,
    pub emit_links: bool,
    pub emit_headers: bool,
    pub do_whois: bool,
    /// Explicit WHOIS target; when absent the sender origin is derived from headers.
    pub whois_target: Option<String>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            mode: Mode::Full,
            emit_links: true,
            emit_headers: true,
            do_whois: false,
            whois_target: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.resolve_timeout(), Duration::from_secs(5));
        assert_eq!(s.resolve_concurrency, 1);
        assert_eq!(s.summary_lines, 100);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(f, "summary_lines = 20\nresolve_concurrency = 0").unwrap();
        let s = Settings::load(Some(f.path())).unwrap();
        assert_eq!(s.summary_lines, 20);
        // zero workers would stall the pool
        assert_eq!(s.resolve_concurrency, 1);
        assert_eq!(s.max_redirects, 10);
    }

    #[test]
    fn huge_concurrency_is_capped() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(f, "resolve_concurrency = {}", i64::MAX).unwrap();
        let s = Settings::load(Some(f.path())).unwrap();
        assert_eq!(s.resolve_concurrency, MAX_RESOLVE_CONCURRENCY);
    }
}
