//! Pass/fail/absent verdicts read from an `Authentication-Results` field.
//!
//! This is a substring heuristic over text the receiving mail system already
//! wrote. Nothing is verified cryptographically and no DNS is queried, so a
//! `dkim=pass` inside a comment or for a foreign domain still reads as a pass.

use std::fmt;

use serde::Serialize;

use super::HeaderBlock;

pub const AUTH_RESULTS_HEADER: &str = "Authentication-Results";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    Spf,
    Dkim,
    Dmarc,
    Arc,
}

impl Mechanism {
    pub const ALL: [Mechanism; 4] = [Mechanism::Spf, Mechanism::Dkim, Mechanism::Dmarc, Mechanism::Arc];

    fn token(self) -> &'static str {
        match self {
            Mechanism::Spf => "spf",
            Mechanism::Dkim => "dkim",
            Mechanism::Dmarc => "dmarc",
            Mechanism::Arc => "arc",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mechanism::Spf => "SPF",
            Mechanism::Dkim => "DKIM",
            Mechanism::Dmarc => "DMARC",
            Mechanism::Arc => "ARC",
        }
    }

    /// `<mechanism>=pass` occurs somewhere in the value. Plain substring
    /// search, so `dmarc=pass` also satisfies ARC.
    fn passed_in(self, value: &str) -> bool {
        value.contains(&format!("{}=pass", self.token()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    /// The field was missing or unusable. Never the same thing as `Fail`.
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArcVerdict {
    Signed,
    NotSigned,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthenticationVerdict {
    pub spf: Verdict,
    pub dkim: Verdict,
    pub dmarc: Verdict,
    pub arc: ArcVerdict,
}

impl AuthenticationVerdict {
    pub fn absent() -> Self {
        AuthenticationVerdict {
            spf: Verdict::Absent,
            dkim: Verdict::Absent,
            dmarc: Verdict::Absent,
            arc: ArcVerdict::Absent,
        }
    }

    /// Evaluate each mechanism independently against one raw field value.
    /// A missing or blank value makes every mechanism absent.
    pub fn from_value(value: Option<&str>) -> Self {
        let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
            return AuthenticationVerdict::absent();
        };
        let verdict = |m: Mechanism| if m.passed_in(value) { Verdict::Pass } else { Verdict::Fail };

        AuthenticationVerdict {
            spf: verdict(Mechanism::Spf),
            dkim: verdict(Mechanism::Dkim),
            dmarc: verdict(Mechanism::Dmarc),
            arc: if Mechanism::Arc.passed_in(value) {
                ArcVerdict::Signed
            } else {
                ArcVerdict::NotSigned
            },
        }
    }

    /// Verdicts from the first `Authentication-Results` field of a header block.
    pub fn from_headers(headers: Option<&HeaderBlock>) -> Self {
        AuthenticationVerdict::from_value(headers.and_then(|h| h.first(AUTH_RESULTS_HEADER)))
    }

    /// Human-readable verdict for one mechanism, e.g. "pass" or "No DKIM found".
    pub fn describe(&self, mechanism: Mechanism) -> String {
        let word = match mechanism {
            Mechanism::Spf => self.spf.word(),
            Mechanism::Dkim => self.dkim.word(),
            Mechanism::Dmarc => self.dmarc.word(),
            Mechanism::Arc => self.arc.word(),
        };
        word.map(str::to_string)
            .unwrap_or_else(|| format!("No {} found", mechanism.label()))
    }
}

impl Verdict {
    fn word(self) -> Option<&'static str> {
        match self {
            Verdict::Pass => Some("pass"),
            Verdict::Fail => Some("fail"),
            Verdict::Absent => None,
        }
    }
}

impl ArcVerdict {
    fn word(self) -> Option<&'static str> {
        match self {
            ArcVerdict::Signed => Some("signed"),
            ArcVerdict::NotSigned => Some("not signed"),
            ArcVerdict::Absent => None,
        }
    }
}

/// One `LABEL: verdict` line per mechanism.
impl fmt::Display for AuthenticationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = Mechanism::ALL
            .iter()
            .map(|m| format!("{}: {}", m.label(), self.describe(*m)))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}
