//! Scanner output parsing
//!
//! The scanner may log before it prints its JSON report. Lines are discarded
//! until one starts a JSON payload; everything from there on is buffered and
//! parsed once the process exits.

use crate::error::{VigilError, VigilResult};
use crate::scan::finding::{Finding, Severity};
use regex::Regex;
use serde::Deserialize;
use std::borrow::Cow;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b\][^\x07]*\x07").expect("valid ANSI regex")
});

/// Remove terminal colour and control sequences
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_ESCAPE.replace_all(text, "")
}

/// Incrementally collects the JSON payload from stdout lines
#[derive(Debug, Default)]
pub struct OutputCollector {
    payload: String,
    started: bool,
    skipped: usize,
}

impl OutputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one stdout line
    pub fn push_line(&mut self, line: &str) {
        let line = strip_ansi(line);
        let line = line.trim_end_matches('\r');

        if !self.started {
            let trimmed = line.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                self.started = true;
            } else {
                if !trimmed.is_empty() {
                    debug!("scanner: {}", trimmed);
                }
                self.skipped += 1;
                return;
            }
        }

        self.payload.push_str(line);
        self.payload.push('\n');
    }

    /// Whether a payload has begun
    pub fn has_payload(&self) -> bool {
        self.started
    }

    /// Number of noise lines discarded before the payload
    pub fn skipped_lines(&self) -> usize {
        self.skipped
    }

    /// Parse the buffered payload
    pub fn finish(self) -> VigilResult<Vec<RawCheck>> {
        if !self.started {
            return Err(VigilError::ScanOutput(
                "scanner produced no JSON output".to_string(),
            ));
        }
        parse_report(&self.payload)
    }
}

/// A failed check as the scanner reports it
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawCheck {
    pub check_id: String,
    #[serde(default)]
    pub check_name: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub file_line_range: Vec<u32>,
    #[serde(default)]
    pub guideline: Option<String>,
    #[serde(default)]
    pub fixed_definition: Option<serde_json::Value>,
}

impl RawCheck {
    /// Convert to a finding on the scanned host file
    pub fn into_finding(self, file_path: &Path) -> Finding {
        let start = self.file_line_range.first().copied().unwrap_or(0);
        let end = self.file_line_range.get(1).copied().unwrap_or(start).max(start);
        let severity = self
            .severity
            .as_deref()
            .and_then(|s| s.parse::<Severity>().ok());

        Finding {
            check_id: self.check_id,
            message: self.check_name,
            severity,
            file_path: file_path.to_path_buf(),
            line_range: (start, end),
            guideline: self.guideline,
            fix_suggestion: self.fixed_definition.filter(|v| !v.is_null()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Many(Vec<Report>),
    One(Report),
}

#[derive(Debug, Default, Deserialize)]
struct Report {
    #[serde(default)]
    results: Option<Results>,
}

#[derive(Debug, Default, Deserialize)]
struct Results {
    #[serde(default)]
    failed_checks: Vec<RawCheck>,
}

/// Parse a report, a list of reports (one per framework) or `[]`
pub fn parse_report(payload: &str) -> VigilResult<Vec<RawCheck>> {
    let payload: Payload = serde_json::from_str(payload.trim())
        .map_err(|e| VigilError::ScanOutput(e.to_string()))?;

    let reports = match payload {
        Payload::Many(reports) => reports,
        Payload::One(report) => vec![report],
    };

    Ok(reports
        .into_iter()
        .filter_map(|r| r.results)
        .flat_map(|r| r.failed_checks)
        .collect())
}
