//! Findings reported by the scanner

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Severity levels the scanner and the mapping table may assign
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All severities, lowest first
    pub fn all() -> &'static [Self] {
        &[
            Self::Info,
            Self::Low,
            Self::Medium,
            Self::High,
            Self::Critical,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|sev| sev.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown severity '{}'", s))
    }
}

/// A single failed check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Check identifier (e.g. CKV_AWS_20)
    pub check_id: String,
    /// Human-readable check name
    pub message: String,
    /// Severity, when known
    pub severity: Option<Severity>,
    /// Host path of the scanned file
    pub file_path: PathBuf,
    /// 1-based inclusive line range
    pub line_range: (u32, u32),
    /// Link to remediation guidance
    pub guideline: Option<String>,
    /// Suggested replacement definition, passed through verbatim
    pub fix_suggestion: Option<serde_json::Value>,
}

impl Finding {
    /// Copy of this finding with the severity filled in, if missing
    pub fn with_default_severity(mut self, severity: Option<Severity>) -> Self {
        if self.severity.is_none() {
            self.severity = severity;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("high".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("SEVERE".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_serializes_uppercase() {
        let json = serde_json::to_string(&Severity::Medium).unwrap();
        assert_eq!(json, "\"MEDIUM\"");
    }

    #[test]
    fn default_severity_does_not_override() {
        let finding = Finding {
            check_id: "CKV_AWS_20".to_string(),
            message: "S3 bucket is public".to_string(),
            severity: Some(Severity::Low),
            file_path: PathBuf::from("/w/main.tf"),
            line_range: (1, 4),
            guideline: None,
            fix_suggestion: None,
        };
        let enriched = finding.with_default_severity(Some(Severity::High));
        assert_eq!(enriched.severity, Some(Severity::Low));
    }
}
