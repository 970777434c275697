//! Projection of findings into editor diagnostics
//!
//! Diagnostics leave the process through a [`DiagnosticsSink`]; user-facing
//! messages through a [`Notifier`]. `serve` uses JSON lines on stdout, the
//! one-shot `scan` command prints to the terminal.

use crate::scan::{DocumentId, Finding, Severity};
use async_trait::async_trait;
use console::style;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Source tag attached to every diagnostic
pub const DIAGNOSTIC_SOURCE: &str = "vigil";

/// Editor diagnostic level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Information,
    Hint,
}

impl DiagnosticLevel {
    /// Unknown severities are shown as warnings
    pub fn from_severity(severity: Option<Severity>) -> Self {
        match severity {
            Some(Severity::Critical | Severity::High) => Self::Error,
            Some(Severity::Medium) | None => Self::Warning,
            Some(Severity::Low) => Self::Information,
            Some(Severity::Info) => Self::Hint,
        }
    }
}

/// A 0-based line range diagnostic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub file_path: PathBuf,
    pub start_line: u32,
    pub end_line: u32,
    pub level: DiagnosticLevel,
    pub message: String,
    pub source: &'static str,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guideline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<serde_json::Value>,
}

/// Convert findings to diagnostics, one per finding
pub fn project(findings: &[Finding]) -> Vec<Diagnostic> {
    findings.iter().map(project_one).collect()
}

fn project_one(finding: &Finding) -> Diagnostic {
    let (start, end) = finding.line_range;
    let start_line = start.saturating_sub(1);
    let end_line = end.saturating_sub(1).max(start_line);

    Diagnostic {
        file_path: finding.file_path.clone(),
        start_line,
        end_line,
        level: DiagnosticLevel::from_severity(finding.severity),
        message: format!("{}: {}", finding.check_id, finding.message),
        source: DIAGNOSTIC_SOURCE,
        code: finding.check_id.clone(),
        severity: finding.severity,
        guideline: finding.guideline.clone(),
        fix: finding.fix_suggestion.clone(),
    }
}

/// Receives diagnostics for documents
#[async_trait]
pub trait DiagnosticsSink: Send + Sync {
    async fn publish(&self, document: &DocumentId, diagnostics: Vec<Diagnostic>);
    async fn clear(&self, document: &DocumentId);
    async fn clear_all(&self);
}

/// User-facing messages
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record<'a> {
    Diagnostics {
        document: &'a DocumentId,
        diagnostics: &'a [Diagnostic],
    },
    Clear {
        document: &'a DocumentId,
    },
    ClearAll,
    Notification {
        level: &'static str,
        message: &'a str,
    },
}

/// JSON-lines protocol writer used by `serve`
pub struct JsonLinesSink<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn emit(&self, record: &Record<'_>) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize record: {}", e);
                return;
            }
        };

        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            warn!("Failed to write record: {}", e);
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl<W: Write + Send> DiagnosticsSink for JsonLinesSink<W> {
    async fn publish(&self, document: &DocumentId, diagnostics: Vec<Diagnostic>) {
        self.emit(&Record::Diagnostics {
            document,
            diagnostics: &diagnostics,
        });
    }

    async fn clear(&self, document: &DocumentId) {
        self.emit(&Record::Clear { document });
    }

    async fn clear_all(&self) {
        self.emit(&Record::ClearAll);
    }
}

impl<W: Write + Send> Notifier for JsonLinesSink<W> {
    fn error(&self, message: &str) {
        self.emit(&Record::Notification {
            level: "error",
            message,
        });
    }

    fn warn(&self, message: &str) {
        self.emit(&Record::Notification {
            level: "warning",
            message,
        });
    }

    fn info(&self, message: &str) {
        self.emit(&Record::Notification {
            level: "info",
            message,
        });
    }
}

/// Terminal output for one-shot scans
#[derive(Debug, Default)]
pub struct ConsoleSink {
    published: Mutex<usize>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of diagnostics printed so far
    pub fn published(&self) -> usize {
        self.published.lock().map(|n| *n).unwrap_or(0)
    }
}

fn level_label(level: DiagnosticLevel) -> String {
    match level {
        DiagnosticLevel::Error => style("error").red().bold().to_string(),
        DiagnosticLevel::Warning => style("warning").yellow().bold().to_string(),
        DiagnosticLevel::Information => style("info").cyan().to_string(),
        DiagnosticLevel::Hint => style("hint").dim().to_string(),
    }
}

#[async_trait]
impl DiagnosticsSink for ConsoleSink {
    async fn publish(&self, document: &DocumentId, diagnostics: Vec<Diagnostic>) {
        if diagnostics.is_empty() {
            println!("{} {}: no findings", style("[OK]").green(), document);
        }
        for diag in &diagnostics {
            println!(
                "{}:{}: {} {}",
                document,
                diag.start_line + 1,
                level_label(diag.level),
                diag.message
            );
            if let Some(ref guideline) = diag.guideline {
                println!("  {}", style(guideline).dim());
            }
        }
        if let Ok(mut n) = self.published.lock() {
            *n += diagnostics.len();
        }
    }

    async fn clear(&self, _document: &DocumentId) {}

    async fn clear_all(&self) {}
}

impl Notifier for ConsoleSink {
    fn error(&self, message: &str) {
        eprintln!("{} {}", style("[ERROR]").red(), message);
    }

    fn warn(&self, message: &str) {
        eprintln!("{} {}", style("[WARN]").yellow(), message);
    }

    fn info(&self, message: &str) {
        eprintln!("{} {}", style("[INFO]").cyan(), message);
    }
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, message: &str) {
        error!("{}", message);
    }

    fn warn(&self, message: &str) {
        warn!("{}", message);
    }

    fn info(&self, message: &str) {
        info!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(check: &str, severity: Option<Severity>, lines: (u32, u32)) -> Finding {
        Finding {
            check_id: check.to_string(),
            message: "Ensure something".to_string(),
            severity,
            file_path: PathBuf::from("/w/main.tf"),
            line_range: lines,
            guideline: None,
            fix_suggestion: None,
        }
    }

    #[test]
    fn severity_levels() {
        use DiagnosticLevel::*;
        let cases = [
            (Some(Severity::Critical), Error),
            (Some(Severity::High), Error),
            (Some(Severity::Medium), Warning),
            (Some(Severity::Low), Information),
            (Some(Severity::Info), Hint),
            (None, Warning),
        ];
        for (severity, level) in cases {
            assert_eq!(DiagnosticLevel::from_severity(severity), level);
        }
    }

    #[test]
    fn lines_become_zero_based() {
        let diags = project(&[
            finding("CKV_1", None, (3, 7)),
            finding("CKV_2", None, (0, 0)),
        ]);
        assert_eq!((diags[0].start_line, diags[0].end_line), (2, 6));
        assert_eq!((diags[1].start_line, diags[1].end_line), (0, 0));
    }

    #[test]
    fn message_and_source() {
        let diags = project(&[finding("CKV_AWS_20", Some(Severity::High), (1, 2))]);
        assert_eq!(diags[0].message, "CKV_AWS_20: Ensure something");
        assert_eq!(diags[0].source, "vigil");
        assert_eq!(diags[0].code, "CKV_AWS_20");
    }

    #[tokio::test]
    async fn json_lines_records() {
        let sink = JsonLinesSink::new(Vec::new());
        let doc = DocumentId::from("file:///w/main.tf");

        sink.publish(&doc, project(&[finding("CKV_1", Some(Severity::Low), (1, 1))]))
            .await;
        sink.clear(&doc).await;
        sink.clear_all().await;
        Notifier::error(&sink, "scan failed");

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let records: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(records.len(), 4);
        assert_eq!(records[0]["type"], "diagnostics");
        assert_eq!(records[0]["document"], "file:///w/main.tf");
        assert_eq!(records[0]["diagnostics"][0]["level"], "information");
        assert_eq!(records[1]["type"], "clear");
        assert_eq!(records[2]["type"], "clear_all");
        assert_eq!(records[3]["type"], "notification");
        assert_eq!(records[3]["level"], "error");
    }

    #[tokio::test]
    async fn console_sink_counts() {
        let sink = ConsoleSink::new();
        let doc = DocumentId::from("/w/main.tf");
        sink.publish(&doc, project(&[finding("CKV_1", None, (1, 1))])).await;
        sink.publish(&doc, vec![]).await;
        assert_eq!(sink.published(), 1);
    }
}
