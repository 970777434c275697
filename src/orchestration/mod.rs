//! Orchestration module for container engines
//!
//! Provides the container operations used to install and run the scanner:
//! - Docker (preferred when `scanner.engine = "auto"`)
//! - Podman

mod engine;
mod factory;
mod runtime;

pub use engine::{CliRuntime, Engine};
pub use factory::{create_runtime, EngineChoice};
pub use runtime::ContainerRuntime;

/// Max number of output lines to include in error messages.
const ERROR_TAIL_LINES: usize = 20;

/// Extract the useful tail of process output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub(crate) fn error_tail(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout
        .lines()
        .chain(stderr.lines())
        .filter(|l| !l.trim().is_empty())
        .collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > ERROR_TAIL_LINES {
        lines[total - ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_tail_keeps_last_lines() {
        let stderr: String = (0..30).map(|i| format!("line {}\n", i)).collect();
        let tail = error_tail("", &stderr);
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }

    #[test]
    fn error_tail_skips_blank_lines() {
        assert_eq!(error_tail("\n\nout\n", "\nerr\n"), "out\nerr");
    }
}
