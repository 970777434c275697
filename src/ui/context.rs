//! Terminal detection

use std::io::IsTerminal;

/// Environment variables that mark a CI run
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// Whether spinners and colours are appropriate
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    fancy: bool,
}

impl UiContext {
    /// Fancy output only on an interactive stderr outside CI
    pub fn detect() -> Self {
        let ci = CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            fancy: std::io::stderr().is_terminal() && !ci,
        }
    }

    /// Plain output, as used in tests and pipes
    pub fn plain() -> Self {
        Self { fancy: false }
    }

    pub fn use_fancy_output(&self) -> bool {
        self.fancy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_context_is_not_fancy() {
        assert!(!UiContext::plain().use_fancy_output());
    }
}
