//! Repository identifier hint from git remotes
//!
//! Best effort: a remote named `origin` wins, otherwise the first listed.
//! URLs that don't parse into `owner/repo` give no identifier.

use crate::installer::CommandExecutor;
use std::path::Path;
use tracing::debug;

/// Identifier used when no remote can be parsed
pub const DEFAULT_REPO_ID: &str = "vigil/scan";

/// Parse `git remote -v` output into (name, url) pairs, in listed order
pub fn parse_remotes(output: &str) -> Vec<(String, String)> {
    let mut remotes: Vec<(String, String)> = Vec::new();
    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(name), Some(url)) = (parts.next(), parts.next()) else {
            continue;
        };
        if !remotes.iter().any(|(n, _)| n == name) {
            remotes.push((name.to_string(), url.to_string()));
        }
    }
    remotes
}

/// Pick the remote to derive an identifier from
pub fn select_remote(remotes: &[(String, String)]) -> Option<&str> {
    remotes
        .iter()
        .find(|(name, _)| name == "origin")
        .or_else(|| remotes.first())
        .map(|(_, url)| url.as_str())
}

/// `owner/repo` from https, ssh:// or scp-style (`git@host:owner/repo`) URLs
pub fn repo_id_from_url(url: &str) -> Option<String> {
    let url = url.trim();

    let path = if let Some((_, rest)) = url.split_once("://") {
        // Drop user info and host
        let rest = rest.rsplit_once('@').map_or(rest, |(_, r)| r);
        rest.split_once('/')?.1
    } else if let Some((host, path)) = url.split_once(':') {
        if host.is_empty() || host.contains('/') {
            return None;
        }
        path
    } else {
        return None;
    };

    let segments: Vec<&str> = path
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .split('/')
        .filter(|s| !s.is_empty() && *s != "_git")
        .collect();

    match segments.as_slice() {
        [.., owner, repo] => Some(format!("{}/{}", owner, repo)),
        _ => None,
    }
}

/// Repository identifier for a file, falling back to [`DEFAULT_REPO_ID`]
pub async fn detect_repo_id(executor: &dyn CommandExecutor, file: &Path) -> String {
    let Some(dir) = file.parent() else {
        return DEFAULT_REPO_ID.to_string();
    };

    let args = vec![
        "-C".to_string(),
        dir.to_string_lossy().to_string(),
        "remote".to_string(),
        "-v".to_string(),
    ];

    let output = match executor.run("git", &args).await {
        Ok(out) if out.success => out.stdout,
        Ok(_) | Err(_) => {
            debug!("No git remotes for {}", dir.display());
            return DEFAULT_REPO_ID.to_string();
        }
    };

    let remotes = parse_remotes(&output);
    select_remote(&remotes)
        .and_then(repo_id_from_url)
        .unwrap_or_else(|| DEFAULT_REPO_ID.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REMOTES: &str = "upstream\thttps://github.com/acme/infra.git (fetch)\n\
                           upstream\thttps://github.com/acme/infra.git (push)\n\
                           origin\tgit@github.com:me/infra-fork.git (fetch)\n\
                           origin\tgit@github.com:me/infra-fork.git (push)\n";

    #[test]
    fn parse_remotes_dedupes_fetch_push() {
        let remotes = parse_remotes(REMOTES);
        assert_eq!(remotes.len(), 2);
        assert_eq!(remotes[0].0, "upstream");
    }

    #[test]
    fn origin_preferred() {
        let remotes = parse_remotes(REMOTES);
        assert_eq!(
            select_remote(&remotes),
            Some("git@github.com:me/infra-fork.git")
        );
    }

    #[test]
    fn first_remote_without_origin() {
        let remotes = parse_remotes("a\thttps://x/one/two (fetch)\nb\thttps://x/three/four (fetch)\n");
        assert_eq!(select_remote(&remotes), Some("https://x/one/two"));
        assert_eq!(select_remote(&[]), None);
    }

    #[test]
    fn parses_url_styles() {
        assert_eq!(
            repo_id_from_url("https://github.com/acme/infra.git").as_deref(),
            Some("acme/infra")
        );
        assert_eq!(
            repo_id_from_url("git@github.com:acme/infra.git").as_deref(),
            Some("acme/infra")
        );
        assert_eq!(
            repo_id_from_url("ssh://git@gitlab.example.com:2222/group/sub/proj.git").as_deref(),
            Some("sub/proj")
        );
        assert_eq!(
            repo_id_from_url("https://user@dev.azure.com/org/project/_git/repo").as_deref(),
            Some("project/repo")
        );
    }

    #[test]
    fn unparseable_urls_give_nothing() {
        assert_eq!(repo_id_from_url("/local/path/repo"), None);
        assert_eq!(repo_id_from_url("https://github.com/solo"), None);
        assert_eq!(repo_id_from_url("nonsense"), None);
    }
}
