//! Integration tests for Vigil

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Isolated state dir, config file and workspace
    struct Sandbox {
        root: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            std::fs::create_dir_all(root.path().join("workspace")).unwrap();
            std::fs::write(
                root.path().join("config.toml"),
                "[scanner]\nengine = \"none\"\n",
            )
            .unwrap();
            Self { root }
        }

        fn workspace(&self) -> PathBuf {
            self.root.path().join("workspace")
        }

        fn config_path(&self) -> PathBuf {
            self.root.path().join("config.toml")
        }

        fn vigil(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("vigil");
            cmd.env("VIGIL_STATE_DIR", self.root.path().join("state"))
                .env("VIGIL_CONFIG", self.config_path())
                .arg("--no-local")
                .arg("--workspace")
                .arg(self.workspace());
            cmd
        }
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("vigil")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("IaC scan coordinator"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("vigil")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("vigil"));
    }

    #[test]
    fn config_path_uses_override() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[scanner]"))
            .stdout(predicate::str::contains("engine = \"none\""));
    }

    #[test]
    fn config_set_then_show() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .args(["config", "set", "scan.timeout_secs", "90"])
            .assert()
            .success();

        sandbox
            .vigil()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("timeout_secs = 90"))
            .stdout(predicate::str::contains("engine = \"none\""));
    }

    #[test]
    fn config_set_local_writes_workspace_file() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .args(["config", "set", "scanner.skip_checks", "CKV_AWS_20,CKV_AWS_21", "--local"])
            .assert()
            .success();

        let local = std::fs::read_to_string(sandbox.workspace().join(".vigil.toml")).unwrap();
        assert!(local.contains("CKV_AWS_20"));
        assert!(local.contains("CKV_AWS_21"));
    }

    #[test]
    fn config_set_rejects_unknown_key() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .args(["config", "set", "scanner.colour", "blue"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn config_set_rejects_bad_version() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .args(["config", "set", "scanner.version", "three"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid scanner version"));
    }

    #[test]
    fn config_init_does_not_overwrite() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--force"));

        let content = std::fs::read_to_string(sandbox.config_path()).unwrap();
        assert!(content.contains("engine = \"none\""));
    }

    #[test]
    fn cache_clear_succeeds() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Result cache cleared"));
    }

    #[test]
    fn version_cache_clear_succeeds() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .args(["version-cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Version cache cleared"));
    }

    #[test]
    fn info_without_install() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .arg("info")
            .assert()
            .success()
            .stdout(predicate::str::contains("Not installed"))
            .stdout(predicate::str::contains("Cached results"));
    }

    #[test]
    fn logs_path_in_state_dir() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .args(["logs", "--path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("activity.log"));
    }

    #[test]
    fn logs_show_cache_clear() {
        let sandbox = Sandbox::new();
        sandbox.vigil().args(["cache", "clear"]).assert().success();
        sandbox
            .vigil()
            .arg("logs")
            .assert()
            .success()
            .stdout(predicate::str::contains("cache.cleared"));
    }

    #[test]
    fn scan_unsupported_file() {
        let sandbox = Sandbox::new();
        let readme = sandbox.workspace().join("README.md");
        std::fs::write(&readme, "# hello\n").unwrap();

        sandbox
            .vigil()
            .arg("scan")
            .arg(&readme)
            .assert()
            .failure()
            .stderr(predicate::str::contains("not a file type the scanner supports"));
    }

    #[test]
    fn scan_missing_file() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .arg("scan")
            .arg(sandbox.workspace().join("missing.tf"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn serve_stops_on_shutdown_event() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .arg("serve")
            .write_stdin("{\"type\":\"remove_diagnostics\"}\n{\"type\":\"shutdown\"}\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("\"type\":\"clear_all\""));
    }

    #[test]
    fn serve_reports_malformed_events() {
        let sandbox = Sandbox::new();
        sandbox
            .vigil()
            .arg("serve")
            .write_stdin("this is not json\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("Ignoring malformed event"));
    }

    #[test]
    fn completions_bash() {
        cargo_bin_cmd!("vigil")
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("vigil"));
    }
}
