//! Integration tests for CLI behavior
//!
//! These tests verify the external behavior of the CLI tool,
//! following behavior-driven testing principles.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper to create a command for the lintbridge CLI
fn lintbridge_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lintbridge"));
    cmd.env_remove("RUST_LOG");
    cmd
}

mod help_command {
    use super::*;

    #[test]
    fn shows_help_with_flag() {
        lintbridge_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Usage:"))
            .stdout(predicate::str::contains("doctor"));
    }

    #[test]
    fn shows_version_with_flag() {
        lintbridge_cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn rejects_unknown_package_manager() {
        lintbridge_cmd()
            .args(["--package-manager", "cargo", "doctor"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown package manager"));
    }
}

mod doctor_command {
    use super::*;

    #[test]
    fn reports_missing_engine() {
        let temp_dir = TempDir::new().unwrap();

        lintbridge_cmd()
            .args(["--engine-package", "@lintbridge-test/missing-engine", "doctor"])
            .arg(temp_dir.path())
            .assert()
            .code(1)
            .stdout(predicate::str::contains("error[not-installed]"))
            .stdout(predicate::str::contains("@lintbridge-test/missing-engine is not installed"));
    }

    #[test]
    fn names_chosen_package_manager() {
        let temp_dir = TempDir::new().unwrap();

        lintbridge_cmd()
            .args([
                "--engine-package",
                "@lintbridge-test/missing-engine",
                "--package-manager",
                "yarn",
                "doctor",
            ])
            .arg(temp_dir.path())
            .assert()
            .code(1)
            .stdout(predicate::str::contains("globally with yarn"));
    }

    #[test]
    fn detects_package_manager_from_lockfile() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("pnpm-lock.yaml"), "lockfileVersion: 9\n").unwrap();

        lintbridge_cmd()
            .args(["--engine-package", "@lintbridge-test/missing-engine", "doctor"])
            .arg(temp_dir.path())
            .assert()
            .code(1)
            .stdout(predicate::str::contains("globally with pnpm"));
    }

    #[test]
    fn fails_for_missing_directory() {
        let temp_dir = TempDir::new().unwrap();

        lintbridge_cmd()
            .arg("doctor")
            .arg(temp_dir.path().join("does-not-exist"))
            .assert()
            .code(2);
    }
}
