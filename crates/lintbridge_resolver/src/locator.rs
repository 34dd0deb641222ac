//! Global package directory discovery.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::manager::PackageManager;
use crate::trace::TraceSink;

/// Result of running a package-manager command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs read-only package-manager commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args`. Returns `Err` with a description when the
    /// program could not be started at all.
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, String>;
}

/// Spawns real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, String> {
        let binary = which::which(program).map_err(|e| format!("{program} not found: {e}"))?;

        let output = Command::new(&binary)
            .args(args)
            .env("NO_UPDATE_NOTIFIER", "1")
            .env("npm_config_update_notifier", "false")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to run {}: {e}", binary.display()))?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Finds the directory holding a package manager's global packages.
pub struct PackageManagerLocator {
    runner: Arc<dyn CommandRunner>,
    home: Option<PathBuf>,
    bun_install: Option<PathBuf>,
}

impl PackageManagerLocator {
    /// Creates a locator backed by real processes.
    pub fn system() -> Self {
        Self {
            runner: Arc::new(SystemCommandRunner),
            home: dirs::home_dir(),
            bun_install: std::env::var_os("BUN_INSTALL").map(PathBuf::from),
        }
    }

    /// Creates a locator with a custom command runner.
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            home: dirs::home_dir(),
            bun_install: None,
        }
    }

    /// Overrides the home directory used by file-based heuristics.
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Overrides `$BUN_INSTALL`.
    pub fn with_bun_install(mut self, dir: Option<PathBuf>) -> Self {
        self.bun_install = dir;
        self
    }

    /// Returns the global `node_modules` directory of `manager`, if it can
    /// be determined.
    pub async fn locate_global_root(
        &self,
        manager: PackageManager,
        trace: &dyn TraceSink,
    ) -> Option<PathBuf> {
        let found = match manager {
            PackageManager::Npm => self.locate_npm(trace).await,
            PackageManager::Yarn => self.locate_yarn(trace).await,
            PackageManager::Pnpm => self.locate_pnpm(trace).await,
            PackageManager::Bun => self.locate_bun(trace),
        };

        match &found {
            Some(path) => trace.trace(&format!(
                "Global {} packages are in {}",
                manager,
                path.display()
            )),
            None => trace.trace(&format!(
                "Could not determine the global {manager} package directory"
            )),
        }
        found
    }

    async fn locate_npm(&self, trace: &dyn TraceSink) -> Option<PathBuf> {
        if let Some(root) = self.absolute_output("npm", &["root", "-g"], trace).await {
            return Some(root);
        }

        // Fall back to the configured prefix.
        let prefix = self
            .absolute_output("npm", &["config", "get", "prefix"], trace)
            .await?;
        let candidate = npm_prefix_to_root(&prefix);
        if candidate.is_dir() {
            Some(candidate)
        } else {
            trace.trace(&format!(
                "npm prefix {} has no global module directory at {}",
                prefix.display(),
                candidate.display()
            ));
            None
        }
    }

    async fn locate_yarn(&self, trace: &dyn TraceSink) -> Option<PathBuf> {
        let dir = self
            .absolute_output("yarn", &["global", "dir"], trace)
            .await?;
        Some(dir.join("node_modules"))
    }

    async fn locate_pnpm(&self, trace: &dyn TraceSink) -> Option<PathBuf> {
        self.absolute_output("pnpm", &["root", "-g"], trace).await
    }

    fn locate_bun(&self, trace: &dyn TraceSink) -> Option<PathBuf> {
        let base = self
            .bun_install
            .clone()
            .or_else(|| self.home.as_ref().map(|h| h.join(".bun")))?;
        let candidate = base.join("install").join("global").join("node_modules");
        if candidate.is_dir() {
            Some(candidate)
        } else {
            trace.trace(&format!(
                "bun global directory {} does not exist",
                candidate.display()
            ));
            None
        }
    }

    /// Runs a command and accepts its output only if it is an absolute path.
    async fn absolute_output(
        &self,
        program: &str,
        args: &[&str],
        trace: &dyn TraceSink,
    ) -> Option<PathBuf> {
        let command_line = format!("{} {}", program, args.join(" "));
        trace.trace(&format!("Running `{command_line}`"));

        let output = match self.runner.run(program, args).await {
            Ok(output) => output,
            Err(e) => {
                trace.trace(&format!("`{command_line}` could not be run: {e}"));
                return None;
            }
        };

        if !output.success {
            trace.trace(&format!(
                "`{command_line}` failed: {}",
                output.stderr.trim()
            ));
            return None;
        }

        let Some(line) = last_non_empty_line(&output.stdout) else {
            trace.trace(&format!("`{command_line}` printed nothing"));
            return None;
        };

        let path = PathBuf::from(line);
        if path.is_absolute() {
            Some(path)
        } else {
            trace.trace(&format!(
                "`{command_line}` printed a non-absolute path: {line}"
            ));
            None
        }
    }
}

impl Default for PackageManagerLocator {
    fn default() -> Self {
        Self::system()
    }
}

/// Maps an npm prefix to its global `node_modules` directory.
fn npm_prefix_to_root(prefix: &Path) -> PathBuf {
    if cfg!(windows) {
        prefix.join("node_modules")
    } else {
        prefix.join("lib").join("node_modules")
    }
}

fn last_non_empty_line(stdout: &str) -> Option<&str> {
    stdout.lines().map(str::trim).rfind(|l| !l.is_empty())
}
