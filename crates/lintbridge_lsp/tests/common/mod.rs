#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lintbridge_engine::{
    CliSurface, EngineConfig, EngineError, EngineModule, EngineProvider, EngineSpec, ImportError,
    LintOptions, LintOutput, LinterSurface, LoadError, LoadedEngine, ModuleImporter,
    PackageManager, Problem, RuleLoader, RuleModule, Severity,
};
use lintbridge_lsp::{ClientSink, ServerStatus};
use lintbridge_resolver::ModuleResolver;
use parking_lot::Mutex;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower_lsp::lsp_types::{Diagnostic, Url};

pub async fn send_msg<W: AsyncWriteExt + Unpin>(writer: &mut W, msg: &str) {
    let content = format!("Content-Length: {}\r\n\r\n{}", msg.len(), msg);
    writer.write_all(content.as_bytes()).await.unwrap();
    writer.flush().await.unwrap();
}

pub async fn recv_msg<R: AsyncReadExt + Unpin>(reader: &mut R) -> Option<String> {
    // Simple LSP parser: read headers until \r\n\r\n, parse Content-Length, read body
    let mut buffer = Vec::new();
    let mut content_length = 0;

    loop {
        let byte = reader.read_u8().await.ok()?;
        buffer.push(byte);
        if buffer.ends_with(b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buffer);
            for line in headers.lines() {
                if line.to_lowercase().starts_with("content-length:") {
                    let parts: Vec<&str> = line.split(':').collect();
                    if parts.len() == 2 {
                        content_length = parts[1].trim().parse().unwrap_or_else(|e| {
                            panic!("Failed to parse Content-Length: {e}, header: {line}")
                        });
                    }
                }
            }
            break;
        }
    }

    if content_length == 0 {
        return None;
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await.ok()?;

    Some(String::from_utf8(body).unwrap())
}

/// Reports one problem per lint call, echoing the linted text.
#[derive(Default)]
pub struct FakeLinter {
    calls: AtomicUsize,
    failing: Mutex<HashSet<PathBuf>>,
}

impl FakeLinter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes every lint of `path` fail.
    pub fn fail_for(&self, path: impl Into<PathBuf>) {
        self.failing.lock().insert(path.into());
    }

    /// Lets lints of `path` succeed again.
    pub fn recover(&self, path: &Path) {
        self.failing.lock().remove(path);
    }
}

#[async_trait]
impl LinterSurface for FakeLinter {
    async fn lint(&self, options: LintOptions) -> Result<LintOutput, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(&options.file_path) {
            return Err(EngineError::engine("Parsing error: unexpected token"));
        }
        Ok(LintOutput {
            problems: vec![Problem {
                severity: Severity::Warning,
                line: 1,
                column: 1,
                end_line: None,
                end_column: None,
                message: format!("found: {}", options.content),
                rule_id: Some("no-tabs".to_string()),
                fix: None,
                suggestions: vec![],
            }],
            ..Default::default()
        })
    }
}

/// Gives every file the same configuration unless it is ignored or
/// unconfigured.
#[derive(Default)]
pub struct FakeCli {
    ignored: Mutex<HashSet<PathBuf>>,
    unconfigured: Mutex<HashSet<PathBuf>>,
    platforms: Mutex<Vec<String>>,
}

impl FakeCli {
    pub fn ignore(&self, path: impl Into<PathBuf>) {
        self.ignored.lock().insert(path.into());
    }

    pub fn unconfigure(&self, path: impl Into<PathBuf>) {
        self.unconfigured.lock().insert(path.into());
    }

    pub fn set_platforms(&self, platforms: &[&str]) {
        *self.platforms.lock() = platforms.iter().map(|p| p.to_string()).collect();
    }
}

#[async_trait]
impl CliSurface for FakeCli {
    async fn resolve_config(
        &self,
        file: &Path,
        _cwd: &Path,
    ) -> Result<Option<EngineConfig>, EngineError> {
        if self.unconfigured.lock().contains(file) {
            return Ok(None);
        }
        Ok(Some(EngineConfig {
            platforms: self.platforms.lock().clone(),
            rules: BTreeMap::from([("no-tabs".to_string(), json!("warn"))]),
        }))
    }

    async fn is_ignored(&self, file: &Path, _cwd: &Path) -> Result<bool, EngineError> {
        Ok(self.ignored.lock().contains(file))
    }
}

/// Rule imports are never needed by the fake linter.
struct NoRules;

#[async_trait]
impl ModuleImporter for NoRules {
    async fn import_main(&self, _entry: &Path) -> Result<EngineModule, ImportError> {
        Err(ImportError::MissingExport("Linter".to_string()))
    }

    async fn import_linter(&self, _entry: &Path) -> Result<Arc<dyn LinterSurface>, ImportError> {
        Err(ImportError::MissingExport("Linter".to_string()))
    }

    async fn import_cli(&self, _entry: &Path) -> Result<Arc<dyn CliSurface>, ImportError> {
        Err(ImportError::MissingExport("resolveConfig".to_string()))
    }

    async fn import_rule(&self, name: &str, _entry: &Path) -> Result<RuleModule, ImportError> {
        Err(ImportError::MissingExport(name.to_string()))
    }
}

/// Counts load attempts and hands out engines backed by the fakes above.
pub struct FakeProvider {
    pub linter: Arc<FakeLinter>,
    pub cli: Arc<FakeCli>,
    loads: AtomicUsize,
    failing: AtomicBool,
    failing_roots: Mutex<HashSet<PathBuf>>,
    delay: Mutex<Duration>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            linter: Arc::new(FakeLinter::default()),
            cli: Arc::new(FakeCli::default()),
            loads: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            failing_roots: Mutex::new(HashSet::new()),
            delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes loads for the workspace at `root` fail.
    pub fn fail_root(&self, root: impl Into<PathBuf>) {
        self.failing_roots.lock().insert(root.into());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }
}

#[async_trait]
impl EngineProvider for FakeProvider {
    async fn try_load(&self, cwd: &Path) -> Result<Arc<LoadedEngine>, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let spec = EngineSpec::default();
        if self.failing.load(Ordering::SeqCst) || self.failing_roots.lock().contains(cwd) {
            return Err(LoadError::NotInstalled {
                package: spec.package,
                cwd: cwd.to_path_buf(),
                manager: PackageManager::Npm,
                trace: vec!["Local resolution failed".to_string()],
            });
        }

        let module_path = cwd.join("node_modules/@lintbridge/engine/dist/index.js");
        let rule_loader = RuleLoader::new(
            spec,
            cwd,
            PackageManager::Npm,
            Arc::new(ModuleResolver::system()),
            Arc::new(NoRules),
        );
        Ok(Arc::new(LoadedEngine::new(
            semver::Version::new(0, 14, 2),
            module_path,
            self.linter.clone(),
            self.cli.clone(),
            cwd.join("node_modules/@lintbridge/engine/presets"),
            Arc::new(rule_loader),
        )))
    }
}

/// Records everything the server reports.
#[derive(Default)]
pub struct RecordingSink {
    diagnostics: Mutex<Vec<(Url, Vec<Diagnostic>, Option<i32>)>>,
    statuses: Mutex<Vec<ServerStatus>>,
}

impl RecordingSink {
    /// The last diagnostics published for `uri` and their revision.
    pub fn last_for(&self, uri: &Url) -> Option<(Vec<Diagnostic>, Option<i32>)> {
        self.diagnostics
            .lock()
            .iter()
            .rev()
            .find(|(u, _, _)| u == uri)
            .map(|(_, diagnostics, version)| (diagnostics.clone(), *version))
    }

    pub fn publish_count(&self, uri: &Url) -> usize {
        self.diagnostics
            .lock()
            .iter()
            .filter(|(u, _, _)| u == uri)
            .count()
    }

    pub fn statuses(&self) -> Vec<ServerStatus> {
        self.statuses.lock().clone()
    }

    pub fn last_status(&self) -> Option<ServerStatus> {
        self.statuses.lock().last().cloned()
    }
}

#[async_trait]
impl ClientSink for RecordingSink {
    async fn publish_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    ) {
        self.diagnostics.lock().push((uri, diagnostics, version));
    }

    async fn send_status(&self, status: ServerStatus) {
        self.statuses.lock().push(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recv_msg_success() {
        let payload = r#"{"jsonrpc":"2.0","method":"abc","params":{}}"#;
        let data = format!("Content-Length: {}\r\n\r\n{}", payload.len(), payload);
        let mut cursor = std::io::Cursor::new(data.into_bytes());

        let result = recv_msg(&mut cursor).await;
        assert_eq!(result.unwrap(), payload);
    }

    #[tokio::test]
    #[should_panic(expected = "Failed to parse Content-Length")]
    async fn test_recv_msg_parse_error() {
        let data = "Content-Length: invalid\r\n\r\n{}";
        let mut cursor = std::io::Cursor::new(data.as_bytes().to_vec());
        let _ = recv_msg(&mut cursor).await;
    }
}
