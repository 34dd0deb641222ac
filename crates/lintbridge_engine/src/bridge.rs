//! Calls into the engine through a Node.js child process.
//!
//! Every call spawns `node --input-type=module -e <script> <module>`, feeds a
//! JSON request on stdin and reads the JSON reply printed after
//! [`RESULT_MARKER`] on stdout. Anything the module itself prints before the
//! marker is ignored.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{BridgeError, EngineError, ImportError, RuleLoadError};
use crate::provider::{EngineModule, ModuleImporter};
use crate::rule_loader::RuleModule;
use crate::surface::{CliSurface, LintOptions, LintOutput, LinterSurface, RuleMeta};

/// Line that precedes the JSON reply on stdout.
const RESULT_MARKER: &str = "@@lintbridge-result@@";

const PRELUDE: &str = r#"
import { pathToFileURL } from 'node:url';
const MARKER = '@@lintbridge-result@@';
const readInput = async () => {
  let text = '';
  for await (const chunk of process.stdin) text += chunk;
  return text ? JSON.parse(text) : {};
};
const reply = (value) => {
  process.stdout.write('\n' + MARKER + '\n' + JSON.stringify(value ?? null) + '\n');
};
const load = (path) => import(pathToFileURL(path).href);
const pick = (mod, name) =>
  typeof mod[name] === 'function' ? mod[name] : mod.default?.[name];
const normalizeMeta = (meta) =>
  meta ? { docs: meta.docs ?? null, fixable: Boolean(meta.fixable) } : null;
"#;

const PROBE_MAIN: &str = r#"
const declared = mod.version ?? mod.default?.version;
reply({
  version: declared == null ? null : String(declared),
  exports: Object.keys(mod),
});
"#;

const PROBE_EXPORTS: &str = r#"
reply({ missing: input.names.filter((name) => typeof pick(mod, name) !== 'function') });
"#;

const PROBE_RULE: &str = r#"
const rule = mod.default ?? mod;
reply({ meta: normalizeMeta(rule?.meta) });
"#;

const LINT: &str = r#"
const loaded = new Map();
const ruleLoader = async (name) => {
  if (loaded.has(name)) return loaded.get(name);
  const path = input.rules[name];
  if (!path) throw new Error(`Rule not found: ${name}`);
  const m = await load(path);
  const rule = m.default ?? m;
  loaded.set(name, rule);
  return rule;
};
const result = await pick(mod, 'lint')({
  filePath: input.filePath,
  content: input.content,
  cwd: input.cwd,
  config: input.config,
  ruleLoader,
  includeMetadata: input.includeMetadata,
});
const rules = {};
for (const [name, meta] of Object.entries(result?.metadata?.rules ?? {})) {
  rules[name] = normalizeMeta(meta) ?? {};
}
reply({ problems: result?.problems ?? [], metadata: { rules } });
"#;

const CLI: &str = r#"
const options = { cwd: input.cwd };
if (input.op === 'resolveConfig') {
  reply((await pick(mod, 'resolveConfig')(input.file, options)) ?? null);
} else {
  reply(Boolean(await pick(mod, 'isIgnored')(input.file, options)));
}
"#;

fn script(body: &str) -> String {
    format!(
        "{PRELUDE}\ntry {{\nconst input = await readInput();\nconst mod = await load(process.argv[1]);\n{body}\n}} catch (e) {{\n  process.stderr.write(String(e?.message ?? e));\n  process.exitCode = 1;\n}}\n"
    )
}

/// Extracts the reply that follows the last result marker.
fn parse_reply(stdout: &str) -> Result<Value, BridgeError> {
    let (_, reply) = stdout
        .rsplit_once(RESULT_MARKER)
        .ok_or_else(|| BridgeError::InvalidOutput("no result was printed".to_string()))?;
    serde_json::from_str(reply.trim()).map_err(|e| BridgeError::InvalidOutput(e.to_string()))
}

fn decode<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T, BridgeError> {
    serde_json::from_value(value).map_err(|e| BridgeError::InvalidOutput(e.to_string()))
}

/// Runs scripts against a module with the `node` executable.
#[derive(Debug, Clone, Default)]
pub struct NodeRuntime {
    node: Option<PathBuf>,
}

impl NodeRuntime {
    /// Uses the first `node` on `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a specific `node` executable.
    pub fn with_node(node: impl Into<PathBuf>) -> Self {
        Self {
            node: Some(node.into()),
        }
    }

    /// Imports `module` and evaluates `body` with `mod` and `input` in scope.
    pub async fn run(
        &self,
        body: &str,
        module: &Path,
        input: &Value,
    ) -> Result<Value, BridgeError> {
        let node = match &self.node {
            Some(node) => node.clone(),
            None => which::which("node")?,
        };
        debug!("Running {} against {}", node.display(), module.display());

        let mut child = Command::new(&node)
            .arg("--input-type=module")
            .arg("-e")
            .arg(script(body))
            .arg(module)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.to_string().as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("node exited with {}", output.status));
            return Err(BridgeError::Exit {
                code: output.status.code(),
                message,
            });
        }

        parse_reply(&String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Deserialize)]
struct MainProbe {
    version: Option<String>,
    #[serde(default)]
    exports: Vec<String>,
}

#[derive(Deserialize)]
struct ExportsProbe {
    missing: Vec<String>,
}

#[derive(Deserialize)]
struct RuleProbe {
    meta: Option<RuleMeta>,
}

/// Imports engine modules through [`NodeRuntime`].
#[derive(Debug, Clone)]
pub struct NodeImporter {
    runtime: Arc<NodeRuntime>,
}

impl NodeImporter {
    pub fn new(runtime: NodeRuntime) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }

    async fn require_functions(&self, entry: &Path, names: &[&str]) -> Result<(), ImportError> {
        let probe: ExportsProbe = decode(
            self.runtime
                .run(PROBE_EXPORTS, entry, &json!({ "names": names }))
                .await?,
        )?;
        match probe.missing.into_iter().next() {
            Some(name) => Err(ImportError::MissingExport(name)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ModuleImporter for NodeImporter {
    async fn import_main(&self, entry: &Path) -> Result<EngineModule, ImportError> {
        let probe: MainProbe = decode(self.runtime.run(PROBE_MAIN, entry, &json!({})).await?)?;
        Ok(EngineModule {
            version: probe.version,
            exports: probe.exports,
        })
    }

    async fn import_linter(&self, entry: &Path) -> Result<Arc<dyn LinterSurface>, ImportError> {
        self.require_functions(entry, &["lint"]).await?;
        Ok(Arc::new(NodeLinter {
            runtime: self.runtime.clone(),
            entry: entry.to_path_buf(),
        }))
    }

    async fn import_cli(&self, entry: &Path) -> Result<Arc<dyn CliSurface>, ImportError> {
        self.require_functions(entry, &["resolveConfig", "isIgnored"])
            .await?;
        Ok(Arc::new(NodeCli {
            runtime: self.runtime.clone(),
            entry: entry.to_path_buf(),
        }))
    }

    async fn import_rule(&self, name: &str, entry: &Path) -> Result<RuleModule, ImportError> {
        let probe: RuleProbe = decode(self.runtime.run(PROBE_RULE, entry, &json!({})).await?)?;
        Ok(RuleModule {
            name: name.to_string(),
            path: entry.to_path_buf(),
            meta: probe.meta,
        })
    }
}

/// The engine's linter entry point.
pub struct NodeLinter {
    runtime: Arc<NodeRuntime>,
    entry: PathBuf,
}

#[async_trait]
impl LinterSurface for NodeLinter {
    async fn lint(&self, options: LintOptions) -> Result<LintOutput, EngineError> {
        // Rules are resolved on this side so the engine sees the same rule
        // modules the loader cached.
        let mut rules = Map::new();
        for name in options.config.enabled_rules() {
            match options.rule_loader.load(name).await {
                Ok(rule) => {
                    rules.insert(
                        name.to_string(),
                        Value::String(rule.path.to_string_lossy().into_owned()),
                    );
                }
                Err(RuleLoadError::NotFound(_) | RuleLoadError::InvalidName(_)) => {
                    debug!("Rule '{}' is not provided by the engine package", name);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let input = json!({
            "filePath": options.file_path,
            "content": options.content,
            "cwd": options.cwd,
            "config": options.config,
            "rules": rules,
            "includeMetadata": options.include_metadata,
        });
        let value = self.runtime.run(LINT, &self.entry, &input).await?;
        Ok(decode(value)?)
    }
}

/// The engine's configuration entry point.
pub struct NodeCli {
    runtime: Arc<NodeRuntime>,
    entry: PathBuf,
}

impl NodeCli {
    async fn call(&self, op: &str, file: &Path, cwd: &Path) -> Result<Value, EngineError> {
        let input = json!({ "op": op, "file": file, "cwd": cwd });
        Ok(self.runtime.run(CLI, &self.entry, &input).await?)
    }
}

#[async_trait]
impl CliSurface for NodeCli {
    async fn resolve_config(
        &self,
        file: &Path,
        cwd: &Path,
    ) -> Result<Option<EngineConfig>, EngineError> {
        match self.call("resolveConfig", file, cwd).await? {
            Value::Null => Ok(None),
            value => Ok(Some(decode(value)?)),
        }
    }

    async fn is_ignored(&self, file: &Path, cwd: &Path) -> Result<bool, EngineError> {
        match self.call("isIgnored", file, cwd).await? {
            Value::Bool(ignored) => Ok(ignored),
            other => Err(EngineError::engine(format!(
                "isIgnored returned {other} instead of a boolean"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_reply_uses_last_marker() {
        let stdout = format!(
            "engine says hi\n{RESULT_MARKER}\n{{\"a\":1}}\nnoise\n{RESULT_MARKER}\n{{\"a\":2}}\n"
        );
        assert_eq!(parse_reply(&stdout).unwrap(), json!({ "a": 2 }));
    }

    #[test]
    fn test_parse_reply_without_marker() {
        assert!(matches!(
            parse_reply("just logs\n"),
            Err(BridgeError::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_script_wraps_body() {
        let source = script(PROBE_MAIN);
        assert!(source.contains(RESULT_MARKER));
        assert!(source.contains("process.argv[1]"));
        assert!(source.contains("mod.version"));
    }

    #[tokio::test]
    async fn test_import_real_module() {
        // Needs a Node.js runtime.
        if which::which("node").is_err() {
            return;
        }

        let dir = tempdir().unwrap();
        let main = dir.path().join("index.mjs");
        fs::write(
            &main,
            "console.log('loading');\nexport const version = '0.15.1';\nexport function lint() {}\n",
        )
        .unwrap();

        let importer = NodeImporter::new(NodeRuntime::new());
        let module = importer.import_main(&main).await.unwrap();
        assert_eq!(module.version.as_deref(), Some("0.15.1"));
        assert!(module.exports.contains(&"lint".to_string()));

        assert!(importer.import_linter(&main).await.is_ok());
        assert!(matches!(
            importer.import_cli(&main).await,
            Err(ImportError::MissingExport(name)) if name == "resolveConfig"
        ));
    }

    #[tokio::test]
    async fn test_import_throwing_module() {
        if which::which("node").is_err() {
            return;
        }

        let dir = tempdir().unwrap();
        let main = dir.path().join("broken.mjs");
        fs::write(&main, "throw new Error('boom');\n").unwrap();

        let importer = NodeImporter::new(NodeRuntime::new());
        let err = importer.import_main(&main).await.unwrap_err();
        assert!(err.to_string().contains("boom"), "{err}");
    }
}
