//! Capability contracts of the external engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::rule_loader::RuleLoader;

/// Problem severity as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    #[serde(alias = "warn")]
    Warning,
    Info,
    Hint,
}

/// A text replacement expressed as UTF-16 offsets into the linted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixCommand {
    /// `[start, end)` offsets.
    pub range: (u32, u32),
    /// Replacement text.
    pub text: String,
}

/// An optional, non-automatic fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(alias = "description")]
    pub desc: String,
    pub fix: FixCommand,
}

/// One problem found by the engine. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub severity: Severity,
    pub line: u32,
    pub column: u32,
    #[serde(default)]
    pub end_line: Option<u32>,
    #[serde(default)]
    pub end_column: Option<u32>,
    pub message: String,
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub fix: Option<FixCommand>,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

/// Documentation attached to a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDocs {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Rule metadata returned when `include_metadata` is requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMeta {
    #[serde(default)]
    pub docs: Option<RuleDocs>,
    #[serde(default)]
    pub fixable: bool,
}

/// Metadata accompanying a lint result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintMetadata {
    #[serde(default)]
    pub rules: HashMap<String, RuleMeta>,
}

impl LintMetadata {
    /// Documentation URL of `rule`, if the engine reported one.
    pub fn docs_url(&self, rule: &str) -> Option<&str> {
        self.rules
            .get(rule)
            .and_then(|meta| meta.docs.as_ref())
            .and_then(|docs| docs.url.as_deref())
    }
}

/// Result of one lint call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintOutput {
    #[serde(default)]
    pub problems: Vec<Problem>,
    #[serde(default)]
    pub metadata: LintMetadata,
}

/// Input of one lint call.
pub struct LintOptions {
    pub file_path: PathBuf,
    pub content: String,
    pub cwd: PathBuf,
    pub config: EngineConfig,
    pub rule_loader: Arc<RuleLoader>,
    pub include_metadata: bool,
}

/// The engine's "linter" entry point.
#[async_trait]
pub trait LinterSurface: Send + Sync {
    async fn lint(&self, options: LintOptions) -> Result<LintOutput, EngineError>;
}

/// The engine's "CLI/config" entry point.
#[async_trait]
pub trait CliSurface: Send + Sync {
    /// Effective configuration for `file`, or `None` if no configuration
    /// applies to it.
    async fn resolve_config(&self, file: &Path, cwd: &Path)
    -> Result<Option<EngineConfig>, EngineError>;

    /// Whether `file` is excluded by an ignore file.
    async fn is_ignored(&self, file: &Path, cwd: &Path) -> Result<bool, EngineError>;
}
