//! Watched files handler.

use std::sync::Arc;

use lintbridge_engine::{CONFIG_FILES, IGNORE_FILES};
use tower_lsp::lsp_types::*;
use tracing::debug;

use crate::orchestrator::{INSTALL_FILES, LintOrchestrator};

/// Handles the `workspace/didChangeWatchedFiles` notification.
pub async fn handle_did_change_watched_files(
    orchestrator: &Arc<LintOrchestrator>,
    params: DidChangeWatchedFilesParams,
) {
    debug!("Watched files changed: {:?}", params.changes);

    let paths: Vec<_> = params
        .changes
        .iter()
        .filter_map(|change| change.uri.to_file_path().ok())
        .collect();
    orchestrator.handle_watched_files(&paths).await;
}

/// Watchers for manifests, lockfiles, `node_modules` and engine
/// configuration files.
pub fn file_watchers() -> Vec<FileSystemWatcher> {
    INSTALL_FILES
        .iter()
        .chain(CONFIG_FILES)
        .chain(IGNORE_FILES)
        .map(|name| FileSystemWatcher {
            glob_pattern: GlobPattern::String(format!("**/{name}")),
            kind: None,
        })
        .collect()
}
