//! Document lifecycle handlers (open, change, save, close).

use std::sync::Arc;

use tower_lsp::lsp_types::*;
use tracing::debug;

use crate::orchestrator::LintOrchestrator;

/// Handles the `textDocument/didOpen` notification.
pub async fn handle_did_open(orchestrator: &LintOrchestrator, params: DidOpenTextDocumentParams) {
    debug!("Document opened: {}", params.text_document.uri);

    let doc = params.text_document;
    orchestrator.open(doc.uri, doc.text, doc.version).await;
}

/// Handles the `textDocument/didChange` notification.
///
/// The server uses full sync, so the last change carries the whole text.
pub fn handle_did_change(
    orchestrator: &Arc<LintOrchestrator>,
    params: DidChangeTextDocumentParams,
) {
    debug!("Document changed: {}", params.text_document.uri);

    let Some(change) = params.content_changes.into_iter().last() else {
        return;
    };
    orchestrator.change(
        params.text_document.uri,
        change.text,
        params.text_document.version,
    );
}

/// Handles the `textDocument/didSave` notification.
pub async fn handle_did_save(orchestrator: &LintOrchestrator, params: DidSaveTextDocumentParams) {
    debug!("Document saved: {}", params.text_document.uri);
    orchestrator.save(&params.text_document.uri).await;
}

/// Handles the `textDocument/didClose` notification.
pub async fn handle_did_close(orchestrator: &LintOrchestrator, params: DidCloseTextDocumentParams) {
    debug!("Document closed: {}", params.text_document.uri);
    orchestrator.close(&params.text_document.uri).await;
}
