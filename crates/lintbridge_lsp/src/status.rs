//! What the server reports back to the editor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tower_lsp::Client;
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::{Diagnostic, Url};

/// Server state shown by the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ServerStatus {
    Enabled,
    Disabled,
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uri: Option<Url>,
    },
}

impl ServerStatus {
    pub fn error(message: impl Into<String>, uri: Option<Url>) -> Self {
        Self::Error {
            message: message.into(),
            uri,
        }
    }
}

/// The `lintbridge/status` notification.
pub enum StatusNotification {}

impl Notification for StatusNotification {
    type Params = ServerStatus;
    const METHOD: &'static str = "lintbridge/status";
}

/// Destination of diagnostics and status updates.
#[async_trait]
pub trait ClientSink: Send + Sync {
    async fn publish_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    );

    async fn send_status(&self, status: ServerStatus);
}

#[async_trait]
impl ClientSink for Client {
    async fn publish_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    ) {
        Client::publish_diagnostics(self, uri, diagnostics, version).await;
    }

    async fn send_status(&self, status: ServerStatus) {
        self.send_notification::<StatusNotification>(status).await;
    }
}
