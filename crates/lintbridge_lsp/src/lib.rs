//! LintBridge LSP Server
//!
//! Language Server Protocol front end for an external linting engine.
//! Finds and loads the engine, lints documents as they change and reports
//! results and server status to the editor.

mod config;
mod conversion;
mod debounce;
mod handler;
mod orchestrator;
mod state;
mod status;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use lintbridge_engine::{EngineProvider, EngineSpec, NodeEngineProvider, PackageManager};
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, info, warn};

pub use config::{DEFAULT_DEBOUNCE_MS, DEFAULT_INSTALL_SETTLE_MS, SETTINGS_SECTION, Settings};
pub use conversion::{DiagnosticData, to_lsp_diagnostic, to_lsp_diagnostics};
pub use debounce::Debouncer;
pub use orchestrator::{
    INSTALL_FILES, LintOrchestrator, LintOutcome, is_config_related, is_install_related,
};
pub use state::ServerLoadState;
pub use status::{ClientSink, ServerStatus, StatusNotification};

use handler::*;

/// Engine options fixed for the lifetime of the server.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Which package is the engine.
    pub spec: EngineSpec,
    /// Overrides the `packageManager` setting.
    pub package_manager: Option<PackageManager>,
}

/// The LSP backend for LintBridge.
pub struct Backend {
    /// LSP client for sending notifications.
    client: Client,
    options: ServerOptions,
    /// Replaces the Node.js engine provider, mainly for tests.
    provider: Option<Arc<dyn EngineProvider>>,
    /// Created on `initialize`, once settings and workspace are known.
    orchestrator: OnceLock<Arc<LintOrchestrator>>,
    watch_registration: AtomicBool,
}

impl Backend {
    /// Creates a backend that loads the default engine package.
    pub fn new(client: Client) -> Self {
        Self::with_options(client, ServerOptions::default())
    }

    pub fn with_options(client: Client, options: ServerOptions) -> Self {
        Self {
            client,
            options,
            provider: None,
            orchestrator: OnceLock::new(),
            watch_registration: AtomicBool::new(false),
        }
    }

    /// Creates a backend that gets its engine from `provider`.
    pub fn with_provider(client: Client, provider: Arc<dyn EngineProvider>) -> Self {
        Self {
            provider: Some(provider),
            ..Self::new(client)
        }
    }

    fn orchestrator(&self) -> Option<&Arc<LintOrchestrator>> {
        self.orchestrator.get()
    }

    fn make_provider(&self, settings: &Settings) -> Arc<dyn EngineProvider> {
        match &self.provider {
            Some(provider) => provider.clone(),
            None => {
                let manager = self.options.package_manager.or(settings.package_manager);
                Arc::new(
                    NodeEngineProvider::system(self.options.spec.clone())
                        .with_package_manager(manager),
                )
            }
        }
    }

    /// Asks the client for the settings section.
    async fn pull_settings(&self) -> Option<Settings> {
        let items = vec![ConfigurationItem {
            scope_uri: None,
            section: Some(SETTINGS_SECTION.to_string()),
        }];
        let values = self.client.configuration(items).await.ok()?;
        values.first().and_then(Settings::from_value)
    }

    async fn register_file_watchers(&self) {
        let options = DidChangeWatchedFilesRegistrationOptions {
            watchers: file_watchers(),
        };
        let registration = Registration {
            id: "lintbridge-watched-files".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: serde_json::to_value(options).ok(),
        };
        if let Err(e) = self.client.register_capability(vec![registration]).await {
            warn!("Failed to register file watchers: {}", e);
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        info!("LintBridge server initializing...");

        let settings = params
            .initialization_options
            .as_ref()
            .and_then(Settings::from_value)
            .unwrap_or_default();
        debug!("Initial settings: {:?}", settings);

        let dynamic_watch = params
            .capabilities
            .workspace
            .as_ref()
            .and_then(|w| w.did_change_watched_files.as_ref())
            .and_then(|c| c.dynamic_registration)
            .unwrap_or(false);
        self.watch_registration.store(dynamic_watch, Ordering::Relaxed);

        let orchestrator = LintOrchestrator::new(
            self.make_provider(&settings),
            Arc::new(self.client.clone()),
            settings,
        );
        orchestrator.set_workspace_root(workspace_root_from(&params));
        if self.orchestrator.set(orchestrator).is_err() {
            warn!("Ignoring repeated initialize request");
        }

        Ok(handle_initialize())
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "LintBridge server initialized")
            .await;

        if self.watch_registration.load(Ordering::Relaxed) {
            self.register_file_watchers().await;
        }

        let Some(orchestrator) = self.orchestrator().cloned() else {
            return;
        };
        tokio::spawn(async move {
            if orchestrator.settings().enable {
                orchestrator.ensure_engine().await;
            } else {
                orchestrator.send_status().await;
            }
            orchestrator.refresh_all().await;
        });
    }

    async fn shutdown(&self) -> Result<()> {
        handle_shutdown().await
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        if let Some(orchestrator) = self.orchestrator() {
            handle_did_open(orchestrator, params).await;
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        if let Some(orchestrator) = self.orchestrator() {
            handle_did_change(orchestrator, params);
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        if let Some(orchestrator) = self.orchestrator() {
            handle_did_save(orchestrator, params).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        if let Some(orchestrator) = self.orchestrator() {
            handle_did_close(orchestrator, params).await;
        }
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let Some(orchestrator) = self.orchestrator() else {
            return;
        };

        let settings = match Settings::from_value(&params.settings) {
            Some(settings) => Some(settings),
            None => self.pull_settings().await,
        };
        match settings {
            Some(settings) => orchestrator.update_settings(settings).await,
            None => warn!("Ignoring invalid settings: {}", params.settings),
        }
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        if let Some(orchestrator) = self.orchestrator() {
            handle_did_change_watched_files(orchestrator, params).await;
        }
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let Some(orchestrator) = self.orchestrator().cloned() else {
            return;
        };

        let current = orchestrator.workspace_root();
        let removed = current.as_ref().is_some_and(|root| {
            params
                .event
                .removed
                .iter()
                .any(|folder| folder.uri.to_file_path().ok().as_ref() == Some(root))
        });
        let next = if current.is_none() || removed {
            params
                .event
                .added
                .first()
                .and_then(|folder| folder.uri.to_file_path().ok())
        } else {
            current
        };

        if orchestrator.set_workspace_root(next) {
            tokio::spawn(async move {
                orchestrator.ensure_engine().await;
                orchestrator.refresh_all().await;
            });
        }
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let Some(orchestrator) = self.orchestrator() else {
            return Ok(None);
        };
        let uri = &params.text_document.uri;
        let Some(text) = orchestrator.document_text(uri) else {
            return Ok(None);
        };
        let diagnostics = orchestrator.published(uri);
        Ok(Some(handle_code_action(&text, &diagnostics, &params)))
    }
}

/// Starts the LSP server on stdin/stdout.
///
/// This function does not return unless an error occurs or the server shuts down.
pub async fn run(options: ServerOptions) {
    info!("LintBridge server starting...");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) =
        LspService::new(move |client| Backend::with_options(client, options.clone()));
    Server::new(stdin, stdout, socket).serve(service).await;
}
