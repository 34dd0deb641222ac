//! Decides when documents are linted and keeps the engine loaded.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lintbridge_cache::{CacheKey, LintingCache};
use lintbridge_engine::{
    CONFIG_FILES, EngineError, EngineProvider, IGNORE_FILES, LintOptions, LoadedEngine,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tower_lsp::lsp_types::{Diagnostic, Url};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::conversion::to_lsp_diagnostics;
use crate::debounce::Debouncer;
use crate::state::{DocumentData, ServerLoadState};
use crate::status::{ClientSink, ServerStatus};

/// File names whose changes may mean the engine was just installed.
pub const INSTALL_FILES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "bun.lock",
    "node_modules",
];

/// How one lint request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintOutcome {
    /// Not a local file, no workspace, linting disabled or no engine.
    Ineligible,
    /// The file is ignored or has no configuration.
    NoConfig,
    /// A cached result was published.
    CacheHit,
    /// The engine ran and its result was published.
    Linted,
    /// The engine failed; diagnostics were cleared.
    Failed,
    /// The document changed or closed while linting; nothing was published.
    Discarded,
}

/// How the load in flight ended.
#[derive(Clone, Copy)]
enum LoadEnd {
    Succeeded,
    Failed,
    /// The workspace changed while loading; the result is dropped.
    Abandoned,
}

/// Marks the load in flight as finished when dropped, whichever way the
/// load ends, and wakes callers waiting for it.
struct LoadGuard<'a> {
    state: &'a Mutex<ServerLoadState>,
    done: &'a Notify,
    end: LoadEnd,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.state.lock();
            match self.end {
                LoadEnd::Succeeded => state.finish(true),
                LoadEnd::Failed => state.finish(false),
                LoadEnd::Abandoned => state.abandon(),
            }
        }
        self.done.notify_waiters();
    }
}

/// Lint policy for one server session.
pub struct LintOrchestrator {
    provider: Arc<dyn EngineProvider>,
    sink: Arc<dyn ClientSink>,
    engine: RwLock<Option<Arc<LoadedEngine>>>,
    load_state: Mutex<ServerLoadState>,
    load_done: Notify,
    last_load_error: Mutex<Option<String>>,
    cache: Mutex<LintingCache<Vec<Diagnostic>>>,
    documents: RwLock<HashMap<Url, DocumentData>>,
    published: RwLock<HashMap<Url, Vec<Diagnostic>>>,
    /// Documents whose last lint failed and was reported in the status.
    failed_documents: Mutex<HashSet<Url>>,
    settings: RwLock<Settings>,
    workspace_root: RwLock<Option<PathBuf>>,
    edits: Debouncer<Url>,
    retry: Debouncer<()>,
}

impl LintOrchestrator {
    pub fn new(
        provider: Arc<dyn EngineProvider>,
        sink: Arc<dyn ClientSink>,
        settings: Settings,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            sink,
            engine: RwLock::new(None),
            load_state: Mutex::new(ServerLoadState::default()),
            load_done: Notify::new(),
            last_load_error: Mutex::new(None),
            cache: Mutex::new(LintingCache::default()),
            documents: RwLock::new(HashMap::new()),
            published: RwLock::new(HashMap::new()),
            failed_documents: Mutex::new(HashSet::new()),
            settings: RwLock::new(settings),
            workspace_root: RwLock::new(None),
            edits: Debouncer::new(),
            retry: Debouncer::new(),
        })
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn load_state(&self) -> ServerLoadState {
        *self.load_state.lock()
    }

    pub fn current_engine(&self) -> Option<Arc<LoadedEngine>> {
        self.engine.read().clone()
    }

    pub fn workspace_root(&self) -> Option<PathBuf> {
        self.workspace_root.read().clone()
    }

    pub fn cached_results(&self) -> usize {
        self.cache.lock().len()
    }

    /// Diagnostics last published for `uri`.
    pub fn published(&self, uri: &Url) -> Vec<Diagnostic> {
        self.published.read().get(uri).cloned().unwrap_or_default()
    }

    /// Text of an open document.
    pub fn document_text(&self, uri: &Url) -> Option<String> {
        self.documents.read().get(uri).map(|doc| doc.text.clone())
    }

    /// Switches to another workspace root.
    ///
    /// A different root drops the current engine and cached results and
    /// forgets a previous load failure. Returns whether the root changed.
    pub fn set_workspace_root(&self, root: Option<PathBuf>) -> bool {
        {
            let mut current = self.workspace_root.write();
            if *current == root {
                return false;
            }
            info!("Workspace root: {:?}", root);
            *current = root;
        }

        self.engine.write().take();
        self.cache.lock().clear();
        self.load_state.lock().clear_failure();
        self.last_load_error.lock().take();
        self.retry.cancel(&());
        true
    }

    /// Returns the current engine, loading it first if needed.
    ///
    /// Only one load runs at a time; concurrent callers wait for it and see
    /// its result. After a failed load this returns `None` without trying
    /// again until a retry succeeds.
    pub async fn ensure_engine(&self) -> Option<Arc<LoadedEngine>> {
        loop {
            if let Some(engine) = self.current_engine() {
                return Some(engine);
            }
            let root = self.workspace_root()?;

            let finished = self.load_done.notified();
            let (loading, began) = {
                let mut state = self.load_state.lock();
                if state.is_loading() {
                    (true, false)
                } else {
                    (false, state.try_begin_load())
                }
            };

            if loading {
                debug!("Engine load in progress, waiting for it");
                finished.await;
                continue;
            }
            if !began {
                debug!("Previous engine load failed, not retrying");
                return None;
            }
            return self.run_load(root).await;
        }
    }

    /// Retries a failed load. Does nothing unless the last load failed and
    /// none is in flight.
    pub async fn retry_load(&self) -> Option<Arc<LoadedEngine>> {
        let root = self.workspace_root()?;
        if !self.load_state.lock().try_begin_retry() {
            return None;
        }
        info!("Retrying engine load");
        self.run_load(root).await
    }

    /// Runs one load attempt. The caller has already marked it as started.
    async fn run_load(&self, root: PathBuf) -> Option<Arc<LoadedEngine>> {
        let mut guard = LoadGuard {
            state: &self.load_state,
            done: &self.load_done,
            end: LoadEnd::Failed,
        };

        let result = self.provider.try_load(&root).await;

        if self.workspace_root().as_deref() != Some(root.as_path()) {
            debug!("Workspace changed during load, discarding result");
            guard.end = LoadEnd::Abandoned;
            return None;
        }

        match result {
            Ok(engine) => {
                self.install_engine(engine.clone());
                self.last_load_error.lock().take();
                guard.end = LoadEnd::Succeeded;
                drop(guard);
                self.send_status().await;
                Some(engine)
            }
            Err(err) => {
                error!("{}", err);
                for line in err.trace() {
                    debug!("  {}", line);
                }
                *self.last_load_error.lock() = Some(err.to_string());
                drop(guard);
                self.send_status().await;
                None
            }
        }
    }

    fn install_engine(&self, engine: Arc<LoadedEngine>) {
        let mut current = self.engine.write();
        let replaced = current
            .as_ref()
            .is_some_and(|old| !old.same_installation(&engine));
        if replaced {
            info!("Engine changed, clearing cached results");
            self.cache.lock().clear();
        }
        *current = Some(engine);
    }

    /// Sends the status matching the current state.
    pub async fn send_status(&self) {
        let status = if !self.settings.read().enable {
            ServerStatus::Disabled
        } else if let Some(message) = self.last_load_error.lock().clone() {
            ServerStatus::error(message, None)
        } else {
            ServerStatus::Enabled
        };
        self.sink.send_status(status).await;
    }

    /// Records an opened document and lints it.
    pub async fn open(&self, uri: Url, text: String, version: i32) {
        self.documents
            .write()
            .insert(uri.clone(), DocumentData { text, version });
        self.lint_document(&uri).await;
    }

    /// Records new content and schedules a lint once edits pause.
    pub fn change(self: &Arc<Self>, uri: Url, text: String, version: i32) {
        self.documents
            .write()
            .insert(uri.clone(), DocumentData { text, version });

        let delay = Duration::from_millis(self.settings.read().debounce_ms);
        let this = Arc::clone(self);
        let key = uri.clone();
        self.edits.schedule(key, delay, async move {
            this.lint_document(&uri).await;
        });
    }

    /// Lints a saved document right away.
    pub async fn save(&self, uri: &Url) {
        self.edits.cancel(uri);
        self.lint_document(uri).await;
    }

    /// Forgets a closed document and clears its diagnostics.
    pub async fn close(&self, uri: &Url) {
        self.edits.cancel(uri);
        self.documents.write().remove(uri);
        self.published.write().remove(uri);
        self.sink.publish_diagnostics(uri.clone(), vec![], None).await;
        self.recover(uri).await;
    }

    /// Lints one open document and publishes the result.
    pub async fn lint_document(&self, uri: &Url) -> LintOutcome {
        let doc = self.documents.read().get(uri).cloned();
        let Some(doc) = doc else {
            debug!("Not linting {}: document is not open", uri);
            return LintOutcome::Ineligible;
        };

        let Some((path, root, engine)) = self.eligible(uri) else {
            self.publish(uri, vec![], doc.version).await;
            return LintOutcome::Ineligible;
        };
        debug!("Linting {} (revision {})", uri, doc.version);

        let cli = engine.cli().clone();
        match cli.is_ignored(&path, &root).await {
            Ok(false) => {}
            Ok(true) => {
                debug!("{} is ignored", path.display());
                return self
                    .publish_if_current(uri, vec![], doc.version, LintOutcome::NoConfig)
                    .await;
            }
            Err(err) => return self.fail(uri, doc.version, err).await,
        }

        let config = match cli.resolve_config(&path, &root).await {
            Ok(Some(config)) => config.normalized(),
            Ok(None) => {
                debug!("No configuration applies to {}", path.display());
                return self
                    .publish_if_current(uri, vec![], doc.version, LintOutcome::NoConfig)
                    .await;
            }
            Err(err) => return self.fail(uri, doc.version, err).await,
        };

        let key = CacheKey::new(
            uri.as_str(),
            engine.version().to_string(),
            doc.version,
            config.hash(),
        );
        let use_cache = self.settings.read().cache;
        if use_cache {
            let hit = self.cache.lock().get(&key);
            if let Some(diagnostics) = hit {
                debug!("Cache hit for {}", key);
                return self
                    .publish_if_current(uri, diagnostics, doc.version, LintOutcome::CacheHit)
                    .await;
            }
        }

        let options = LintOptions {
            file_path: path,
            content: doc.text,
            cwd: root,
            config,
            rule_loader: engine.rule_loader().clone(),
            include_metadata: true,
        };
        let output = match engine.linter().lint(options).await {
            Ok(output) => output,
            Err(err) => return self.fail(uri, doc.version, err).await,
        };

        let diagnostics = to_lsp_diagnostics(&output);
        if self.settings.read().cache {
            self.cache.lock().set(key, diagnostics.clone());
        }
        self.publish_if_current(uri, diagnostics, doc.version, LintOutcome::Linted)
            .await
    }

    /// Returns the file path, workspace root and engine for a lintable
    /// document.
    fn eligible(&self, uri: &Url) -> Option<(PathBuf, PathBuf, Arc<LoadedEngine>)> {
        if uri.scheme() != "file" {
            return None;
        }
        let path = uri.to_file_path().ok()?;
        let root = self.workspace_root()?;
        if !self.settings.read().enable {
            return None;
        }
        let engine = self.current_engine()?;
        Some((path, root, engine))
    }

    /// Whether results for `version` of `uri` may still be published.
    fn is_current(&self, uri: &Url, version: i32) -> bool {
        let open = self
            .documents
            .read()
            .get(uri)
            .is_some_and(|doc| doc.version == version);
        open && self.settings.read().enable
    }

    async fn publish_if_current(
        &self,
        uri: &Url,
        diagnostics: Vec<Diagnostic>,
        version: i32,
        outcome: LintOutcome,
    ) -> LintOutcome {
        if !self.is_current(uri, version) {
            debug!("Discarding stale result for {} (revision {})", uri, version);
            return LintOutcome::Discarded;
        }
        self.publish(uri, diagnostics, version).await;
        self.recover(uri).await;
        outcome
    }

    /// Replaces a per-document error status once that document lints again.
    async fn recover(&self, uri: &Url) {
        if self.failed_documents.lock().remove(uri) {
            debug!("{} recovered from a failed lint", uri);
            self.send_status().await;
        }
    }

    async fn fail(&self, uri: &Url, version: i32, err: EngineError) -> LintOutcome {
        warn!("Linting {} failed: {}", uri, err);
        if self.is_current(uri, version) {
            self.publish(uri, vec![], version).await;
        }
        self.failed_documents.lock().insert(uri.clone());
        self.sink
            .send_status(ServerStatus::error(err.to_string(), Some(uri.clone())))
            .await;
        LintOutcome::Failed
    }

    async fn publish(&self, uri: &Url, diagnostics: Vec<Diagnostic>, version: i32) {
        self.published
            .write()
            .insert(uri.clone(), diagnostics.clone());
        self.sink
            .publish_diagnostics(uri.clone(), diagnostics, Some(version))
            .await;
    }

    /// Lints every open document.
    pub async fn refresh_all(&self) {
        let uris: Vec<Url> = self.documents.read().keys().cloned().collect();
        debug!("Refreshing {} documents", uris.len());
        for uri in uris {
            self.lint_document(&uri).await;
        }
    }

    /// Publishes empty diagnostics for every open document.
    pub async fn clear_all_diagnostics(&self) {
        let docs: Vec<(Url, i32)> = self
            .documents
            .read()
            .iter()
            .map(|(uri, doc)| (uri.clone(), doc.version))
            .collect();
        for (uri, version) in docs {
            self.publish(&uri, vec![], version).await;
        }
    }

    /// Applies new settings.
    pub async fn update_settings(&self, settings: Settings) {
        let previous = std::mem::replace(&mut *self.settings.write(), settings.clone());

        if previous.cache && !settings.cache {
            self.cache.lock().clear();
        }

        if !settings.enable {
            if previous.enable {
                info!("Linting disabled");
                self.clear_all_diagnostics().await;
            }
            self.send_status().await;
            return;
        }

        if !previous.differs_materially(&settings) {
            self.send_status().await;
            return;
        }

        if !previous.enable {
            info!("Linting enabled");
            self.ensure_engine().await;
        }
        self.send_status().await;
        self.refresh_all().await;
    }

    /// Reacts to watched-file events.
    pub async fn handle_watched_files(self: &Arc<Self>, paths: &[PathBuf]) {
        if paths.iter().any(|p| is_install_related(p)) {
            self.schedule_retry();
        }

        if paths.iter().any(|p| is_config_related(p)) {
            info!("Configuration changed, relinting open documents");
            self.cache.lock().clear();
            self.refresh_all().await;
        }
    }

    /// Schedules a reload after an install-related event, if the last load
    /// failed. Rapid events collapse into one retry.
    fn schedule_retry(self: &Arc<Self>) {
        if !self.load_state.lock().can_retry() {
            debug!("Ignoring install event: no failed load to retry");
            return;
        }

        let delay = Duration::from_millis(self.settings.read().install_settle_ms);
        debug!("Retrying engine load in {:?}", delay);
        let this = Arc::clone(self);
        self.retry.schedule((), delay, async move {
            if this.retry_load().await.is_some() {
                this.refresh_all().await;
            }
        });
    }

    /// Whether an engine reload is waiting for the settle window.
    pub fn retry_pending(&self) -> bool {
        self.retry.is_pending(&())
    }
}

fn file_name_in(path: &Path, names: &[&str]) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| names.contains(&name))
}

/// Manifests, lockfiles and dependency directories.
pub fn is_install_related(path: &Path) -> bool {
    file_name_in(path, INSTALL_FILES)
}

/// Engine configuration and ignore files.
pub fn is_config_related(path: &Path) -> bool {
    file_name_in(path, CONFIG_FILES) || file_name_in(path, IGNORE_FILES)
}
