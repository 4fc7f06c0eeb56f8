use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, info, warn};

use crate::config::{ANALYSIS_DEBOUNCE_MS, DECORATION_FLUSH_DEBOUNCE_MS, DecorationsMode, Settings};
use crate::exec::{CommandRunner, TokioCommandRunner};
use crate::lsp::code_action::generate_update_actions;
use crate::lsp::debounce::Debouncer;
use crate::lsp::decorations::generate_inlay_hints;
use crate::lsp::diagnostics::{DiagnosticGenerator, PackageDecision, create_diagnostic};
use crate::parser::package_json::PackageJsonParser;
use crate::parser::types::{DependencyDeclaration, is_lockfile, is_package_json};
use crate::version::client::RegistryClient;
use crate::version::installed::InstalledInspector;
use crate::version::registries::{FallbackRegistry, NpmCliRegistry, NpmRegistry};
use crate::version::registry::{AdvisorySource, Registry};

const LOCKFILE_GLOBS: [&str; 2] = ["**/package-lock.json", "**/pnpm-lock.yaml"];
const WATCHER_REGISTRATION_ID: &str = "outdated-lsp-lockfiles";

/// What the server knows about one open manifest
#[derive(Debug, Default)]
struct DocumentState {
    content: String,
    /// Declarations of the running pass, shown as "checking"
    checking: Vec<DependencyDeclaration>,
    packages: Vec<PackageDecision>,
}

/// Client features negotiated at initialization
#[derive(Debug, Default)]
struct ClientFeatures {
    inlay_hint_refresh: AtomicBool,
    watched_files_registration: AtomicBool,
}

/// State shared with debounced analysis tasks
struct ServerState {
    client: Client,
    generator: DiagnosticGenerator,
    settings: RwLock<Settings>,
    documents: RwLock<HashMap<Url, DocumentState>>,
    features: ClientFeatures,
    analysis: Debouncer<Url>,
    hint_refresh: Debouncer<()>,
}

pub struct Backend {
    state: Arc<ServerState>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner);
        let cwd = std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir());
        let registry = Arc::new(FallbackRegistry::new(
            Arc::new(NpmRegistry::default()),
            Arc::new(NpmCliRegistry::new(runner.clone(), cwd)),
        ));
        let advisory_source = Arc::new(NpmRegistry::default());

        Self::build(client, registry, advisory_source, runner)
    }

    /// Build a Backend with custom registry, advisory source and process runner
    pub fn build(
        client: Client,
        registry: Arc<dyn Registry>,
        advisory_source: Arc<dyn AdvisorySource>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let generator = DiagnosticGenerator::new(
            Arc::new(PackageJsonParser::new()),
            Arc::new(RegistryClient::new(registry, advisory_source)),
            Arc::new(InstalledInspector::new(runner)),
        );

        Self {
            state: Arc::new(ServerState {
                client,
                generator,
                settings: RwLock::new(Settings::default()),
                documents: RwLock::new(HashMap::new()),
                features: ClientFeatures::default(),
                analysis: Debouncer::new(Duration::from_millis(ANALYSIS_DEBOUNCE_MS)),
                hint_refresh: Debouncer::new(Duration::from_millis(DECORATION_FLUSH_DEBOUNCE_MS)),
            }),
        }
    }

    pub fn server_capabilities() -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    ..Default::default()
                },
            )),
            code_action_provider: Some(CodeActionProviderCapability::Options(
                CodeActionOptions {
                    code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
                    ..Default::default()
                },
            )),
            inlay_hint_provider: Some(OneOf::Left(true)),
            ..Default::default()
        }
    }

    fn schedule_analysis(&self, uri: Url) {
        let state = self.state.clone();
        self.state
            .analysis
            .schedule(uri.clone(), async move { state.analyze(uri).await });
    }

    async fn schedule_open_documents(&self) {
        let uris: Vec<Url> = self.state.documents.read().await.keys().cloned().collect();
        for uri in uris {
            self.schedule_analysis(uri);
        }
    }

    fn register_lockfile_watchers(&self) {
        let options = DidChangeWatchedFilesRegistrationOptions {
            watchers: LOCKFILE_GLOBS
                .iter()
                .map(|glob| FileSystemWatcher {
                    glob_pattern: GlobPattern::String(glob.to_string()),
                    kind: None,
                })
                .collect(),
        };
        let register_options = match serde_json::to_value(options) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to encode watcher options: {}", e);
                return;
            }
        };

        let client = self.state.client.clone();
        tokio::spawn(async move {
            let registration = Registration {
                id: WATCHER_REGISTRATION_ID.to_string(),
                method: "workspace/didChangeWatchedFiles".to_string(),
                register_options: Some(register_options),
            };
            if let Err(e) = client.register_capability(vec![registration]).await {
                warn!("Failed to register lockfile watchers: {}", e);
            }
        });
    }
}

impl ServerState {
    /// Run one analysis pass and publish its results
    async fn analyze(self: Arc<Self>, uri: Url) {
        let Some(content) = self
            .documents
            .read()
            .await
            .get(&uri)
            .map(|doc| doc.content.clone())
        else {
            return;
        };
        let Some(manifest_dir) = manifest_dir(&uri) else {
            warn!("Cannot locate project directory of {}", uri);
            return;
        };
        let settings = self.settings.read().await.clone();

        let checking = self.generator.checkable_declarations(&content);
        if let Some(doc) = self.documents.write().await.get_mut(&uri) {
            doc.checking = checking;
            doc.packages.clear();
        }
        self.request_hint_refresh(&settings);

        let packages = self
            .generator
            .compute_update_decisions(&content, &manifest_dir, &settings)
            .await;
        let diagnostics: Vec<Diagnostic> = packages.iter().filter_map(create_diagnostic).collect();

        {
            let mut documents = self.documents.write().await;
            let Some(doc) = documents.get_mut(&uri) else {
                debug!("{} was closed during analysis", uri);
                return;
            };
            doc.checking.clear();
            doc.packages = packages;
        }

        self.client
            .log_message(
                MessageType::LOG,
                format!("Publishing {} diagnostics for {}", diagnostics.len(), uri),
            )
            .await;
        self.client.publish_diagnostics(uri, diagnostics, None).await;
        self.request_hint_refresh(&settings);
    }

    /// Coalesce decoration changes into one refresh request
    fn request_hint_refresh(&self, settings: &Settings) {
        if settings.decorations == DecorationsMode::Disabled
            || !self.features.inlay_hint_refresh.load(Ordering::Relaxed)
        {
            return;
        }

        let client = self.client.clone();
        self.hint_refresh.schedule((), async move {
            if let Err(e) = client.inlay_hint_refresh().await {
                debug!("Inlay hint refresh failed: {}", e);
            }
        });
    }
}

fn manifest_dir(uri: &Url) -> Option<PathBuf> {
    uri.to_file_path()
        .ok()
        .and_then(|path| path.parent().map(PathBuf::from))
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        self.state
            .client
            .log_message(MessageType::INFO, "LSP server initializing")
            .await;

        if let Some(settings) = params
            .initialization_options
            .as_ref()
            .and_then(Settings::from_value)
        {
            info!("Using client settings: {:?}", settings);
            *self.state.settings.write().await = settings;
        }

        let workspace = params.capabilities.workspace.as_ref();
        let inlay_hint_refresh = workspace
            .and_then(|w| w.inlay_hint.as_ref())
            .and_then(|i| i.refresh_support)
            .unwrap_or(false);
        let watched_files_registration = workspace
            .and_then(|w| w.did_change_watched_files.as_ref())
            .and_then(|d| d.dynamic_registration)
            .unwrap_or(false);
        self.state
            .features
            .inlay_hint_refresh
            .store(inlay_hint_refresh, Ordering::Relaxed);
        self.state
            .features
            .watched_files_registration
            .store(watched_files_registration, Ordering::Relaxed);

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(),
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.state
            .client
            .log_message(MessageType::INFO, "LSP server initialized")
            .await;

        if self
            .state
            .features
            .watched_files_registration
            .load(Ordering::Relaxed)
        {
            self.register_lockfile_watchers();
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.state
            .client
            .log_message(MessageType::INFO, "LSP server shutting down")
            .await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        if !is_package_json(uri.as_str()) {
            return;
        }

        self.state
            .client
            .log_message(MessageType::LOG, format!("Document opened: {}", uri))
            .await;

        self.state.documents.write().await.insert(
            uri.clone(),
            DocumentState {
                content: params.text_document.text,
                ..Default::default()
            },
        );
        self.schedule_analysis(uri);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        if !is_package_json(uri.as_str()) {
            return;
        }

        // With FULL sync mode, the last content change contains the full document text
        let Some(content) = params.content_changes.into_iter().last().map(|c| c.text) else {
            return;
        };

        self.state
            .documents
            .write()
            .await
            .entry(uri.clone())
            .or_default()
            .content = content;
        self.schedule_analysis(uri);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        if !is_package_json(uri.as_str()) {
            return;
        }

        self.state.analysis.cancel(&uri);
        self.state.documents.write().await.remove(&uri);
        self.state.client.publish_diagnostics(uri, vec![], None).await;

        let settings = self.state.settings.read().await.clone();
        self.state.request_hint_refresh(&settings);
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        if !params.changes.iter().any(|c| is_lockfile(c.uri.as_str())) {
            return;
        }

        info!("Lockfile changed, refreshing installed packages");
        self.state.generator.invalidate_package_cache();
        self.schedule_open_documents().await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let Some(settings) = Settings::from_value(&params.settings) else {
            warn!("Ignoring unrecognized configuration: {}", params.settings);
            return;
        };

        info!("Configuration changed: {:?}", settings);
        *self.state.settings.write().await = settings;
        self.schedule_open_documents().await;
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let uri = params.text_document.uri;
        let settings = self.state.settings.read().await.clone();
        let documents = self.state.documents.read().await;
        let Some(doc) = documents.get(&uri) else {
            return Ok(None);
        };

        let actions = generate_update_actions(&uri, &doc.packages, params.range, &settings);
        if actions.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            actions
                .into_iter()
                .map(CodeActionOrCommand::CodeAction)
                .collect(),
        ))
    }

    async fn inlay_hint(&self, params: InlayHintParams) -> Result<Option<Vec<InlayHint>>> {
        let mode = self.state.settings.read().await.decorations;
        let documents = self.state.documents.read().await;
        let Some(doc) = documents.get(&params.text_document.uri) else {
            return Ok(None);
        };

        Ok(Some(generate_inlay_hints(
            &doc.content,
            &doc.checking,
            &doc.packages,
            mode,
            params.range,
        )))
    }
}
