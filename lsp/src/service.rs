//! `LspService`: the tool-facing entry point.
//!
//! Construction only records configuration. [`LspService::initialize`]
//! spawns the server and performs the handshake; every query then runs
//! against that one session until [`LspService::shutdown`] or
//! [`LspService::dispose`] tears it down.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use lspbridge_config::{LanguageIdMapper, ProcessConfig, ProfileResolver, WorkspaceKind};
use lspbridge_types::{
    CompletionResult, DocumentDiagnostic, DocumentSymbol, EditorPosition, HoverResult,
    RenameOutcome, SymbolLocation, WindowLogMessage, sort_diagnostics,
};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::RwLock;
use tokio::task;

use crate::client::LspClient;
use crate::connection::Connection;
use crate::diagnostics::{self, Retrieval};
use crate::edits;
use crate::enrich;
use crate::error::ServiceError;
use crate::handlers::{HandlerRegistry, UnhandledMessage};
use crate::lifecycle::{self, OpenDocument};
use crate::protocol::{self, Location};
use crate::readiness::ReadinessGate;
use crate::symbols;
use crate::transport::{DISPOSE_TIMEOUT, SHUTDOWN_TIMEOUT, ServerProcess};

const RENAME_REJECTED: &str = "Symbol at position cannot be renamed";

/// One live server: process, connection and the handlers fed by it.
struct Session {
    client: LspClient,
    handlers: Arc<HandlerRegistry>,
    readiness: ReadinessGate,
    process: Option<ServerProcess>,
}

#[derive(Debug, Clone, Copy)]
enum Navigation {
    References,
    Definition,
    TypeDefinition,
    Implementation,
}

impl Navigation {
    fn label(self) -> &'static str {
        match self {
            Self::References => "Find references",
            Self::Definition => "Go to definition",
            Self::TypeDefinition => "Go to type definition",
            Self::Implementation => "Find implementations",
        }
    }
}

pub struct LspService {
    config: ProcessConfig,
    resolver: ProfileResolver,
    /// Profile used when `config` names none, found by workspace detection.
    detected_profile: Option<String>,
    mapper: LanguageIdMapper,
    session: RwLock<Option<Session>>,
}

impl LspService {
    #[must_use]
    pub fn new(config: ProcessConfig, resolver: ProfileResolver) -> Self {
        let detected_profile = if config.profile.is_none() {
            resolver.auto_detect(&config.workspace).map(str::to_string)
        } else {
            None
        };
        let active = config.profile.as_deref().or(detected_profile.as_deref());
        let mapper = LanguageIdMapper::new(active.and_then(|name| resolver.get_profile(name)));

        Self {
            config,
            resolver,
            detected_profile,
            mapper,
            session: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Name of the profile driving diagnostics and symbol settings.
    #[must_use]
    pub fn active_profile(&self) -> Option<&str> {
        self.config
            .profile
            .as_deref()
            .or(self.detected_profile.as_deref())
    }

    // ── Lifecycle ──

    /// Spawn the configured server and perform the handshake.
    pub async fn initialize(&self) -> Result<(), ServiceError> {
        let mut slot = self.session.write().await;
        if slot.is_some() {
            return Err(already_initialized());
        }

        tracing::info!(
            command = %self.config.command,
            workspace = %self.config.workspace.display(),
            "Starting language server"
        );
        let spawned = ServerProcess::spawn(&self.config).map_err(ServiceError::Startup)?;
        let session = self
            .handshake(spawned.stdout, spawned.stdin, Some(spawned.process))
            .await?;
        *slot = Some(session);
        Ok(())
    }

    /// Run the session over an already connected stream pair instead of a
    /// spawned process.
    pub async fn initialize_with_io<R, W>(&self, reader: R, writer: W) -> Result<(), ServiceError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut slot = self.session.write().await;
        if slot.is_some() {
            return Err(already_initialized());
        }
        let session = self.handshake(reader, writer, None).await?;
        *slot = Some(session);
        Ok(())
    }

    async fn handshake<R, W>(
        &self,
        reader: R,
        writer: W,
        mut process: Option<ServerProcess>,
    ) -> Result<Session, ServiceError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let handlers = Arc::new(HandlerRegistry::new());
        let connection = Connection::spawn(
            reader,
            writer,
            handlers.clone(),
            self.config.request_timeout,
        );
        let client = LspClient::new(connection);

        let handshake = async {
            client.initialize(&self.config.workspace).await?;
            client.initialized().await?;
            self.open_workspace(&client).await
        };
        if let Err(e) = handshake.await {
            client.cancel();
            if let Some(process) = process.as_mut() {
                process.wait_or_kill(Duration::ZERO).await;
            }
            return Err(ServiceError::operation("Language server handshake failed", e));
        }

        let readiness = ReadinessGate::new(
            self.config.requires_async_load(),
            handlers.project_initialized().subscribe(),
        );
        tracing::info!(
            ready = readiness.is_ready(),
            "Language server initialized"
        );

        Ok(Session {
            client,
            handlers,
            readiness,
            process,
        })
    }

    async fn open_workspace(&self, client: &LspClient) -> anyhow::Result<()> {
        match self.config.workspace_kind() {
            WorkspaceKind::Solution(path) => {
                let uri = protocol::path_to_file_uri(&path)?;
                tracing::info!("Opening solution {}", path.display());
                client
                    .notify("solution/open", Some(json!({ "solution": uri.as_str() })))
                    .await
            }
            WorkspaceKind::Projects(paths) => {
                let uris = paths
                    .iter()
                    .map(|p| protocol::path_to_file_uri(p).map(|u| u.to_string()))
                    .collect::<Result<Vec<_>, _>>()?;
                tracing::info!("Opening {} project(s)", uris.len());
                client
                    .notify("project/open", Some(json!({ "projects": uris })))
                    .await
            }
            WorkspaceKind::Folder => Ok(()),
        }
    }

    /// Wait until the workspace is ready, at most `timeout`. Returns whether
    /// it became ready.
    pub async fn wait_for_ready(&self, timeout: Duration) -> Result<bool, ServiceError> {
        let gate = {
            let slot = self.session.read().await;
            slot.as_ref()
                .ok_or(ServiceError::NotInitialized)?
                .readiness
                .clone()
        };
        Ok(gate.wait(timeout).await)
    }

    /// Graceful teardown: `shutdown` request, `exit` notification, then a
    /// bounded wait before the process tree is killed. Never fails.
    pub async fn shutdown(&self) {
        let Some(mut session) = self.session.write().await.take() else {
            return;
        };
        tracing::info!("Shutting down language server");

        if !session.client.is_closed() {
            match session.client.shutdown().await {
                Ok(()) => {
                    if let Err(e) = session.client.exit().await {
                        tracing::debug!("Failed to send exit: {e:#}");
                    }
                }
                Err(e) => tracing::debug!("Shutdown request failed: {e:#}"),
            }
        }
        session.client.close_input().await;
        if let Some(process) = session.process.as_mut() {
            process.wait_or_kill(SHUTDOWN_TIMEOUT).await;
        }
        session.client.cancel();
    }

    /// Best-effort teardown without the shutdown handshake. Never fails.
    pub async fn dispose(&self) {
        let Some(mut session) = self.session.write().await.take() else {
            return;
        };
        tracing::debug!("Disposing language server session");
        session.client.close_input().await;
        if let Some(process) = session.process.as_mut() {
            process.wait_or_kill(DISPOSE_TIMEOUT).await;
        }
        session.client.cancel();
    }

    // ── Navigation ──

    pub async fn find_references(
        &self,
        file: &Path,
        position: EditorPosition,
    ) -> Result<Vec<SymbolLocation>, ServiceError> {
        self.navigate(Navigation::References, file, position).await
    }

    pub async fn go_to_definition(
        &self,
        file: &Path,
        position: EditorPosition,
    ) -> Result<Vec<SymbolLocation>, ServiceError> {
        self.navigate(Navigation::Definition, file, position).await
    }

    pub async fn go_to_type_definition(
        &self,
        file: &Path,
        position: EditorPosition,
    ) -> Result<Vec<SymbolLocation>, ServiceError> {
        self.navigate(Navigation::TypeDefinition, file, position)
            .await
    }

    pub async fn find_implementations(
        &self,
        file: &Path,
        position: EditorPosition,
    ) -> Result<Vec<SymbolLocation>, ServiceError> {
        self.navigate(Navigation::Implementation, file, position)
            .await
    }

    async fn navigate(
        &self,
        navigation: Navigation,
        file: &Path,
        position: EditorPosition,
    ) -> Result<Vec<SymbolLocation>, ServiceError> {
        tracing::info!(file = %file.display(), %position, "{}", navigation.label());
        let slot = self.session.read().await;
        let session = ready_session(&slot)?;
        let client = &session.client;

        let locations = self
            .with_document(session, file, |doc| async move {
                let result = match navigation {
                    Navigation::References => client.references(&doc.uri, position).await,
                    Navigation::Definition => client.definition(&doc.uri, position).await,
                    Navigation::TypeDefinition => {
                        client.type_definition(&doc.uri, position).await
                    }
                    Navigation::Implementation => client.implementation(&doc.uri, position).await,
                };
                result.map_err(|e| ServiceError::operation(format!("{} failed", navigation.label()), e))
            })
            .await?;

        Ok(enrich::enrich_locations(
            locations.iter().map(Location::to_symbol_location).collect(),
        )
        .await)
    }

    // ── Information ──

    pub async fn completion(
        &self,
        file: &Path,
        position: EditorPosition,
    ) -> Result<CompletionResult, ServiceError> {
        tracing::info!(file = %file.display(), %position, "Completion");
        let slot = self.session.read().await;
        let session = ready_session(&slot)?;
        let client = &session.client;

        self.with_document(session, file, |doc| async move {
            let (items, is_incomplete) = client
                .completion(&doc.uri, position)
                .await
                .map_err(|e| ServiceError::operation("Completion failed", e))?;
            Ok(CompletionResult {
                items,
                is_incomplete,
            })
        })
        .await
    }

    /// Hover text plus the most specific symbol enclosing `position`.
    pub async fn hover(
        &self,
        file: &Path,
        position: EditorPosition,
    ) -> Result<HoverResult, ServiceError> {
        tracing::info!(file = %file.display(), %position, "Hover");
        let slot = self.session.read().await;
        let session = ready_session(&slot)?;
        let client = &session.client;

        self.with_document(session, file, |doc| async move {
            let value = client
                .hover(&doc.uri, position)
                .await
                .map_err(|e| ServiceError::operation("Hover failed", e))?;

            let symbol = match client.document_symbols(&doc.uri).await {
                Ok(mut found) => {
                    symbols::assign_depths(&mut found);
                    symbols::enclosing_symbol(&found, position).cloned()
                }
                Err(e) => {
                    tracing::debug!("No symbols for hover at {position}: {e:#}");
                    None
                }
            };
            Ok(HoverResult { value, symbol })
        })
        .await
    }

    pub async fn search_symbols(&self, query: &str) -> Result<Vec<DocumentSymbol>, ServiceError> {
        tracing::info!(query, "Search symbols");
        let slot = self.session.read().await;
        let session = ready_session(&slot)?;

        let mut found = session
            .client
            .workspace_symbols(query)
            .await
            .map_err(|e| ServiceError::operation("Symbol search failed", e))?;
        symbols::assign_depths(&mut found);
        Ok(enrich_symbol_locations(found).await)
    }

    /// Symbols of `file`, filtered by depth (`max_depth`, else the profile's
    /// limit) and by the profile's kind allow-list.
    pub async fn document_symbols(
        &self,
        file: &Path,
        max_depth: Option<u32>,
    ) -> Result<Vec<DocumentSymbol>, ServiceError> {
        tracing::info!(file = %file.display(), ?max_depth, "Document symbols");
        let slot = self.session.read().await;
        let session = ready_session(&slot)?;
        let client = &session.client;
        let settings = self.resolver.symbols_settings(self.active_profile());

        let mut found = self
            .with_document(session, file, |doc| async move {
                client
                    .document_symbols(&doc.uri)
                    .await
                    .map_err(|e| ServiceError::operation("Document symbols failed", e))
            })
            .await?;

        symbols::assign_depths(&mut found);
        let max_depth = max_depth.or(settings.max_depth);
        Ok(symbols::filter_symbols(found, max_depth, &settings.kinds))
    }

    /// Diagnostics for `file`, ordered by severity, line and character.
    pub async fn diagnostics(&self, file: &Path) -> Result<Vec<DocumentDiagnostic>, ServiceError> {
        tracing::info!(file = %file.display(), "Diagnostics");
        let slot = self.session.read().await;
        let session = ready_session(&slot)?;
        let client = &session.client;
        let handlers = &session.handlers;
        let retrieval = Retrieval::from_settings(
            &self
                .resolver
                .diagnostics_settings(self.config.profile.as_deref(), self.detected_profile.as_deref()),
        );

        self.with_document(session, file, |doc| async move {
            let raw = match retrieval {
                Retrieval::Pull => {
                    let providers = diagnostics::discover_providers(
                        client.capabilities(),
                        &handlers.registrations(),
                    );
                    tracing::debug!(?providers, "Pulling diagnostics");
                    let uri = doc.uri.as_str();
                    diagnostics::pull_from_providers(&providers, |identifier| async move {
                        client.diagnostic(uri, &identifier).await
                    })
                    .await
                }
                Retrieval::Push { wait } => {
                    diagnostics::wait_for_push(handlers.diagnostics(), &doc.uri, &doc.path, wait)
                        .await
                }
            };

            let mut converted: Vec<DocumentDiagnostic> =
                raw.iter().map(protocol::LspDiagnostic::to_document_diagnostic).collect();
            enrich::attach_diagnostic_text(&doc.text, &mut converted);
            sort_diagnostics(&mut converted);
            Ok(converted)
        })
        .await
    }

    // ── Refactoring ──

    /// Rename the symbol at `position` and write the edits to disk.
    pub async fn rename(
        &self,
        file: &Path,
        position: EditorPosition,
        new_name: &str,
    ) -> Result<RenameOutcome, ServiceError> {
        tracing::info!(file = %file.display(), %position, new_name, "Rename");
        let slot = self.session.read().await;
        let session = ready_session(&slot)?;
        let client = &session.client;

        let edit = self
            .with_document(session, file, |doc| async move {
                match client.prepare_rename(&doc.uri, position).await {
                    Ok(Value::Null) => return Ok(None),
                    Ok(_) => {}
                    Err(e) => tracing::warn!("prepareRename failed, renaming anyway: {e:#}"),
                }
                client
                    .rename(&doc.uri, position, new_name)
                    .await
                    .map(Some)
                    .map_err(|e| ServiceError::operation("Rename failed", e))
            })
            .await?;

        let Some(edit) = edit else {
            return Ok(RenameOutcome::rejected(RENAME_REJECTED));
        };

        let result = task::spawn_blocking(move || edits::apply_workspace_edit(edit))
            .await
            .map_err(|e| ServiceError::operation("Applying rename edits failed", e.into()))?;

        if result.changed_files.is_empty() && !result.errors.is_empty() {
            return Err(ServiceError::operation(
                "Rename failed",
                anyhow!(result.errors.join("; ")),
            ));
        }
        Ok(RenameOutcome::from(result))
    }

    // ── Server messages ──

    pub async fn window_log_messages(&self) -> Result<Vec<WindowLogMessage>, ServiceError> {
        self.with_handlers(HandlerRegistry::log_messages).await
    }

    pub async fn toast_messages(&self) -> Result<Vec<WindowLogMessage>, ServiceError> {
        self.with_handlers(HandlerRegistry::toast_messages).await
    }

    pub async fn unhandled_notifications(&self) -> Result<Vec<UnhandledMessage>, ServiceError> {
        self.with_handlers(HandlerRegistry::unhandled_notifications)
            .await
    }

    pub async fn unhandled_requests(&self) -> Result<Vec<UnhandledMessage>, ServiceError> {
        self.with_handlers(HandlerRegistry::unhandled_requests)
            .await
    }

    /// Whether the server has registered at least one dynamic capability.
    pub async fn registrations_observed(&self) -> Result<bool, ServiceError> {
        self.with_handlers(|handlers| handlers.first_registration().is_fired())
            .await
    }

    async fn with_handlers<T>(
        &self,
        read: impl FnOnce(&HandlerRegistry) -> T,
    ) -> Result<T, ServiceError> {
        let slot = self.session.read().await;
        let session = slot.as_ref().ok_or(ServiceError::NotInitialized)?;
        Ok(read(&session.handlers))
    }

    async fn with_document<T, F, Fut>(
        &self,
        session: &Session,
        file: &Path,
        op: F,
    ) -> Result<T, ServiceError>
    where
        F: FnOnce(OpenDocument) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        lifecycle::with_document(
            &session.client,
            &self.mapper,
            &self.config.workspace,
            file,
            op,
        )
        .await
    }
}

fn ready_session(slot: &Option<Session>) -> Result<&Session, ServiceError> {
    let session = slot.as_ref().ok_or(ServiceError::NotInitialized)?;
    session.readiness.ensure_ready()?;
    Ok(session)
}

fn already_initialized() -> ServiceError {
    ServiceError::operation(
        "Language server session is already initialized",
        anyhow!("initialize called twice"),
    )
}

async fn enrich_symbol_locations(symbols: Vec<DocumentSymbol>) -> Vec<DocumentSymbol> {
    let (mut symbols, locations): (Vec<_>, Vec<_>) = symbols
        .into_iter()
        .map(|mut symbol| {
            let location = symbol.location.take();
            (symbol, location)
        })
        .unzip();

    let present: Vec<SymbolLocation> = locations.iter().flatten().cloned().collect();
    let mut enriched = enrich::enrich_locations(present).await.into_iter();
    for (symbol, location) in symbols.iter_mut().zip(locations) {
        symbol.location = location.and_then(|_| enriched.next());
    }
    symbols
}
