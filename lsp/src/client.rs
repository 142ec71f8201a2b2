//! Typed LSP client: one method per protocol operation.
//!
//! Positions cross this boundary as 1-based [`EditorPosition`]s and are
//! converted to protocol positions by the parameter builders; nothing above
//! this layer sees a 0-based position.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use lspbridge_types::{CompletionItem, DocumentSymbol, EditorPosition};
use serde_json::{Value, json};

use crate::connection::Connection;
use crate::lifecycle::DocumentSync;
use crate::protocol::{self, Location, LspDiagnostic, WorkspaceEdit};
use crate::signal::Signal;

pub(crate) struct LspClient {
    connection: Connection,
    cancel: Signal,
    capabilities: OnceLock<Value>,
}

impl LspClient {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            cancel: Signal::new(),
            capabilities: OnceLock::new(),
        }
    }

    /// Server capabilities from the initialize response.
    pub fn capabilities(&self) -> Option<&Value> {
        self.capabilities.get()
    }

    /// Signal every in-flight and future call on this client to give up.
    pub fn cancel(&self) {
        self.cancel.fire();
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.connection
            .request(method, Some(params), &self.cancel)
            .await
    }

    /// Send a notification, including profile-specific extensions such as
    /// `solution/open`.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.connection.notify(method, params, &self.cancel).await
    }

    // ── Lifecycle ──

    pub async fn initialize(&self, root: &Path) -> Result<Value> {
        let root_uri =
            protocol::path_to_file_uri(root).context("converting workspace root to URI")?;
        let root_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        let response = self
            .request(
                "initialize",
                protocol::initialize_params(root_uri.as_str(), &root_name),
            )
            .await
            .context("LSP initialize failed")?;

        let capabilities = response
            .get("capabilities")
            .cloned()
            .unwrap_or_else(|| json!({}));
        let _ = self.capabilities.set(capabilities);
        Ok(response)
    }

    pub async fn initialized(&self) -> Result<()> {
        self.notify("initialized", Some(json!({}))).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.connection
            .request("shutdown", None, &self.cancel)
            .await
            .map(|_| ())
    }

    pub async fn exit(&self) -> Result<()> {
        self.notify("exit", None).await
    }

    /// Close the server's input stream.
    pub async fn close_input(&self) {
        self.connection.close().await;
    }

    // ── Documents ──

    pub async fn did_open(&self, uri: &str, language_id: &str, text: &str) -> Result<()> {
        self.notify(
            "textDocument/didOpen",
            Some(protocol::did_open_params(uri, language_id, 1, text)),
        )
        .await
    }

    pub async fn did_close(&self, uri: &str) -> Result<()> {
        self.notify(
            "textDocument/didClose",
            Some(protocol::text_document_params(uri)),
        )
        .await
    }

    // ── Navigation ──

    pub async fn definition(&self, uri: &str, position: EditorPosition) -> Result<Vec<Location>> {
        self.locations("textDocument/definition", uri, position)
            .await
    }

    pub async fn type_definition(
        &self,
        uri: &str,
        position: EditorPosition,
    ) -> Result<Vec<Location>> {
        self.locations("textDocument/typeDefinition", uri, position)
            .await
    }

    pub async fn implementation(
        &self,
        uri: &str,
        position: EditorPosition,
    ) -> Result<Vec<Location>> {
        self.locations("textDocument/implementation", uri, position)
            .await
    }

    async fn locations(
        &self,
        method: &str,
        uri: &str,
        position: EditorPosition,
    ) -> Result<Vec<Location>> {
        let result = self
            .request(method, protocol::text_document_position_params(uri, position))
            .await?;
        protocol::parse_locations(result).with_context(|| format!("parsing {method} response"))
    }

    pub async fn references(&self, uri: &str, position: EditorPosition) -> Result<Vec<Location>> {
        let result = self
            .request(
                "textDocument/references",
                protocol::reference_params(uri, position),
            )
            .await?;
        protocol::parse_locations(result).context("parsing references response")
    }

    // ── Information ──

    pub async fn hover(&self, uri: &str, position: EditorPosition) -> Result<String> {
        let result = self
            .request(
                "textDocument/hover",
                protocol::text_document_position_params(uri, position),
            )
            .await?;
        protocol::parse_hover(result).context("parsing hover response")
    }

    pub async fn completion(
        &self,
        uri: &str,
        position: EditorPosition,
    ) -> Result<(Vec<CompletionItem>, bool)> {
        let result = self
            .request(
                "textDocument/completion",
                protocol::completion_params(uri, position),
            )
            .await?;
        protocol::parse_completion(result).context("parsing completion response")
    }

    pub async fn document_symbols(&self, uri: &str) -> Result<Vec<DocumentSymbol>> {
        let result = self
            .request(
                "textDocument/documentSymbol",
                protocol::text_document_params(uri),
            )
            .await?;
        protocol::parse_document_symbols(uri, result).context("parsing documentSymbol response")
    }

    pub async fn workspace_symbols(&self, query: &str) -> Result<Vec<DocumentSymbol>> {
        let result = self
            .request(
                "workspace/symbol",
                protocol::workspace_symbol_params(query),
            )
            .await?;
        protocol::parse_workspace_symbols(result).context("parsing workspace/symbol response")
    }

    pub async fn diagnostic(&self, uri: &str, identifier: &str) -> Result<Vec<LspDiagnostic>> {
        let result = self
            .request(
                "textDocument/diagnostic",
                protocol::diagnostic_params(uri, Some(identifier)),
            )
            .await?;
        protocol::parse_diagnostic_report(result).context("parsing diagnostic report")
    }

    // ── Refactoring ──

    /// Raw `prepareRename` result; `null` means the position cannot be
    /// renamed.
    pub async fn prepare_rename(&self, uri: &str, position: EditorPosition) -> Result<Value> {
        self.request(
            "textDocument/prepareRename",
            protocol::text_document_position_params(uri, position),
        )
        .await
    }

    pub async fn rename(
        &self,
        uri: &str,
        position: EditorPosition,
        new_name: &str,
    ) -> Result<Option<WorkspaceEdit>> {
        let result = self
            .request(
                "textDocument/rename",
                protocol::rename_params(uri, position, new_name),
            )
            .await?;
        protocol::parse_workspace_edit(result).context("parsing rename response")
    }
}

impl DocumentSync for LspClient {
    async fn open(&self, uri: &str, language_id: &str, text: &str) -> Result<()> {
        self.did_open(uri, language_id, text).await
    }

    async fn close(&self, uri: &str) -> Result<()> {
        self.did_close(uri).await
    }

    fn close_now(&self, uri: &str) -> Result<()> {
        if self.cancel.is_fired() {
            return Ok(());
        }
        self.connection.notify_now(
            "textDocument/didClose",
            Some(protocol::text_document_params(uri)),
        )
    }
}
