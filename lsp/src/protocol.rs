//! LSP message serde types and parameter builders.
//!
//! Only the subset of the protocol the bridge actually uses is modelled.
//! Response types are tolerant: servers disagree on which of
//! the allowed shapes they return, so most results are untagged unions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use lspbridge_types::{
    CompletionItem, CompletionItemKind, DiagnosticSeverity, DocumentDiagnostic, DocumentSymbol,
    EditorPosition, SymbolKind, SymbolLocation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub struct PathToUriError {
    path: PathBuf,
}

// ── JSON-RPC envelopes ──

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> Request<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> Notification<'a> {
    pub fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// Reply to a request the server sent us.
pub(crate) fn response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

/// JSON-RPC `error` member of a response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, thiserror::Error)]
#[error("server returned error {code}: {message}")]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug)]
pub(crate) enum IncomingMessage {
    Response {
        id: u64,
        outcome: Result<Value, ResponseError>,
    },
    ServerRequest {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
}

/// Classify a raw frame. Returns `None` for frames that are none of
/// response, request or notification.
pub(crate) fn classify(mut frame: Value) -> Option<IncomingMessage> {
    let obj = frame.as_object_mut()?;
    let method = obj
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_string);
    let id = obj.remove("id").filter(|id| !id.is_null());
    let params = obj.remove("params");

    match (id, method) {
        (Some(id), Some(method)) => Some(IncomingMessage::ServerRequest { id, method, params }),
        (None, Some(method)) => Some(IncomingMessage::Notification { method, params }),
        (Some(id), None) => {
            let id = id.as_u64()?;
            let outcome = match obj.remove("error") {
                Some(err) => Err(serde_json::from_value(err).unwrap_or_else(|_| ResponseError {
                    code: 0,
                    message: "malformed error response".to_string(),
                })),
                None => Ok(obj.remove("result")?),
            };
            Some(IncomingMessage::Response { id, outcome })
        }
        (None, None) => None,
    }
}

// ── Positions and locations ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub(crate) struct Position {
    pub line: u32,
    pub character: u32,
}

impl From<EditorPosition> for Position {
    fn from(pos: EditorPosition) -> Self {
        let (line, character) = pos.to_zero_based();
        Self { line, character }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Range {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Location {
    pub uri: String,
    #[serde(default)]
    pub range: Option<Range>,
}

impl Location {
    /// 1-based editor view of this location.
    pub fn to_symbol_location(&self) -> SymbolLocation {
        match self.range {
            Some(range) => SymbolLocation {
                file_path: self.uri.clone(),
                start_line: Some(range.start.line + 1),
                start_character: Some(range.start.character + 1),
                end_line: Some(range.end.line + 1),
                end_character: Some(range.end.character + 1),
                text: None,
            },
            None => SymbolLocation::without_range(self.uri.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationLink {
    target_uri: String,
    target_range: Range,
    #[serde(default)]
    target_selection_range: Option<Range>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocationOrLink {
    Link(LocationLink),
    Location(Location),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GotoResponse {
    Many(Vec<LocationOrLink>),
    One(Location),
}

/// Parse a definition/references-style result: `Location`, `Location[]`,
/// `LocationLink[]` or `null`.
pub(crate) fn parse_locations(value: Value) -> serde_json::Result<Vec<Location>> {
    let response: Option<GotoResponse> = serde_json::from_value(value)?;
    Ok(match response {
        None => Vec::new(),
        Some(GotoResponse::One(loc)) => vec![loc],
        Some(GotoResponse::Many(items)) => items
            .into_iter()
            .map(|item| match item {
                LocationOrLink::Location(loc) => loc,
                LocationOrLink::Link(link) => Location {
                    uri: link.target_uri,
                    range: Some(link.target_selection_range.unwrap_or(link.target_range)),
                },
            })
            .collect(),
    })
}

// ── Hover ──

#[derive(Debug, Deserialize)]
struct MarkupContent {
    #[allow(dead_code)]
    kind: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MarkedString {
    Plain(String),
    Language {
        #[allow(dead_code)]
        language: String,
        value: String,
    },
}

impl MarkedString {
    fn into_value(self) -> String {
        match self {
            Self::Plain(value) | Self::Language { value, .. } => value,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HoverContents {
    Markup(MarkupContent),
    // Before `Single`: untagged struct variants also accept sequences.
    Many(Vec<MarkedString>),
    Single(MarkedString),
}

#[derive(Debug, Deserialize)]
struct Hover {
    contents: HoverContents,
}

/// Text of a hover result; empty when the server had nothing to say.
pub(crate) fn parse_hover(value: Value) -> serde_json::Result<String> {
    let hover: Option<Hover> = serde_json::from_value(value)?;
    Ok(match hover.map(|h| h.contents) {
        None => String::new(),
        Some(HoverContents::Markup(markup)) => markup.value,
        Some(HoverContents::Single(marked)) => marked.into_value(),
        Some(HoverContents::Many(items)) => items
            .into_iter()
            .map(MarkedString::into_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
    })
}

// ── Completion ──

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Documentation {
    Plain(String),
    Markup(MarkupContent),
}

#[derive(Debug, Deserialize)]
struct LspCompletionItem {
    label: String,
    #[serde(default)]
    kind: Option<u64>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    documentation: Option<Documentation>,
}

impl LspCompletionItem {
    fn into_item(self) -> CompletionItem {
        CompletionItem {
            label: self.label,
            kind: self.kind.and_then(CompletionItemKind::from_lsp),
            detail: self.detail,
            documentation: self.documentation.map(|d| match d {
                Documentation::Plain(s) => s,
                Documentation::Markup(m) => m.value,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionList {
    #[serde(default)]
    is_incomplete: bool,
    #[serde(default)]
    items: Vec<LspCompletionItem>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CompletionResponse {
    Items(Vec<LspCompletionItem>),
    List(CompletionList),
}

/// `(items, is_incomplete)` from `CompletionItem[]`, `CompletionList` or
/// `null`.
pub(crate) fn parse_completion(value: Value) -> serde_json::Result<(Vec<CompletionItem>, bool)> {
    let response: Option<CompletionResponse> = serde_json::from_value(value)?;
    Ok(match response {
        None => (Vec::new(), false),
        Some(CompletionResponse::Items(items)) => {
            (items.into_iter().map(LspCompletionItem::into_item).collect(), false)
        }
        Some(CompletionResponse::List(list)) => (
            list.items
                .into_iter()
                .map(LspCompletionItem::into_item)
                .collect(),
            list.is_incomplete,
        ),
    })
}

// ── Symbols ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInformation {
    name: String,
    kind: u64,
    #[serde(default)]
    container_name: Option<String>,
    location: Location,
}

impl SymbolInformation {
    fn into_symbol(self) -> DocumentSymbol {
        DocumentSymbol {
            name: self.name,
            kind: SymbolKind::from_lsp(self.kind),
            container_name: self.container_name.filter(|c| !c.is_empty()),
            depth: 0,
            location: Some(self.location.to_symbol_location()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NestedSymbol {
    name: String,
    kind: u64,
    range: Range,
    #[allow(dead_code)]
    selection_range: Range,
    #[serde(default)]
    children: Vec<NestedSymbol>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentSymbolResponse {
    Nested(Vec<NestedSymbol>),
    Flat(Vec<SymbolInformation>),
}

fn flatten_nested(
    uri: &str,
    symbols: Vec<NestedSymbol>,
    container: Option<&str>,
    out: &mut Vec<DocumentSymbol>,
) {
    for symbol in symbols {
        let location = Location {
            uri: uri.to_string(),
            range: Some(symbol.range),
        };
        out.push(DocumentSymbol {
            name: symbol.name.clone(),
            kind: SymbolKind::from_lsp(symbol.kind),
            container_name: container.map(str::to_string),
            depth: 0,
            location: Some(location.to_symbol_location()),
        });
        flatten_nested(uri, symbol.children, Some(&symbol.name), out);
    }
}

/// Flat symbol list for `uri`. Hierarchical results are flattened with each
/// parent's name recorded as the child's container.
pub(crate) fn parse_document_symbols(
    uri: &str,
    value: Value,
) -> serde_json::Result<Vec<DocumentSymbol>> {
    let response: Option<DocumentSymbolResponse> = serde_json::from_value(value)?;
    Ok(match response {
        None => Vec::new(),
        Some(DocumentSymbolResponse::Flat(items)) => {
            items.into_iter().map(SymbolInformation::into_symbol).collect()
        }
        Some(DocumentSymbolResponse::Nested(items)) => {
            let mut out = Vec::new();
            flatten_nested(uri, items, None, &mut out);
            out
        }
    })
}

/// `SymbolInformation[]` or `WorkspaceSymbol[]` (whose location may omit
/// the range).
pub(crate) fn parse_workspace_symbols(value: Value) -> serde_json::Result<Vec<DocumentSymbol>> {
    let items: Option<Vec<SymbolInformation>> = serde_json::from_value(value)?;
    Ok(items
        .unwrap_or_default()
        .into_iter()
        .map(SymbolInformation::into_symbol)
        .collect())
}

// ── Diagnostics ──

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum NumberOrString {
    Number(i64),
    String(String),
}

impl fmt::Display for NumberOrString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct CodeDescription {
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LspDiagnostic {
    pub range: Range,
    #[serde(default)]
    pub severity: Option<u64>,
    #[serde(default)]
    pub code: Option<NumberOrString>,
    #[serde(default)]
    pub code_description: Option<CodeDescription>,
    #[serde(default)]
    pub source: Option<String>,
    pub message: String,
}

impl LspDiagnostic {
    /// Document-model diagnostic with the 0-based range kept as-is.
    pub fn to_document_diagnostic(&self) -> DocumentDiagnostic {
        DocumentDiagnostic {
            severity: DiagnosticSeverity::from_lsp(self.severity),
            start_line: self.range.start.line,
            start_character: self.range.start.character,
            end_line: self.range.end.line,
            end_character: self.range.end.character,
            message: self.message.clone(),
            code: self.code.as_ref().map(ToString::to_string),
            code_description: self.code_description.as_ref().map(|c| c.href.clone()),
            source: self.source.clone(),
            text: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PublishDiagnosticsParams {
    pub uri: String,
    #[serde(default)]
    pub diagnostics: Vec<LspDiagnostic>,
}

#[derive(Debug, Deserialize)]
struct DocumentDiagnosticReport {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    items: Vec<LspDiagnostic>,
}

/// Items of a `textDocument/diagnostic` report. `unchanged` reports carry
/// no items.
pub(crate) fn parse_diagnostic_report(value: Value) -> serde_json::Result<Vec<LspDiagnostic>> {
    let report: Option<DocumentDiagnosticReport> = serde_json::from_value(value)?;
    Ok(match report {
        Some(r) if r.kind.as_deref() != Some("unchanged") => r.items,
        _ => Vec::new(),
    })
}

// ── Workspace edits ──

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

#[derive(Debug, Deserialize)]
struct DocumentIdentifier {
    uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextDocumentEdit {
    text_document: DocumentIdentifier,
    edits: Vec<TextEdit>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentChange {
    Edit(TextDocumentEdit),
    ResourceOperation(Value),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkspaceEdit {
    #[serde(default)]
    changes: Option<BTreeMap<String, Vec<TextEdit>>>,
    #[serde(default)]
    document_changes: Option<Vec<DocumentChange>>,
}

impl WorkspaceEdit {
    /// Per-document edit lists. `documentChanges` wins when both forms are
    /// present; resource operations (create/rename/delete) are skipped.
    pub fn into_document_edits(self) -> Vec<(String, Vec<TextEdit>)> {
        if let Some(changes) = self.document_changes {
            let mut by_uri: Vec<(String, Vec<TextEdit>)> = Vec::new();
            for change in changes {
                match change {
                    DocumentChange::Edit(edit) => {
                        let uri = edit.text_document.uri;
                        match by_uri.iter_mut().find(|(u, _)| *u == uri) {
                            Some((_, edits)) => edits.extend(edit.edits),
                            None => by_uri.push((uri, edit.edits)),
                        }
                    }
                    DocumentChange::ResourceOperation(op) => {
                        let kind = op.get("kind").and_then(Value::as_str).unwrap_or("unknown");
                        tracing::warn!(
                            "Skipping unsupported resource operation in workspace edit: {kind}"
                        );
                    }
                }
            }
            return by_uri;
        }
        self.changes.unwrap_or_default().into_iter().collect()
    }
}

pub(crate) fn parse_workspace_edit(value: Value) -> serde_json::Result<Option<WorkspaceEdit>> {
    serde_json::from_value(value)
}

// ── Server-initiated payloads ──

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub register_options: Option<Value>,
}

impl Registration {
    /// The diagnostics provider identifier, if the options carry one.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        self.register_options
            .as_ref()?
            .get("identifier")?
            .as_str()
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegistrationParams {
    #[serde(default)]
    pub registrations: Vec<Registration>,
}

/// `window/logMessage`, `window/showMessage` and toast payloads.
#[derive(Debug, Deserialize)]
pub(crate) struct MessageParams {
    #[serde(rename = "type", alias = "messageType", default)]
    pub message_type: Option<u64>,
    #[serde(default)]
    pub message: String,
}

// ── Parameter builders ──

pub(crate) fn initialize_params(root_uri: &str, root_name: &str) -> Value {
    json!({
        "processId": std::process::id(),
        "clientInfo": { "name": "lspbridge", "version": env!("CARGO_PKG_VERSION") },
        "rootUri": root_uri,
        "capabilities": {
            "textDocument": {
                "synchronization": {
                    "dynamicRegistration": false,
                    "didSave": false
                },
                "publishDiagnostics": {
                    "relatedInformation": true,
                    "versionSupport": true,
                    "codeDescriptionSupport": true,
                    "dataSupport": true
                },
                "diagnostic": {
                    "dynamicRegistration": true,
                    "relatedDocumentSupport": true
                },
                "hover": { "contentFormat": ["markdown", "plaintext"] },
                "completion": { "completionItem": { "snippetSupport": false } },
                "documentSymbol": { "hierarchicalDocumentSymbolSupport": true },
                "definition": { "linkSupport": true },
                "typeDefinition": { "linkSupport": true },
                "implementation": { "linkSupport": true },
                "rename": { "prepareSupport": true }
            },
            "workspace": {
                "workspaceFolders": true,
                "configuration": true,
                "applyEdit": false,
                "diagnostics": { "refreshSupport": true },
                "symbol": { "dynamicRegistration": false }
            },
            "window": {
                "showMessage": {},
                "workDoneProgress": false
            }
        },
        "workspaceFolders": [{
            "uri": root_uri,
            "name": root_name
        }]
    })
}

pub(crate) fn did_open_params(uri: &str, language_id: &str, version: i32, text: &str) -> Value {
    json!({
        "textDocument": {
            "uri": uri,
            "languageId": language_id,
            "version": version,
            "text": text
        }
    })
}

pub(crate) fn text_document_params(uri: &str) -> Value {
    json!({ "textDocument": { "uri": uri } })
}

pub(crate) fn text_document_position_params(uri: &str, position: EditorPosition) -> Value {
    json!({
        "textDocument": { "uri": uri },
        "position": Position::from(position)
    })
}

pub(crate) fn reference_params(uri: &str, position: EditorPosition) -> Value {
    let mut params = text_document_position_params(uri, position);
    params["context"] = json!({ "includeDeclaration": true });
    params
}

pub(crate) fn completion_params(uri: &str, position: EditorPosition) -> Value {
    let mut params = text_document_position_params(uri, position);
    params["context"] = json!({ "triggerKind": 1 });
    params
}

pub(crate) fn rename_params(uri: &str, position: EditorPosition, new_name: &str) -> Value {
    let mut params = text_document_position_params(uri, position);
    params["newName"] = json!(new_name);
    params
}

pub(crate) fn workspace_symbol_params(query: &str) -> Value {
    json!({ "query": query })
}

pub(crate) fn diagnostic_params(uri: &str, identifier: Option<&str>) -> Value {
    let mut params = text_document_params(uri);
    if let Some(identifier) = identifier {
        params["identifier"] = json!(identifier);
    }
    params
}

// ── Paths ──

pub fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}

#[must_use]
pub fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
}
