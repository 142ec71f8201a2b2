//! Diagnostics: the push store and the pull/push retrieval strategies.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use dashmap::DashMap;
use lspbridge_config::{DiagnosticStrategy, DiagnosticsSettings};
use serde_json::Value;

use crate::protocol::{self, LspDiagnostic, Registration};

const DIAGNOSTIC_METHOD: &str = "textDocument/diagnostic";

/// Latest `publishDiagnostics` batch per document URI.
#[derive(Debug, Default)]
pub(crate) struct DiagnosticsStore {
    by_uri: DashMap<String, Vec<LspDiagnostic>>,
}

impl DiagnosticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the batch for `uri`. An empty batch clears the findings but
    /// keeps the entry.
    pub fn publish(&self, uri: String, items: Vec<LspDiagnostic>) {
        self.by_uri.insert(uri, items);
    }

    pub fn get(&self, uri: &str) -> Option<Vec<LspDiagnostic>> {
        self.by_uri.get(uri).map(|entry| entry.value().clone())
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.by_uri.is_empty()
    }

    /// Exact URI lookup, then a pass comparing normalized file paths.
    pub fn lookup(&self, uri: &str, path: &Path) -> Option<Vec<LspDiagnostic>> {
        if let Some(items) = self.get(uri) {
            return Some(items);
        }
        let wanted = comparable_path(path);
        self.by_uri.iter().find_map(|entry| {
            let candidate = protocol::file_uri_to_path(entry.key())?;
            (comparable_path(&candidate) == wanted).then(|| entry.value().clone())
        })
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut out = Vec::new();
    for c in path.components() {
        match c {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Normalized path string, lowercased on case-insensitive file systems.
fn comparable_path(path: &Path) -> String {
    let normalized = normalize_path(path).to_string_lossy().into_owned();
    if cfg!(any(windows, target_os = "macos")) {
        normalized.to_lowercase()
    } else {
        normalized
    }
}

/// How diagnostics are retrieved for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retrieval {
    Pull,
    Push { wait: Duration },
}

impl Retrieval {
    pub fn from_settings(settings: &DiagnosticsSettings) -> Self {
        match &settings.strategy {
            DiagnosticStrategy::Pull => Self::Pull,
            DiagnosticStrategy::Push => Self::Push {
                wait: settings.wait_timeout(),
            },
            DiagnosticStrategy::Unrecognized(other) => {
                tracing::warn!("Unknown diagnostics strategy '{other}', falling back to pull");
                Self::Pull
            }
        }
    }
}

/// Pull provider identifiers from the initialize capabilities and from
/// dynamic `textDocument/diagnostic` registrations, deduplicated in
/// first-seen order.
pub(crate) fn discover_providers(
    capabilities: Option<&Value>,
    registrations: &[Registration],
) -> Vec<String> {
    let static_id = capabilities
        .and_then(|caps| caps.get("diagnosticProvider"))
        .and_then(|provider| provider.get("identifier"))
        .and_then(Value::as_str);
    let dynamic_ids = registrations
        .iter()
        .filter(|reg| reg.method == DIAGNOSTIC_METHOD)
        .filter_map(Registration::identifier);

    let mut providers: Vec<String> = Vec::new();
    for id in static_id.into_iter().chain(dynamic_ids) {
        if !id.is_empty() && !providers.iter().any(|p| p == id) {
            providers.push(id.to_string());
        }
    }
    providers
}

/// Ask every provider in turn. A failing provider is logged and skipped.
pub(crate) async fn pull_from_providers<F, Fut>(
    providers: &[String],
    mut fetch: F,
) -> Vec<LspDiagnostic>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Vec<LspDiagnostic>>>,
{
    let mut items = Vec::new();
    for provider in providers {
        match fetch(provider.clone()).await {
            Ok(found) => {
                tracing::debug!(provider = %provider, count = found.len(), "Pulled diagnostics");
                items.extend(found);
            }
            Err(e) => {
                tracing::warn!("Diagnostics provider '{provider}' failed: {e:#}");
            }
        }
    }
    items
}

/// Wait the full push window, then read whatever the server published.
pub(crate) async fn wait_for_push(
    store: &DiagnosticsStore,
    uri: &str,
    path: &Path,
    wait: Duration,
) -> Vec<LspDiagnostic> {
    tokio::time::sleep(wait).await;
    match store.lookup(uri, path) {
        Some(items) => items,
        None => {
            tracing::debug!(uri, "No pushed diagnostics after {}ms", wait.as_millis());
            Vec::new()
        }
    }
}
