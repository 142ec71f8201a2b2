//! Scoped didOpen/didClose around document queries.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lspbridge_config::LanguageIdMapper;

use crate::error::ServiceError;
use crate::protocol;

/// The document-sync half of the client.
pub(crate) trait DocumentSync: Send + Sync {
    fn open(
        &self,
        uri: &str,
        language_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn close(&self, uri: &str) -> impl Future<Output = Result<()>> + Send;

    /// Queue a close without waiting; used when the scope is abandoned.
    fn close_now(&self, uri: &str) -> Result<()>;
}

/// Sends the close for a document whose operation was dropped mid-flight.
struct CloseOnDrop<'a, S: DocumentSync> {
    sync: &'a S,
    uri: Option<String>,
}

impl<S: DocumentSync> CloseOnDrop<'_, S> {
    fn disarm(mut self) -> String {
        self.uri.take().unwrap_or_default()
    }
}

impl<S: DocumentSync> Drop for CloseOnDrop<'_, S> {
    fn drop(&mut self) {
        let Some(uri) = self.uri.take() else { return };
        tracing::debug!("Operation on {uri} abandoned, closing document");
        if let Err(e) = self.sync.close_now(&uri) {
            tracing::warn!("Failed to close {uri}: {e:#}");
        }
    }
}

/// A document that is open on the server for the duration of one operation.
#[derive(Debug, Clone)]
pub(crate) struct OpenDocument {
    pub path: PathBuf,
    pub uri: String,
    pub text: String,
}

/// Absolute path for `file`, relative paths resolved against `workspace`.
pub(crate) fn resolve_document_path(workspace: &Path, file: &Path) -> Result<PathBuf, ServiceError> {
    let path = if file.is_absolute() {
        file.to_path_buf()
    } else {
        workspace.join(file)
    };
    if path.is_file() {
        Ok(path)
    } else {
        Err(ServiceError::NotFound(path))
    }
}

/// Open `file`, run `op`, close it again. The close is sent on every exit
/// path of `op`, including the returned future being dropped; a failed
/// close is only logged.
pub(crate) async fn with_document<S, T, F, Fut>(
    sync: &S,
    mapper: &LanguageIdMapper,
    workspace: &Path,
    file: &Path,
    op: F,
) -> Result<T, ServiceError>
where
    S: DocumentSync,
    F: FnOnce(OpenDocument) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let path = resolve_document_path(workspace, file)?;
    let document = load_document(path)
        .await
        .map_err(|e| ServiceError::operation("Failed to read document", e))?;
    let language_id = mapper.language_id(&document.path);

    sync.open(&document.uri, &language_id, &document.text)
        .await
        .map_err(|e| ServiceError::operation("Failed to open document", e))?;

    let guard = CloseOnDrop {
        sync,
        uri: Some(document.uri.clone()),
    };
    let result = op(document).await;

    let uri = guard.disarm();
    if let Err(e) = sync.close(&uri).await {
        tracing::warn!("Failed to close {uri}: {e:#}");
    }
    result
}

async fn load_document(path: PathBuf) -> Result<OpenDocument> {
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let uri = protocol::path_to_file_uri(&path)?.to_string();
    Ok(OpenDocument { path, uri, text })
}
