use std::path::PathBuf;

use lspbridge_types::ErrorCode;

/// Failure of a tool-facing operation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to start language server: {0:#}")]
    Startup(#[source] anyhow::Error),

    #[error("workspace is still loading, retry shortly")]
    WorkspaceLoading,

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{message}")]
    Operation {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("language server session is not initialized")]
    NotInitialized,
}

impl ServiceError {
    pub(crate) fn operation(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Operation {
            message: message.into(),
            source,
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Startup(_) => ErrorCode::StartupFailed,
            Self::WorkspaceLoading => ErrorCode::WorkspaceLoadInProgress,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::Operation { .. } => ErrorCode::Unknown,
        }
    }
}
