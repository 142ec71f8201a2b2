use serde::Serialize;

/// Machine-readable classification of a failed tool operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    Unknown,
    WorkspaceLoadInProgress,
    NotFound,
    NotInitialized,
    StartupFailed,
}

impl ErrorCode {
    /// Whether the caller should retry the same request later.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::WorkspaceLoadInProgress)
    }
}
