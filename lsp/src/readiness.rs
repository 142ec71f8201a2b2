//! Workspace readiness gate.

use std::time::Duration;

use tokio::sync::watch;

use crate::error::ServiceError;

/// Answers "may queries run yet?". Folder workspaces are ready at once;
/// solution and project workspaces wait for the server's load signal.
#[derive(Debug, Clone)]
pub(crate) struct ReadinessGate {
    requires_async_load: bool,
    loaded: watch::Receiver<bool>,
}

impl ReadinessGate {
    pub fn new(requires_async_load: bool, loaded: watch::Receiver<bool>) -> Self {
        Self {
            requires_async_load,
            loaded,
        }
    }

    pub fn is_ready(&self) -> bool {
        !self.requires_async_load || *self.loaded.borrow()
    }

    pub fn ensure_ready(&self) -> Result<(), ServiceError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(ServiceError::WorkspaceLoading)
        }
    }

    /// `true` once ready, `false` if `timeout` elapsed first.
    pub async fn wait(&self, timeout: Duration) -> bool {
        if self.is_ready() {
            return true;
        }
        let mut loaded = self.loaded.clone();
        matches!(
            tokio::time::timeout(timeout, loaded.wait_for(|done| *done)).await,
            Ok(Ok(_))
        )
    }
}
