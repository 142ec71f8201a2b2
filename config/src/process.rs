use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::profile::LspProfile;
use crate::resolver::ProfileError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What the server is asked to load after the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceKind {
    Solution(PathBuf),
    Projects(Vec<PathBuf>),
    Folder,
}

impl WorkspaceKind {
    /// Solutions and project sets are loaded in the background; queries are
    /// meaningless until the server reports the load finished.
    #[must_use]
    pub fn requires_async_load(&self) -> bool {
        !matches!(self, Self::Folder)
    }
}

/// Everything needed to launch one language server session.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub command: String,
    pub args: Vec<String>,
    pub workspace: PathBuf,
    pub solution: Option<PathBuf>,
    pub projects: Vec<PathBuf>,
    pub profile: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub request_timeout: Duration,
}

impl ProcessConfig {
    #[must_use]
    pub fn new(command: impl Into<String>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            workspace: workspace.into(),
            solution: None,
            projects: Vec::new(),
            profile: None,
            environment: BTreeMap::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Launch settings taken from a named profile.
    pub fn from_profile(
        name: &str,
        profile: &LspProfile,
        workspace: &Path,
    ) -> Result<Self, ProfileError> {
        if profile.command.as_deref().is_none_or(|c| c.trim().is_empty()) {
            return Err(ProfileError::MissingCommand(name.to_string()));
        }
        let command = profile
            .parse_command()
            .map_err(|source| ProfileError::Command {
                name: name.to_string(),
                source,
            })?;

        Ok(Self {
            args: command.args,
            profile: Some(name.to_string()),
            environment: profile.environment.clone(),
            ..Self::new(command.program, workspace)
        })
    }

    #[must_use]
    pub fn workspace_kind(&self) -> WorkspaceKind {
        if let Some(solution) = &self.solution {
            WorkspaceKind::Solution(self.absolute(solution))
        } else if !self.projects.is_empty() {
            WorkspaceKind::Projects(self.projects.iter().map(|p| self.absolute(p)).collect())
        } else {
            WorkspaceKind::Folder
        }
    }

    #[must_use]
    pub fn requires_async_load(&self) -> bool {
        self.workspace_kind().requires_async_load()
    }

    /// Resolve `path` against the workspace root when it is relative.
    #[must_use]
    pub fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }
}
