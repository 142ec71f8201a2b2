//! Results of applying a workspace edit.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChangeResult {
    pub file_path: String,
    pub edits_applied: usize,
    pub lines_changed: usize,
}

/// Aggregate of one workspace edit. Files in `changed_files` were written;
/// files named in `errors` were left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkspaceEditResult {
    pub changed_files: Vec<FileChangeResult>,
    pub errors: Vec<String>,
}

impl WorkspaceEditResult {
    #[must_use]
    pub fn total_edits(&self) -> usize {
        self.changed_files.iter().map(|f| f.edits_applied).sum()
    }

    #[must_use]
    pub fn total_lines_changed(&self) -> usize {
        self.changed_files.iter().map(|f| f.lines_changed).sum()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameOutcome {
    pub success: bool,
    pub changed_files: Vec<FileChangeResult>,
    pub total_edits: usize,
    pub total_lines_changed: usize,
    pub errors: Vec<String>,
}

impl RenameOutcome {
    /// A rename the server refused before producing any edits.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            changed_files: Vec::new(),
            total_edits: 0,
            total_lines_changed: 0,
            errors: vec![reason.into()],
        }
    }
}

impl From<WorkspaceEditResult> for RenameOutcome {
    fn from(result: WorkspaceEditResult) -> Self {
        Self {
            success: result.is_success(),
            total_edits: result.total_edits(),
            total_lines_changed: result.total_lines_changed(),
            changed_files: result.changed_files,
            errors: result.errors,
        }
    }
}
