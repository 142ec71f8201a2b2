//! Diagnostics in the document model.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Information,
    Hint,
    Unknown,
}

impl DiagnosticSeverity {
    /// Map the LSP numeric severity. Missing or out-of-range values are
    /// `Unknown`.
    #[must_use]
    pub fn from_lsp(value: Option<u64>) -> Self {
        match value {
            Some(1) => Self::Error,
            Some(2) => Self::Warning,
            Some(3) => Self::Information,
            Some(4) => Self::Hint,
            _ => Self::Unknown,
        }
    }

    /// Sort rank, most severe first.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Error => 1,
            Self::Warning => 2,
            Self::Information => 3,
            Self::Hint => 4,
            Self::Unknown => 5,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Information => "Information",
            Self::Hint => "Hint",
            Self::Unknown => "Unknown",
        }
    }
}

/// A diagnostic with a 0-based range, as the server reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentDiagnostic {
    pub severity: DiagnosticSeverity,
    pub start_line: u32,
    pub start_character: u32,
    pub end_line: u32,
    pub end_character: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Order by severity rank, then start line, then start character.
pub fn sort_diagnostics(diagnostics: &mut [DocumentDiagnostic]) {
    diagnostics.sort_by_key(|d| (d.severity.rank(), d.start_line, d.start_character));
}
