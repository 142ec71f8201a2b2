use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::command_line::{CommandLine, CommandLineError};

pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 3000;

/// How diagnostics are obtained from the server.
///
/// Unrecognized strings are kept verbatim so the resolver can warn about
/// them before falling back to pull.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum DiagnosticStrategy {
    #[default]
    Pull,
    Push,
    Unrecognized(String),
}

impl From<String> for DiagnosticStrategy {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pull" => Self::Pull,
            "push" => Self::Push,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<&str> for DiagnosticStrategy {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSettings {
    pub strategy: DiagnosticStrategy,
    pub wait_timeout_ms: u64,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            strategy: DiagnosticStrategy::Pull,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
        }
    }
}

impl DiagnosticsSettings {
    #[must_use]
    pub fn push(wait_timeout_ms: u64) -> Self {
        Self {
            strategy: DiagnosticStrategy::Push,
            wait_timeout_ms,
        }
    }

    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SymbolsSettings {
    /// Deepest nesting level returned. `0` keeps top-level symbols only.
    pub max_depth: Option<u32>,
    /// Kind names to keep. Empty keeps every kind.
    pub kinds: Vec<String>,
}

/// One language server's launch and behavior settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LspProfile {
    pub command: Option<String>,
    /// Extension (with leading dot) to protocol language id.
    pub extensions: BTreeMap<String, String>,
    /// Glob patterns matched against the workspace root for auto-detection.
    pub workspace_files: Vec<String>,
    pub diagnostics: Option<DiagnosticsSettings>,
    pub symbols: Option<SymbolsSettings>,
    pub environment: BTreeMap<String, String>,
}

impl LspProfile {
    pub fn parse_command(&self) -> Result<CommandLine, CommandLineError> {
        CommandLine::parse(self.command.as_deref().unwrap_or_default())
    }

    /// Language id for `extension`, with or without the leading dot.
    #[must_use]
    pub fn language_id_for_extension(&self, extension: &str) -> Option<&str> {
        let wanted = normalize_extension(extension);
        self.extensions
            .iter()
            .find(|(ext, _)| normalize_extension(ext) == wanted)
            .map(|(_, id)| id.as_str())
    }

    #[must_use]
    pub fn supports_extension(&self, extension: &str) -> bool {
        self.language_id_for_extension(extension).is_some()
    }
}

pub(crate) fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}
