//! Core domain types for lspbridge.
//!
//! Pure data with no IO and no async. The orchestration layer converts raw
//! protocol payloads into these types before handing them to callers, so
//! everything here uses editor conventions (1-based positions, label strings
//! for enumerations) unless a type says otherwise.

#![allow(clippy::missing_errors_doc)]

mod completion;
mod diagnostic;
mod edit;
mod error;
mod log;
mod position;
mod symbol;

pub use completion::{CompletionItem, CompletionItemKind, CompletionResult};
pub use diagnostic::{DiagnosticSeverity, DocumentDiagnostic, sort_diagnostics};
pub use edit::{FileChangeResult, RenameOutcome, WorkspaceEditResult};
pub use error::ErrorCode;
pub use log::{MessageType, WindowLogMessage};
pub use position::{EditorPosition, InvalidPositionError};
pub use symbol::{DocumentSymbol, HoverResult, SymbolKind, SymbolLocation};
