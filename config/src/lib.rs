//! Language server profiles and process configuration.
//!
//! A profile describes how to launch and talk to one kind of language
//! server: its command line, which file extensions it understands, how it
//! delivers diagnostics and which symbols are worth returning. Profiles come
//! from three layers (built-in, package defaults, user files) merged by
//! [`ProfileResolver`].

mod builtin;
mod command_line;
mod language;
mod loader;
mod process;
mod profile;
mod resolver;

pub use builtin::builtin_profiles;
pub use command_line::{CommandLine, CommandLineError};
pub use language::LanguageIdMapper;
pub use loader::{ProfilesFile, package_profiles_path, user_profiles_path};
pub use process::{DEFAULT_REQUEST_TIMEOUT, ProcessConfig, WorkspaceKind};
pub use profile::{
    DEFAULT_WAIT_TIMEOUT_MS, DiagnosticStrategy, DiagnosticsSettings, LspProfile, SymbolsSettings,
};
pub use resolver::{ProfileError, ProfileResolver};
