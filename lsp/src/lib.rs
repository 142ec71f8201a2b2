//! Language server orchestration for lspbridge.
//!
//! [`LspService`] owns one language server session: it spawns the process,
//! speaks JSON-RPC over stdio, tracks server-pushed state and exposes each
//! code-intelligence query as a single async call taking 1-based editor
//! positions.

pub mod codec;

pub(crate) mod client;
pub(crate) mod connection;
pub(crate) mod diagnostics;
pub(crate) mod edits;
pub(crate) mod enrich;
pub(crate) mod handlers;
pub(crate) mod lifecycle;
pub(crate) mod protocol;
pub(crate) mod readiness;
pub(crate) mod signal;
pub(crate) mod symbols;
pub(crate) mod transport;

mod error;
mod service;

pub use error::ServiceError;
pub use handlers::UnhandledMessage;
pub use protocol::{PathToUriError, ResponseError, file_uri_to_path, path_to_file_uri};
pub use service::LspService;
