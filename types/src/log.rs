use serde::Serialize;

/// `window/logMessage` message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageType {
    Error,
    Warning,
    Info,
    Log,
}

impl MessageType {
    /// Unrecognized values fall back to `Log`.
    #[must_use]
    pub fn from_lsp(value: Option<u64>) -> Self {
        match value {
            Some(1) => Self::Error,
            Some(2) => Self::Warning,
            Some(3) => Self::Info,
            _ => Self::Log,
        }
    }
}

/// A message the server pushed to the client window, either through
/// `window/logMessage` or a server-specific toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowLogMessage {
    pub message_type: MessageType,
    pub message: String,
}
