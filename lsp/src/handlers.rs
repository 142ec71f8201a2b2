//! Handlers for messages the server pushes to us.
//!
//! One [`HandlerRegistry`] is built per session. Every handler only appends
//! to a queue or flips a signal, so the connection's reader task is never
//! blocked by a slow consumer.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use lspbridge_types::{MessageType, WindowLogMessage};
use serde::Serialize;
use serde_json::{Value, json};

use crate::connection::MessageHandler;
use crate::diagnostics::DiagnosticsStore;
use crate::protocol::{MessageParams, PublishDiagnosticsParams, Registration, RegistrationParams};
use crate::signal::Signal;

const PUBLISH_DIAGNOSTICS: &str = "textDocument/publishDiagnostics";
const LOG_MESSAGE: &str = "window/logMessage";
const SHOW_MESSAGE: &str = "window/showMessage";
const SHOW_TOAST: &str = "window/_roslyn_showToast";
const PROJECT_INITIALIZATION_COMPLETE: &str = "workspace/projectInitializationComplete";
const REGISTER_CAPABILITY: &str = "client/registerCapability";
const DIAGNOSTIC_REFRESH: &str = "workspace/diagnostic/refresh";

/// Thread-safe append-only list.
#[derive(Debug)]
pub(crate) struct AppendQueue<T> {
    items: Mutex<Vec<T>>,
}

impl<T: Clone> AppendQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, item: T) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
    }

    pub fn extend(&self, items: impl IntoIterator<Item = T>) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(items);
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A server message nothing specific handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnhandledMessage {
    pub method: String,
    pub argument_count: usize,
    pub received_at: DateTime<Utc>,
}

impl UnhandledMessage {
    fn new(method: &str, params: Option<&Value>) -> Self {
        Self {
            method: method.to_string(),
            argument_count: argument_count(params),
            received_at: Utc::now(),
        }
    }
}

fn argument_count(params: Option<&Value>) -> usize {
    match params {
        None | Some(Value::Null) => 0,
        Some(Value::Array(items)) => items.len(),
        Some(_) => 1,
    }
}

/// Reply for a server request no specific handler claimed.
fn default_response(method: &str) -> Value {
    match method {
        "workspace/configuration" => json!([]),
        "workspace/applyEdit" => json!({ "applied": false, "failureReason": "Not implemented" }),
        "client/unregisterCapability" => json!({}),
        _ => Value::Null,
    }
}

#[derive(Debug)]
pub(crate) struct HandlerRegistry {
    diagnostics: DiagnosticsStore,
    log_messages: AppendQueue<WindowLogMessage>,
    toasts: AppendQueue<WindowLogMessage>,
    registrations: AppendQueue<Registration>,
    first_registration: Signal,
    project_initialized: Signal,
    unhandled_notifications: AppendQueue<UnhandledMessage>,
    unhandled_requests: AppendQueue<UnhandledMessage>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            diagnostics: DiagnosticsStore::new(),
            log_messages: AppendQueue::new(),
            toasts: AppendQueue::new(),
            registrations: AppendQueue::new(),
            first_registration: Signal::new(),
            project_initialized: Signal::new(),
            unhandled_notifications: AppendQueue::new(),
            unhandled_requests: AppendQueue::new(),
        }
    }

    pub fn diagnostics(&self) -> &DiagnosticsStore {
        &self.diagnostics
    }

    pub fn log_messages(&self) -> Vec<WindowLogMessage> {
        self.log_messages.snapshot()
    }

    pub fn toast_messages(&self) -> Vec<WindowLogMessage> {
        self.toasts.snapshot()
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.registrations.snapshot()
    }

    /// Fired by the first `client/registerCapability` batch.
    pub fn first_registration(&self) -> &Signal {
        &self.first_registration
    }

    /// Fired by `workspace/projectInitializationComplete`.
    pub fn project_initialized(&self) -> &Signal {
        &self.project_initialized
    }

    pub fn unhandled_notifications(&self) -> Vec<UnhandledMessage> {
        self.unhandled_notifications.snapshot()
    }

    pub fn unhandled_requests(&self) -> Vec<UnhandledMessage> {
        self.unhandled_requests.snapshot()
    }

    fn on_publish_diagnostics(&self, params: Option<Value>) {
        let Some(params) = params else { return };
        match serde_json::from_value::<PublishDiagnosticsParams>(params) {
            Ok(published) => {
                tracing::debug!(
                    uri = %published.uri,
                    count = published.diagnostics.len(),
                    "Diagnostics published"
                );
                self.diagnostics
                    .publish(published.uri, published.diagnostics);
            }
            Err(e) => tracing::debug!("Failed to parse publishDiagnostics: {e}"),
        }
    }

    fn on_message(queue: &AppendQueue<WindowLogMessage>, method: &str, params: Option<Value>) {
        let Some(params) = params else { return };
        match serde_json::from_value::<MessageParams>(params) {
            Ok(msg) => queue.push(WindowLogMessage {
                message_type: MessageType::from_lsp(msg.message_type),
                message: msg.message,
            }),
            Err(e) => tracing::debug!("Failed to parse {method} params: {e}"),
        }
    }

    fn on_register_capability(&self, params: Option<Value>) {
        let registrations = params
            .map(serde_json::from_value::<RegistrationParams>)
            .transpose();
        match registrations {
            Ok(Some(params)) => {
                for reg in &params.registrations {
                    tracing::debug!(id = %reg.id, method = %reg.method, "Capability registered");
                }
                self.registrations.extend(params.registrations);
                self.first_registration.fire();
            }
            Ok(None) => {}
            Err(e) => tracing::debug!("Failed to parse registerCapability params: {e}"),
        }
    }
}

impl MessageHandler for HandlerRegistry {
    fn on_notification(&self, method: &str, params: Option<Value>) {
        match method {
            PUBLISH_DIAGNOSTICS => self.on_publish_diagnostics(params),
            LOG_MESSAGE | SHOW_MESSAGE => Self::on_message(&self.log_messages, method, params),
            SHOW_TOAST => Self::on_message(&self.toasts, method, params),
            PROJECT_INITIALIZATION_COMPLETE => {
                if self.project_initialized.fire() {
                    tracing::info!("Server finished loading the workspace");
                }
            }
            _ => {
                tracing::trace!("Unhandled notification: {method}");
                self.unhandled_notifications
                    .push(UnhandledMessage::new(method, params.as_ref()));
            }
        }
    }

    fn on_request(&self, method: &str, params: Option<Value>) -> Value {
        match method {
            REGISTER_CAPABILITY => {
                self.on_register_capability(params);
                Value::Null
            }
            DIAGNOSTIC_REFRESH => Value::Null,
            _ => {
                tracing::debug!("Answering unhandled server request {method} with a default");
                self.unhandled_requests
                    .push(UnhandledMessage::new(method, params.as_ref()));
                default_response(method)
            }
        }
    }
}
