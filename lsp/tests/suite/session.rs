//! Handshake, readiness and teardown.

use std::time::Duration;

use lspbridge_config::ProfileResolver;
use lspbridge_lsp::{LspService, ServiceError};
use lspbridge_types::{EditorPosition, ErrorCode, MessageType};
use serde_json::{Value, json};

use crate::common::{Script, Workspace, connect, notification, server_request};

fn at(line: u32, character: u32) -> EditorPosition {
    EditorPosition::new(line, character).unwrap()
}

fn solution_service(workspace: &Workspace) -> LspService {
    let solution = workspace.root().join("App.sln");
    std::fs::write(&solution, "").unwrap();
    let mut config = workspace.config();
    config.solution = Some(solution);
    LspService::new(config, ProfileResolver::builtin())
}

// ── Handshake ──

#[tokio::test]
async fn handshake_sends_initialize_then_initialized() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let server = connect(&service, Script::new()).await;

    let params = server.received.params_of("initialize").unwrap();
    let root = lspbridge_lsp::path_to_file_uri(workspace.root()).unwrap();
    assert_eq!(params["rootUri"], json!(root.as_str()));
    assert_eq!(
        params["capabilities"]["textDocument"]["rename"]["prepareSupport"],
        json!(true)
    );

    service.shutdown().await;
    server.task.await.unwrap();
    let methods = server.received.methods();
    assert_eq!(&methods[..2], ["initialize", "initialized"]);
}

#[tokio::test]
async fn initializing_twice_is_an_error() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let _server = connect(&service, Script::new()).await;

    let (_a, b) = tokio::io::duplex(64);
    let (read, write) = tokio::io::split(b);
    let err = service.initialize_with_io(read, write).await.unwrap_err();
    assert!(matches!(err, ServiceError::Operation { .. }));
}

#[tokio::test]
async fn queries_before_initialize_fail() {
    let workspace = Workspace::new();
    let service = workspace.service();

    let err = service.hover(&workspace.file, at(1, 1)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotInitialized);
    assert!(matches!(
        service.wait_for_ready(Duration::from_millis(10)).await,
        Err(ServiceError::NotInitialized)
    ));
}

#[tokio::test]
async fn missing_server_binary_is_a_startup_error() {
    let workspace = Workspace::new();
    let mut config = workspace.config();
    config.command = "lspbridge-no-such-server".to_string();
    let service = LspService::new(config, ProfileResolver::builtin());

    let err = service.initialize().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::StartupFailed);
}

// ── Readiness ──

#[tokio::test]
async fn solution_workspace_blocks_queries_until_loaded() {
    let workspace = Workspace::new();
    let service = solution_service(&workspace);
    let server = connect(&service, Script::new()).await;

    let err = service.hover(&workspace.file, at(1, 1)).await.unwrap_err();
    assert!(matches!(err, ServiceError::WorkspaceLoading));
    assert!(err.code().is_retryable());
    assert!(!service.wait_for_ready(Duration::from_millis(50)).await.unwrap());

    // Rejected before the document was ever opened.
    assert!(!server
        .received
        .methods()
        .contains(&"textDocument/didOpen".to_string()));
}

#[tokio::test]
async fn solution_open_and_completion_signal() {
    let workspace = Workspace::new();
    let service = solution_service(&workspace);
    let script = Script::new()
        .push_on(
            "solution/open",
            notification("workspace/projectInitializationComplete", Value::Null),
        )
        .reply("textDocument/hover", json!({ "contents": "int Count" }));
    let server = connect(&service, script).await;

    assert!(service.wait_for_ready(Duration::from_secs(5)).await.unwrap());
    let hover = service.hover(&workspace.file, at(5, 20)).await.unwrap();
    assert_eq!(hover.value, "int Count");

    let params = server.received.params_of("solution/open").unwrap();
    let solution = lspbridge_lsp::path_to_file_uri(&workspace.root().join("App.sln")).unwrap();
    assert_eq!(params, json!({ "solution": solution.as_str() }));
}

#[tokio::test]
async fn folder_workspace_is_ready_immediately() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let _server = connect(&service, Script::new()).await;

    assert!(service.wait_for_ready(Duration::ZERO).await.unwrap());
}

// ── Server messages ──

#[tokio::test]
async fn server_messages_are_recorded() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let script = Script::new()
        .push_on(
            "textDocument/hover",
            notification("window/logMessage", json!({ "type": 2, "message": "loading" })),
        )
        .push_on(
            "textDocument/hover",
            notification("window/_roslyn_showToast", json!({ "messageType": 3, "message": "done" })),
        )
        .push_on("textDocument/hover", notification("custom/progress", json!([1, 2])))
        .push_on(
            "textDocument/hover",
            server_request(7, "workspace/configuration", json!({ "items": [{}] })),
        );
    let server = connect(&service, script).await;

    service.hover(&workspace.file, at(1, 1)).await.unwrap();

    let logs = service.window_log_messages().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "loading");
    assert_eq!(logs[0].message_type, MessageType::Warning);

    let toasts = service.toast_messages().await.unwrap();
    assert_eq!(toasts[0].message, "done");

    let notifications = service.unhandled_notifications().await.unwrap();
    assert_eq!(notifications[0].method, "custom/progress");
    assert_eq!(notifications[0].argument_count, 2);

    let requests = service.unhandled_requests().await.unwrap();
    assert_eq!(requests[0].method, "workspace/configuration");

    service.shutdown().await;
    server.task.await.unwrap();
    let answered = server
        .received
        .frames()
        .into_iter()
        .find(|f| f.get("id") == Some(&json!(7)) && f.get("method").is_none())
        .unwrap();
    assert_eq!(answered["result"], json!([]));
}

// ── Teardown ──

#[tokio::test]
async fn shutdown_sends_shutdown_then_exit() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let server = connect(&service, Script::new()).await;

    service.shutdown().await;
    server.task.await.unwrap();

    let methods = server.received.methods();
    let tail: Vec<&str> = methods.iter().rev().take(2).rev().map(String::as_str).collect();
    assert_eq!(tail, ["shutdown", "exit"]);

    // A second shutdown is a no-op; the session is gone.
    service.shutdown().await;
    let err = service.hover(&workspace.file, at(1, 1)).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotInitialized));
}

#[tokio::test]
async fn dispose_skips_the_handshake() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let server = connect(&service, Script::new()).await;

    service.dispose().await;
    server.task.await.unwrap();

    assert!(!server.received.methods().contains(&"shutdown".to_string()));
    assert!(matches!(
        service.window_log_messages().await,
        Err(ServiceError::NotInitialized)
    ));
}
