//! Pull and push diagnostics through a live session.

use std::path::Path;

use lspbridge_config::{ProfileResolver, ProfilesFile};
use lspbridge_lsp::LspService;
use lspbridge_types::DiagnosticSeverity;
use serde_json::json;

use crate::common::{Script, Workspace, connect, notification, range, server_request};

fn report() -> serde_json::Value {
    json!({
        "kind": "full",
        "items": [
            { "range": range(8, 12, 8, 17), "severity": 2, "code": "CS0219", "source": "csharp", "message": "assigned but never used" },
            { "range": range(4, 19, 4, 24), "severity": 1, "code": 103, "message": "does not exist" }
        ]
    })
}

#[tokio::test]
async fn pull_uses_static_provider_and_sorts() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let script = Script::new()
        .capabilities(json!({ "diagnosticProvider": { "identifier": "syntax", "interFileDependencies": false } }))
        .reply("textDocument/diagnostic", report());
    let server = connect(&service, script).await;

    let found = service.diagnostics(&workspace.file).await.unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].severity, DiagnosticSeverity::Error);
    assert_eq!(found[0].code.as_deref(), Some("103"));
    assert_eq!(found[0].text.as_deref(), Some("static int Count;"));
    assert_eq!(found[1].severity, DiagnosticSeverity::Warning);
    assert_eq!(found[1].source.as_deref(), Some("csharp"));
    assert_eq!(found[1].start_line, 8);

    let params = server.received.params_of("textDocument/diagnostic").unwrap();
    assert_eq!(params["identifier"], json!("syntax"));
    assert_eq!(params["textDocument"]["uri"], json!(workspace.uri()));
}

#[tokio::test]
async fn pull_discovers_dynamically_registered_providers() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let registration = server_request(
        1,
        "client/registerCapability",
        json!({
            "registrations": [{
                "id": "diag-1",
                "method": "textDocument/diagnostic",
                "registerOptions": { "identifier": "DocumentCompilerSemantic" }
            }]
        }),
    );
    let script = Script::new()
        .push_on("initialize", registration)
        .reply("textDocument/diagnostic", report());
    let server = connect(&service, script).await;

    assert!(service.registrations_observed().await.unwrap());
    let found = service.diagnostics(&workspace.file).await.unwrap();
    assert_eq!(found.len(), 2);

    let params = server.received.params_of("textDocument/diagnostic").unwrap();
    assert_eq!(params["identifier"], json!("DocumentCompilerSemantic"));
}

#[tokio::test]
async fn pull_without_providers_is_empty() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let server = connect(&service, Script::new()).await;

    assert!(service.diagnostics(&workspace.file).await.unwrap().is_empty());
    assert!(!service.registrations_observed().await.unwrap());

    service.shutdown().await;
    server.task.await.unwrap();
    assert!(!server
        .received
        .methods()
        .contains(&"textDocument/diagnostic".to_string()));
}

fn push_service(workspace: &Workspace) -> LspService {
    let profiles = ProfilesFile::parse(
        r#"
[profiles.fake]
command = "fake-language-server"

[profiles.fake.extensions]
".cs" = "csharp"

[profiles.fake.diagnostics]
strategy = "push"
wait_timeout_ms = 100
"#,
        Path::new("profiles.toml"),
    )
    .unwrap();
    let mut config = workspace.config();
    config.profile = Some("fake".to_string());
    LspService::new(config, ProfileResolver::with_layers(None, vec![profiles]))
}

#[tokio::test]
async fn push_reads_what_the_server_published() {
    let workspace = Workspace::new();
    let service = push_service(&workspace);
    let published = notification(
        "textDocument/publishDiagnostics",
        json!({
            "uri": workspace.uri(),
            "diagnostics": [{ "range": range(6, 20, 6, 24), "severity": 3, "message": "make static" }]
        }),
    );
    let script = Script::new().push_on("textDocument/didOpen", published);
    let _server = connect(&service, script).await;

    let found = service.diagnostics(&workspace.file).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].message, "make static");
    assert_eq!(found[0].severity, DiagnosticSeverity::Information);
    assert_eq!(found[0].text.as_deref(), Some("static void Main()"));
}

#[tokio::test]
async fn push_with_nothing_published_is_empty() {
    let workspace = Workspace::new();
    let service = push_service(&workspace);
    let _server = connect(&service, Script::new()).await;

    assert!(service.diagnostics(&workspace.file).await.unwrap().is_empty());
}
