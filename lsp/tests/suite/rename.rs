//! Rename end to end: prepare, edit, write to disk.

use lspbridge_lsp::ServiceError;
use lspbridge_types::EditorPosition;
use serde_json::json;

use crate::common::{PROGRAM, Script, Workspace, connect, range};

fn at(line: u32, character: u32) -> EditorPosition {
    EditorPosition::new(line, character).unwrap()
}

fn rename_count(uri: &str) -> serde_json::Value {
    json!({
        "changes": {
            uri: [
                { "range": range(4, 19, 4, 24), "newText": "Total" },
                { "range": range(8, 12, 8, 17), "newText": "Total" },
                { "range": range(8, 20, 8, 25), "newText": "Total" }
            ]
        }
    })
}

#[tokio::test]
async fn rename_writes_every_edit() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let uri = workspace.uri();
    let script = Script::new()
        .reply("textDocument/prepareRename", range(4, 19, 4, 24))
        .reply("textDocument/rename", rename_count(&uri));
    let server = connect(&service, script).await;

    let outcome = service
        .rename(&workspace.file, at(5, 20), "Total")
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.total_edits, 3);
    assert_eq!(outcome.total_lines_changed, 2);
    assert_eq!(outcome.changed_files[0].file_path, uri);
    assert_eq!(
        std::fs::read_to_string(&workspace.file).unwrap(),
        PROGRAM.replace("Count", "Total")
    );

    let params = server.received.params_of("textDocument/rename").unwrap();
    assert_eq!(params["newName"], json!("Total"));
    assert_eq!(params["position"], json!({ "line": 4, "character": 19 }));
}

#[tokio::test]
async fn rejected_prepare_skips_the_rename() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let script = Script::new().reply("textDocument/prepareRename", json!(null));
    let server = connect(&service, script).await;

    let outcome = service
        .rename(&workspace.file, at(1, 1), "Other")
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.changed_files.is_empty());
    assert_eq!(std::fs::read_to_string(&workspace.file).unwrap(), PROGRAM);

    service.shutdown().await;
    server.task.await.unwrap();
    assert!(!server
        .received
        .methods()
        .contains(&"textDocument/rename".to_string()));
}

#[tokio::test]
async fn failing_prepare_still_renames() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let uri = workspace.uri();
    let script = Script::new()
        .fail("textDocument/prepareRename", -32601, "Unhandled method")
        .reply("textDocument/rename", rename_count(&uri));
    let _server = connect(&service, script).await;

    let outcome = service
        .rename(&workspace.file, at(5, 20), "Total")
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.total_edits, 3);
}

#[tokio::test]
async fn partial_failure_commits_the_rest() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let uri = workspace.uri();
    let missing = lspbridge_lsp::path_to_file_uri(&workspace.root().join("Gone.cs"))
        .unwrap()
        .to_string();
    let script = Script::new()
        .reply("textDocument/prepareRename", range(4, 19, 4, 24))
        .reply(
            "textDocument/rename",
            json!({
                "changes": {
                    uri.clone(): [{ "range": range(4, 19, 4, 24), "newText": "Total" }],
                    missing.clone(): [{ "range": range(0, 0, 0, 5), "newText": "Total" }]
                }
            }),
        );
    let _server = connect(&service, script).await;

    let outcome = service
        .rename(&workspace.file, at(5, 20), "Total")
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.changed_files.len(), 1);
    assert_eq!(outcome.total_edits, 1);
    assert!(outcome.errors[0].contains(&missing));
    assert!(std::fs::read_to_string(&workspace.file)
        .unwrap()
        .contains("static int Total;"));
}

#[tokio::test]
async fn nothing_applied_is_an_error() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let missing = lspbridge_lsp::path_to_file_uri(&workspace.root().join("Gone.cs"))
        .unwrap()
        .to_string();
    let script = Script::new()
        .reply("textDocument/prepareRename", range(4, 19, 4, 24))
        .reply(
            "textDocument/rename",
            json!({ "changes": { missing: [{ "range": range(0, 0, 0, 5), "newText": "Total" }] } }),
        );
    let _server = connect(&service, script).await;

    let err = service
        .rename(&workspace.file, at(5, 20), "Total")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Operation { .. }));
}
