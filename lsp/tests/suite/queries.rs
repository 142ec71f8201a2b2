//! Navigation, hover, completion and symbol queries.

use std::path::Path;

use lspbridge_lsp::ServiceError;
use lspbridge_types::{EditorPosition, ErrorCode, SymbolKind};
use serde_json::json;

use crate::common::{Script, Workspace, connect, range};

fn at(line: u32, character: u32) -> EditorPosition {
    EditorPosition::new(line, character).unwrap()
}

// ── Navigation ──

#[tokio::test]
async fn definition_converts_positions_both_ways() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let uri = workspace.uri();
    let script = Script::new().reply(
        "textDocument/definition",
        json!({ "uri": uri, "range": range(4, 19, 4, 24) }),
    );
    let server = connect(&service, script).await;

    let found = service
        .go_to_definition(&workspace.file, at(9, 13))
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].file_path, uri);
    assert_eq!(found[0].start_line, Some(5));
    assert_eq!(found[0].start_character, Some(20));
    assert_eq!(found[0].end_character, Some(25));
    assert_eq!(found[0].text.as_deref(), Some("static int Count;"));

    let params = server.received.params_of("textDocument/definition").unwrap();
    assert_eq!(params["position"], json!({ "line": 8, "character": 12 }));
}

#[tokio::test]
async fn document_is_opened_and_closed_around_the_query() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let server = connect(&service, Script::new()).await;

    let found = service
        .go_to_type_definition(Path::new("Program.cs"), at(5, 16))
        .await
        .unwrap();
    assert!(found.is_empty());

    service.shutdown().await;
    server.task.await.unwrap();

    let methods = server.received.methods();
    let open = methods.iter().position(|m| m == "textDocument/didOpen").unwrap();
    let query = methods
        .iter()
        .position(|m| m == "textDocument/typeDefinition")
        .unwrap();
    let close = methods.iter().position(|m| m == "textDocument/didClose").unwrap();
    assert!(open < query && query < close);

    let opened = server.received.params_of("textDocument/didOpen").unwrap();
    assert_eq!(opened["textDocument"]["languageId"], json!("csharp"));
    assert_eq!(opened["textDocument"]["version"], json!(1));
    assert_eq!(opened["textDocument"]["text"], json!(crate::common::PROGRAM));
}

#[tokio::test]
async fn references_include_the_declaration() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let uri = workspace.uri();
    let script = Script::new().reply(
        "textDocument/references",
        json!([
            { "uri": uri, "range": range(4, 19, 4, 24) },
            { "uri": uri, "range": range(8, 12, 8, 17) },
            { "uri": uri, "range": range(8, 20, 8, 25) }
        ]),
    );
    let server = connect(&service, script).await;

    let found = service
        .find_references(&workspace.file, at(5, 20))
        .await
        .unwrap();
    assert_eq!(found.len(), 3);
    assert_eq!(found[1].text.as_deref(), Some("Count = Count + 1;"));

    let params = server.received.params_of("textDocument/references").unwrap();
    assert_eq!(params["context"]["includeDeclaration"], json!(true));
}

#[tokio::test]
async fn implementation_accepts_location_links() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let uri = workspace.uri();
    let script = Script::new().reply(
        "textDocument/implementation",
        json!([{
            "targetUri": uri,
            "targetRange": range(6, 8, 9, 9),
            "targetSelectionRange": range(6, 20, 6, 24)
        }]),
    );
    let _server = connect(&service, script).await;

    let found = service
        .find_implementations(&workspace.file, at(7, 21))
        .await
        .unwrap();
    assert_eq!(found[0].start_line, Some(7));
    assert_eq!(found[0].start_character, Some(21));
}

#[tokio::test]
async fn server_error_still_closes_the_document() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let script = Script::new().fail("textDocument/definition", -32603, "boom");
    let server = connect(&service, script).await;

    let err = service
        .go_to_definition(&workspace.file, at(1, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Operation { .. }));
    assert!(format!("{:#}", anyhow::Error::from(err)).contains("boom"));

    service.shutdown().await;
    server.task.await.unwrap();
    assert!(server
        .received
        .methods()
        .contains(&"textDocument/didClose".to_string()));
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let server = connect(&service, Script::new()).await;

    let err = service
        .find_references(Path::new("Missing.cs"), at(1, 1))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    service.shutdown().await;
    server.task.await.unwrap();
    assert!(!server
        .received
        .methods()
        .contains(&"textDocument/didOpen".to_string()));
}

// ── Information ──

#[tokio::test]
async fn hover_resolves_the_enclosing_symbol() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let script = Script::new()
        .reply(
            "textDocument/hover",
            json!({ "contents": { "kind": "markdown", "value": "int Program.Count" } }),
        )
        .reply(
            "textDocument/documentSymbol",
            json!([{
                "name": "Program",
                "kind": 5,
                "range": range(2, 4, 10, 5),
                "selectionRange": range(2, 10, 2, 17),
                "children": [
                    {
                        "name": "Count",
                        "kind": 8,
                        "range": range(4, 8, 4, 25),
                        "selectionRange": range(4, 19, 4, 24)
                    },
                    {
                        "name": "Main",
                        "kind": 6,
                        "range": range(6, 8, 9, 9),
                        "selectionRange": range(6, 20, 6, 24)
                    }
                ]
            }]),
        );
    let _server = connect(&service, script).await;

    let hover = service.hover(&workspace.file, at(9, 13)).await.unwrap();
    assert_eq!(hover.value, "int Program.Count");
    let symbol = hover.symbol.unwrap();
    assert_eq!(symbol.name, "Main");
    assert_eq!(symbol.kind, SymbolKind::Method);
    assert_eq!(symbol.container_name.as_deref(), Some("Program"));
    assert_eq!(symbol.depth, 1);
}

#[tokio::test]
async fn hover_without_symbols_still_answers() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let script = Script::new()
        .reply("textDocument/hover", json!({ "contents": ["a", "b"] }))
        .fail("textDocument/documentSymbol", -32601, "not supported");
    let _server = connect(&service, script).await;

    let hover = service.hover(&workspace.file, at(1, 1)).await.unwrap();
    assert_eq!(hover.value, "a\n\nb");
    assert!(hover.symbol.is_none());
}

#[tokio::test]
async fn completion_reports_items_and_incompleteness() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let script = Script::new().reply(
        "textDocument/completion",
        json!({
            "isIncomplete": true,
            "items": [
                { "label": "Count", "kind": 5, "detail": "int Program.Count" },
                { "label": "Main", "kind": 2 }
            ]
        }),
    );
    let server = connect(&service, script).await;

    let result = service
        .completion(&workspace.file, at(9, 13))
        .await
        .unwrap();
    assert!(result.is_incomplete);
    assert_eq!(result.items.len(), 2);
    assert_eq!(result.items[0].label, "Count");
    assert_eq!(result.items[0].detail.as_deref(), Some("int Program.Count"));

    let params = server.received.params_of("textDocument/completion").unwrap();
    assert_eq!(params["context"]["triggerKind"], json!(1));
}

// ── Symbols ──

fn flat_symbols(uri: &str) -> serde_json::Value {
    json!([
        { "name": "Program", "kind": 5, "location": { "uri": uri, "range": range(2, 4, 10, 5) } },
        { "name": "Count", "kind": 8, "containerName": "Program", "location": { "uri": uri, "range": range(4, 8, 4, 25) } },
        { "name": "Main", "kind": 6, "containerName": "Program", "location": { "uri": uri, "range": range(6, 8, 9, 9) } }
    ])
}

#[tokio::test]
async fn document_symbols_get_depths_and_honor_max_depth() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let uri = workspace.uri();
    let script = Script::new().reply("textDocument/documentSymbol", flat_symbols(&uri));
    let _server = connect(&service, script).await;

    let all = service
        .document_symbols(&workspace.file, None)
        .await
        .unwrap();
    let depths: Vec<(&str, u32)> = all.iter().map(|s| (s.name.as_str(), s.depth)).collect();
    assert_eq!(depths, [("Program", 0), ("Count", 1), ("Main", 1)]);

    let top = service
        .document_symbols(&workspace.file, Some(0))
        .await
        .unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].name, "Program");
}

#[tokio::test]
async fn search_symbols_enriches_locations() {
    let workspace = Workspace::new();
    let service = workspace.service();
    let uri = workspace.uri();
    let script = Script::new().reply("workspace/symbol", flat_symbols(&uri));
    let server = connect(&service, script).await;

    let found = service.search_symbols("Co").await.unwrap();
    assert_eq!(found.len(), 3);
    let count = found.iter().find(|s| s.name == "Count").unwrap();
    assert_eq!(count.depth, 1);
    let location = count.location.as_ref().unwrap();
    assert_eq!(location.start_line, Some(5));
    assert_eq!(location.text.as_deref(), Some("static int Count;"));

    let params = server.received.params_of("workspace/symbol").unwrap();
    assert_eq!(params, json!({ "query": "Co" }));
}
