//! Scripted language server for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lspbridge_config::{ProcessConfig, ProfileResolver};
use lspbridge_lsp::LspService;
use lspbridge_lsp::codec::{FrameReader, FrameWriter};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

/// Reply to one request method.
#[derive(Debug, Clone)]
pub enum Reply {
    Result(Value),
    Error(i64, String),
}

/// What the fake server does: canned replies per request method, and frames
/// pushed to the client when a given method arrives (before the reply, for
/// requests).
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub capabilities: Value,
    pub replies: HashMap<String, Reply>,
    pub pushes: HashMap<String, Vec<Value>>,
}

impl Script {
    pub fn new() -> Self {
        Self {
            capabilities: json!({ "hoverProvider": true, "renameProvider": { "prepareProvider": true } }),
            ..Self::default()
        }
    }

    pub fn reply(mut self, method: &str, result: Value) -> Self {
        self.replies
            .insert(method.to_string(), Reply::Result(result));
        self
    }

    pub fn fail(mut self, method: &str, code: i64, message: &str) -> Self {
        self.replies
            .insert(method.to_string(), Reply::Error(code, message.to_string()));
        self
    }

    pub fn push_on(mut self, method: &str, frame: Value) -> Self {
        self.pushes
            .entry(method.to_string())
            .or_default()
            .push(frame);
        self
    }

    pub fn capabilities(mut self, capabilities: Value) -> Self {
        self.capabilities = capabilities;
        self
    }
}

pub fn notification(method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "method": method, "params": params })
}

pub fn server_request(id: i64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

pub fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Value {
    json!({
        "start": { "line": sl, "character": sc },
        "end": { "line": el, "character": ec }
    })
}

/// Every frame the fake server received, in order.
#[derive(Clone, Default)]
pub struct Received(Arc<Mutex<Vec<Value>>>);

impl Received {
    pub fn frames(&self) -> Vec<Value> {
        self.0.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.frames()
            .iter()
            .filter_map(|f| f.get("method").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    /// Params of the first frame with `method`.
    pub fn params_of(&self, method: &str) -> Option<Value> {
        self.frames()
            .into_iter()
            .find(|f| f.get("method").and_then(Value::as_str) == Some(method))
            .and_then(|f| f.get("params").cloned())
    }

    fn push(&self, frame: Value) {
        self.0.lock().unwrap().push(frame);
    }
}

pub struct FakeServer {
    pub received: Received,
    pub task: JoinHandle<()>,
}

/// Connect `service` to a fake server running `script`.
pub async fn connect(service: &LspService, script: Script) -> FakeServer {
    let (client_io, server_io) = tokio::io::duplex(1 << 20);
    let (client_read, client_write) = tokio::io::split(client_io);
    let (server_read, server_write) = tokio::io::split(server_io);

    let received = Received::default();
    let task = tokio::spawn(serve(server_read, server_write, script, received.clone()));

    service
        .initialize_with_io(client_read, client_write)
        .await
        .expect("initialize over in-memory pipe");

    FakeServer { received, task }
}

async fn serve<R, W>(reader: R, writer: W, script: Script, received: Received)
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut reader = FrameReader::new(reader);
    let mut writer = FrameWriter::new(writer);

    while let Ok(Some(frame)) = reader.read_frame().await {
        received.push(frame.clone());
        let Some(method) = frame.get("method").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };

        for push in script.pushes.get(&method).into_iter().flatten() {
            if writer.write_frame(push).await.is_err() {
                return;
            }
        }

        let Some(id) = frame.get("id").cloned() else {
            if method == "exit" {
                return;
            }
            continue;
        };

        let response = match method.as_str() {
            "initialize" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "capabilities": script.capabilities }
            }),
            _ => match script.replies.get(&method) {
                Some(Reply::Error(code, message)) => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": code, "message": message }
                }),
                Some(Reply::Result(result)) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
                None => json!({ "jsonrpc": "2.0", "id": id, "result": null }),
            },
        };
        if writer.write_frame(&response).await.is_err() {
            return;
        }
    }
}

/// Workspace directory with one C# source file.
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub file: PathBuf,
}

pub const PROGRAM: &str = "namespace App\n{\n    class Program\n    {\n        static int Count;\n\n        static void Main()\n        {\n            Count = Count + 1;\n        }\n    }\n}\n";

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Program.cs");
        std::fs::write(&file, PROGRAM).unwrap();
        Self { dir, file }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn uri(&self) -> String {
        lspbridge_lsp::path_to_file_uri(&self.file).unwrap().to_string()
    }

    pub fn config(&self) -> ProcessConfig {
        ProcessConfig::new("fake-language-server", self.root())
    }

    pub fn service(&self) -> LspService {
        LspService::new(self.config(), ProfileResolver::builtin())
    }
}
