//! JSON-RPC connection over a framed byte stream.
//!
//! A writer task drains a bounded queue into the output stream; a reader
//! task classifies every incoming frame and either completes a pending
//! request, answers a server request through the [`MessageHandler`], or
//! hands a notification to it. Requests are correlated by an atomic id so
//! callers only need `&self`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::{FrameReader, FrameWriter};
use crate::protocol::{self, IncomingMessage, Notification, Request, ResponseError};
use crate::signal::Signal;

const WIRE_TARGET: &str = "lspbridge::wire";

const WRITER_CHANNEL_CAPACITY: usize = 64;

/// Upper bound on draining queued frames when the output stream is closed.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Receives everything the server sends that is not a response.
pub(crate) trait MessageHandler: Send + Sync + 'static {
    fn on_notification(&self, method: &str, params: Option<Value>);

    /// Produce the `result` for a server-to-client request.
    fn on_request(&self, method: &str, params: Option<Value>) -> Value;
}

enum WriterCommand {
    Send(Value),
    /// Close the stream; the sender is answered once everything queued
    /// before it has been written.
    Shutdown(oneshot::Sender<()>),
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, ResponseError>>>>>;

pub(crate) struct Connection {
    writer_tx: mpsc::Sender<WriterCommand>,
    pending: PendingMap,
    next_id: AtomicU64,
    request_timeout: Duration,
    reader_done: Arc<Signal>,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl Connection {
    pub fn spawn<R, W>(
        reader: R,
        writer: W,
        handler: Arc<dyn MessageHandler>,
        request_timeout: Duration,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
        let writer_handle = tokio::spawn(async move {
            let mut writer = FrameWriter::new(writer);
            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.write_frame(&frame).await {
                            tracing::warn!("LSP write error: {e:#}");
                            break;
                        }
                    }
                    WriterCommand::Shutdown(flushed) => {
                        let _ = writer.close().await;
                        let _ = flushed.send(());
                        break;
                    }
                }
            }
        });

        let reader_done = Arc::new(Signal::new());
        let reader_pending = pending.clone();
        let reader_writer_tx = writer_tx.clone();
        let reader_done_signal = reader_done.clone();
        let reader_handle = tokio::spawn(async move {
            let mut reader = FrameReader::new(reader);
            loop {
                match reader.read_frame().await {
                    Ok(Some(frame)) => {
                        dispatch_frame(frame, &reader_pending, &reader_writer_tx, handler.as_ref())
                            .await;
                    }
                    Ok(None) => {
                        tracing::info!("Language server closed its output stream");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("LSP reader error: {e:#}");
                        break;
                    }
                }
            }
            reader_done_signal.fire();
            // Wake every caller still waiting for a response.
            reader_pending.lock().await.clear();
        });

        Self {
            writer_tx,
            pending,
            next_id: AtomicU64::new(1),
            request_timeout,
            reader_done,
            reader_handle,
            writer_handle,
        }
    }

    /// Send a request and wait for its result.
    ///
    /// A JSON-RPC `error` member, a timeout, cancellation and a closed
    /// connection are all `Err`. The pending entry is removed on every
    /// failure path.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &Signal,
    ) -> Result<Value> {
        if cancel.is_fired() {
            bail!("request '{method}' cancelled before sending");
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            // The reader fires `reader_done` before it clears the map, so a
            // check made under the lock cannot miss that clear.
            let mut pending = self.pending.lock().await;
            if self.is_closed() {
                bail!("connection closed, cannot send '{method}'");
            }
            pending.insert(id, tx);
        }

        let frame = serde_json::to_value(Request::new(id, method, params))
            .context("serializing request")?;
        tracing::trace!(target: WIRE_TARGET, id, method, "-> request");
        if self.writer_tx.send(WriterCommand::Send(frame)).await.is_err() {
            self.pending.lock().await.remove(&id);
            bail!("writer channel closed");
        }

        let outcome = tokio::select! {
            () = cancel.fired() => {
                self.pending.lock().await.remove(&id);
                bail!("request '{method}' cancelled");
            }
            outcome = tokio::time::timeout(self.request_timeout, rx) => outcome,
        };

        match outcome {
            Ok(Ok(result)) => {
                tracing::trace!(target: WIRE_TARGET, id, method, "<- response");
                result.with_context(|| format!("request '{method}' failed"))
            }
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                bail!("connection closed while waiting for '{method}'");
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                bail!(
                    "request '{method}' timed out after {}ms",
                    self.request_timeout.as_millis()
                );
            }
        }
    }

    pub async fn notify(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &Signal,
    ) -> Result<()> {
        if cancel.is_fired() {
            bail!("notification '{method}' cancelled before sending");
        }
        let frame = serde_json::to_value(Notification::new(method, params))
            .context("serializing notification")?;
        tracing::trace!(target: WIRE_TARGET, method, "-> notification");
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| anyhow!("writer channel closed"))
    }

    /// Queue a notification without waiting for queue space. Fails when the
    /// queue is full or the writer is gone.
    pub fn notify_now(&self, method: &str, params: Option<Value>) -> Result<()> {
        let frame = serde_json::to_value(Notification::new(method, params))
            .context("serializing notification")?;
        tracing::trace!(target: WIRE_TARGET, method, "-> notification (unawaited)");
        self.writer_tx
            .try_send(WriterCommand::Send(frame))
            .map_err(|e| anyhow!("cannot queue '{method}': {e}"))
    }

    /// Whether the reader has seen EOF or a fatal read error.
    pub fn is_closed(&self) -> bool {
        self.reader_done.is_fired()
    }

    /// Close the output stream and wait, bounded, until every frame queued
    /// before the call has been written.
    pub async fn close(&self) {
        let (flushed_tx, flushed_rx) = oneshot::channel();
        if self
            .writer_tx
            .send(WriterCommand::Shutdown(flushed_tx))
            .await
            .is_err()
        {
            return;
        }
        if tokio::time::timeout(CLOSE_TIMEOUT, flushed_rx).await.is_err() {
            tracing::debug!(
                "Output stream not flushed within {}ms",
                CLOSE_TIMEOUT.as_millis()
            );
        }
    }

    #[cfg(test)]
    async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}

async fn dispatch_frame(
    frame: Value,
    pending: &Mutex<HashMap<u64, oneshot::Sender<Result<Value, ResponseError>>>>,
    writer_tx: &mpsc::Sender<WriterCommand>,
    handler: &dyn MessageHandler,
) {
    let Some(incoming) = protocol::classify(frame) else {
        tracing::trace!(target: WIRE_TARGET, "Ignoring malformed JSON-RPC frame");
        return;
    };

    match incoming {
        IncomingMessage::Response { id, outcome } => {
            let sender = pending.lock().await.remove(&id);
            match sender {
                Some(tx) => {
                    let _ = tx.send(outcome);
                }
                None => tracing::trace!(target: WIRE_TARGET, id, "Response for unknown request"),
            }
        }
        IncomingMessage::ServerRequest { id, method, params } => {
            tracing::trace!(target: WIRE_TARGET, %id, method = %method, "<- server request");
            let result = handler.on_request(&method, params);
            let _ = writer_tx
                .send(WriterCommand::Send(protocol::response(id, result)))
                .await;
        }
        IncomingMessage::Notification { method, params } => {
            tracing::trace!(target: WIRE_TARGET, method = %method, "<- notification");
            handler.on_notification(&method, params);
        }
    }
}
