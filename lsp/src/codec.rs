//! `Content-Length` framing for JSON-RPC over byte streams.
//!
//! Every message is `Content-Length: N\r\n[other headers]\r\n\r\n{json}`.
//! [`FrameReader`] and [`FrameWriter`] work over any async reader/writer, so
//! the same code drives a child process's stdio and in-memory pipes.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum accepted body size (4 MiB).
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

const WIRE_TARGET: &str = "lspbridge::wire";

/// Header block of one frame, filled line by line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FrameHeader {
    content_length: Option<usize>,
    content_type: Option<String>,
}

impl FrameHeader {
    /// Record one `Name: value` line. Names are case-insensitive; unknown
    /// names and lines without a colon are skipped.
    fn apply(&mut self, line: &str) -> Result<()> {
        let Some((name, value)) = line.split_once(':') else {
            tracing::trace!(target: WIRE_TARGET, "ignoring malformed header line: {line}");
            return Ok(());
        };
        let (name, value) = (name.trim(), value.trim());
        if name.eq_ignore_ascii_case("Content-Length") {
            let len = value
                .parse()
                .with_context(|| format!("invalid Content-Length value '{value}'"))?;
            self.content_length = Some(len);
        } else if name.eq_ignore_ascii_case("Content-Type") {
            self.content_type = Some(value.to_string());
        }
        Ok(())
    }

    /// Validated body length.
    fn body_len(&self) -> Result<usize> {
        match self.content_length {
            None => bail!("missing Content-Length header"),
            Some(len) if len > MAX_FRAME_BYTES => {
                bail!("Content-Length {len} exceeds maximum {MAX_FRAME_BYTES}")
            }
            Some(len) => Ok(len),
        }
    }
}

pub struct FrameReader<R> {
    reader: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: String::new(),
        }
    }

    /// Read the next frame body as JSON.
    ///
    /// Returns `Ok(None)` on EOF between frames. EOF inside a frame, a
    /// missing or oversized `Content-Length`, and invalid JSON are errors.
    pub async fn read_frame(&mut self) -> Result<Option<serde_json::Value>> {
        let Some(header) = self.read_header().await? else {
            return Ok(None);
        };
        let mut body = vec![0u8; header.body_len()?];
        self.reader
            .read_exact(&mut body)
            .await
            .context("reading frame body")?;
        tracing::trace!(
            target: WIRE_TARGET,
            bytes = body.len(),
            content_type = header.content_type.as_deref(),
            "<- frame"
        );

        let value = serde_json::from_slice(&body).context("parsing JSON-RPC frame")?;
        Ok(Some(value))
    }

    /// Header lines up to the blank separator. `None` only when the stream
    /// ends before the first byte of a frame.
    async fn read_header(&mut self) -> Result<Option<FrameHeader>> {
        let mut header: Option<FrameHeader> = None;
        loop {
            self.line.clear();
            let n = self
                .reader
                .read_line(&mut self.line)
                .await
                .context("reading header line")?;
            if n == 0 {
                return match header {
                    None => Ok(None),
                    Some(_) => bail!("unexpected EOF while reading headers"),
                };
            }

            let block = header.get_or_insert_with(FrameHeader::default);
            let line = self.line.trim();
            if line.is_empty() {
                return Ok(header);
            }
            block.apply(line)?;
        }
    }
}

pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write one frame with a single `write_all` and flush it.
    pub async fn write_frame(&mut self, msg: &serde_json::Value) -> Result<()> {
        let frame = encode_frame(msg)?;
        self.writer
            .write_all(&frame)
            .await
            .context("writing frame")?;
        self.writer.flush().await.context("flushing frame")?;
        tracing::trace!(target: WIRE_TARGET, bytes = frame.len(), "-> frame");
        Ok(())
    }

    /// Flush and close the underlying writer, signalling EOF to the peer.
    pub async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await.context("closing frame writer")
    }
}

/// `Content-Length` header and JSON body in one buffer.
fn encode_frame(msg: &serde_json::Value) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(msg).context("serializing JSON-RPC frame")?;
    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(&body);
    Ok(frame)
}
