//! DAP transport layer: Content-Length based message framing.
//!
//! [`FrameReader`] and [`FrameWriter`] work over async byte streams (TCP
//! sockets or adapter stdio); [`Transport`] opens those streams.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

use crate::error::DapError;

/// Prefix an already-serialized body with its Content-Length header.
pub fn frame_body(body: &[u8]) -> Vec<u8> {
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    let mut buf = Vec::with_capacity(header.len() + body.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(body);
    buf
}

fn content_length_value(line: &str) -> Option<Result<usize, DapError>> {
    let value = line.trim().strip_prefix("Content-Length:")?.trim();
    Some(value.parse::<usize>().map_err(|e| {
        DapError::Transport(format!("invalid Content-Length value '{value}': {e}"))
    }))
}

/// Reads whole DAP frames from an async byte stream.
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a byte stream.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next frame body.
    ///
    /// Fails with [`DapError::TransportClosed`] when the stream ends, and
    /// with [`DapError::Transport`] when a header block has no usable
    /// Content-Length (the header block is consumed, so the caller may
    /// keep reading).
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, DapError> {
        let mut content_length: Option<Result<usize, DapError>> = None;
        let mut saw_header = false;
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|_| DapError::TransportClosed)?;
            if read == 0 {
                return Err(DapError::TransportClosed);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                if saw_header {
                    break;
                }
                // Stray blank line between frames.
                continue;
            }
            saw_header = true;
            if let Some(value) = content_length_value(trimmed) {
                content_length = Some(value);
            }
        }

        let length = content_length
            .unwrap_or_else(|| Err(DapError::Transport("missing Content-Length header".into())))?;

        let mut body = vec![0u8; length];
        self.reader
            .read_exact(&mut body)
            .await
            .map_err(|_| DapError::TransportClosed)?;
        Ok(body)
    }
}

/// Writes DAP frames to an async byte stream.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wrap a byte stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write one frame (header + body) and flush.
    pub async fn write_frame(&mut self, body: &[u8]) -> Result<(), DapError> {
        let framed = frame_body(body);
        self.writer
            .write_all(&framed)
            .await
            .map_err(|_| DapError::TransportClosed)?;
        self.writer
            .flush()
            .await
            .map_err(|_| DapError::TransportClosed)
    }

    /// Shut down the write half.
    pub async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

/// Boxed read half of an adapter connection.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Boxed write half of an adapter connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An open byte stream to a debug adapter.
pub struct Transport {
    /// Adapter → client bytes.
    pub reader: BoxedReader,
    /// Client → adapter bytes.
    pub writer: BoxedWriter,
    /// The adapter process, when we spawned it.
    pub child: Option<Child>,
}

impl Transport {
    /// Wrap arbitrary streams (in-memory pipes in tests).
    pub fn from_streams(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            child: None,
        }
    }

    /// Connect to an adapter listening on a TCP port.
    pub async fn connect_tcp(host: &str, port: u16) -> Result<Self, DapError> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        tracing::debug!(host, port, "connected to debug adapter");
        let (reader, writer) = stream.into_split();
        Ok(Self::from_streams(reader, writer))
    }

    /// Spawn an adapter that speaks DAP over stdin/stdout.
    pub fn spawn_stdio(
        command: &str,
        args: &[String],
        cwd: Option<&Path>,
        env: &HashMap<String, String>,
    ) -> Result<Self, DapError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let mut child = cmd.spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DapError::Transport("could not capture adapter stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DapError::Transport("could not capture adapter stdout".into()))?;
        tracing::debug!(command, "spawned stdio debug adapter");

        Ok(Self {
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            child: Some(child),
        })
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("has_child", &self.child.is_some())
            .finish()
    }
}
