//! The remote request channel.
//!
//! A remote caller submits one payload per connection and reads the response
//! until the server closes the connection.  [`UnixSocketChannel`] serves the
//! session over a Unix domain socket; [`RemoteClient`] is the caller's side.
//!
//! On the wire a request is a single JSON line, `{"payload": "..."}`, and the
//! response is raw UTF-8 text.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::observability::REMOTE_ERRORS;
use crate::render::ChannelRenderer;

/// Acknowledgement sent for remote commands.
pub const ACK: &str = "ack";

/// How long a connected client has to send its request line.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after the first failed accept; doubles per consecutive failure.
const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// The request line a remote caller sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRequest {
    /// The utterance or command to run.
    pub payload: String,
}

/// One request and the sink its response goes to.
///
/// Dropping the exchange, or calling [`Exchange::finish`], closes the
/// response.
pub struct Exchange {
    payload: String,
    sink: ChannelRenderer,
    writer: Option<JoinHandle<()>>,
}

impl Exchange {
    /// Creates an exchange whose output goes to `sink`.
    pub fn new(payload: impl Into<String>, sink: ChannelRenderer) -> Self {
        Self {
            payload: payload.into(),
            sink,
            writer: None,
        }
    }

    /// The text the caller sent.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Where the response is written.
    pub fn sink(&mut self) -> &mut ChannelRenderer {
        &mut self.sink
    }

    /// Closes the response and waits until it has been delivered.
    pub async fn finish(self) {
        let Exchange { sink, writer, .. } = self;
        drop(sink);
        if let Some(writer) = writer
            && let Err(err) = writer.await
        {
            tracing::warn!(error = %err, "response writer failed");
        }
    }
}

/// A source of remote exchanges.
#[async_trait::async_trait]
pub trait RequestChannel: Send {
    /// Waits for the next exchange.  `None` means no more will arrive.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the channel itself has failed.
    async fn next_exchange(&mut self) -> Result<Option<Exchange>>;

    /// Stops accepting exchanges and releases the endpoint.
    fn close(&mut self) -> Result<()>;
}

/// Serves exchanges over a Unix domain socket.
pub struct UnixSocketChannel {
    listener: UnixListener,
    path: PathBuf,
    closed: bool,
}

impl UnixSocketChannel {
    /// Binds the socket at `path`.
    ///
    /// A stale socket file left by an earlier process is replaced.  A socket
    /// something is still listening on is an error.
    pub async fn bind(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            if UnixStream::connect(&path).await.is_ok() {
                return Err(Error::transport(
                    format!("another session is already serving {}", path.display()),
                    None,
                ));
            }
            fs::remove_file(&path).map_err(|err| {
                Error::transport(
                    format!("failed to remove stale socket {}", path.display()),
                    Some(err),
                )
            })?;
        }
        let listener = UnixListener::bind(&path).map_err(|err| {
            Error::transport(format!("failed to bind {}", path.display()), Some(err))
        })?;
        tracing::info!(path = %path.display(), "listening for remote requests");
        Ok(Self {
            listener,
            path,
            closed: false,
        })
    }

    /// The socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl RequestChannel for UnixSocketChannel {
    async fn next_exchange(&mut self) -> Result<Option<Exchange>> {
        if self.closed {
            return Ok(None);
        }
        let mut failures = 0u32;
        loop {
            let stream = match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    failures = 0;
                    stream
                }
                Err(err) => {
                    REMOTE_ERRORS.click();
                    tracing::error!(error = %err, failures, "failed to accept connection");
                    tokio::time::sleep(accept_backoff(failures)).await;
                    failures = failures.saturating_add(1);
                    continue;
                }
            };
            match read_request(stream).await {
                Ok(exchange) => return Ok(Some(exchange)),
                Err(err) => {
                    REMOTE_ERRORS.click();
                    tracing::warn!(error = %err, "discarding remote request");
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::transport(
                format!("failed to remove socket {}", self.path.display()),
                Some(err),
            )),
        }
    }
}

impl Drop for UnixSocketChannel {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "socket cleanup failed");
        }
    }
}

/// Pause after the `failures`-th consecutive accept error, doubling up to
/// [`ACCEPT_BACKOFF_MAX`].
fn accept_backoff(failures: u32) -> Duration {
    ACCEPT_BACKOFF_BASE
        .saturating_mul(1 << failures.min(16))
        .min(ACCEPT_BACKOFF_MAX)
}

/// Reads the request line and starts the task that writes the response.
async fn read_request(stream: UnixStream) -> Result<Exchange> {
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let read = tokio::time::timeout(REQUEST_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| Error::transport("timed out waiting for a request", None))?
        .map_err(|err| Error::transport("failed to read request", Some(err)))?;
    if read == 0 {
        return Err(Error::transport(
            "connection closed before a request arrived",
            None,
        ));
    }
    let request: RemoteRequest = serde_json::from_str(line.trim_end())
        .map_err(|err| Error::transport(format!("malformed request: {err}"), None))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(sender_loop(writer, rx));
    Ok(Exchange {
        payload: request.payload,
        sink: ChannelRenderer::new(tx),
        writer: Some(writer),
    })
}

/// Writes response text to the socket until the sink is dropped.
async fn sender_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = rx.recv().await {
        if let Err(err) = writer.write_all(text.as_bytes()).await {
            tracing::debug!(error = %err, "remote caller went away");
            return;
        }
    }
    if let Err(err) = writer.shutdown().await {
        tracing::debug!(error = %err, "failed to close response");
    }
}

/// An exchange channel backed by in-process queues.
///
/// Pairs with [`MemoryClient`]; the channel ends once every client is
/// dropped.
pub struct MemoryChannel {
    exchanges: mpsc::UnboundedReceiver<Exchange>,
}

/// The caller's side of a [`MemoryChannel`].
#[derive(Clone)]
pub struct MemoryClient {
    exchanges: mpsc::UnboundedSender<Exchange>,
}

impl MemoryChannel {
    /// Creates a connected channel and client.
    pub fn new() -> (Self, MemoryClient) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { exchanges: rx }, MemoryClient { exchanges: tx })
    }
}

#[async_trait::async_trait]
impl RequestChannel for MemoryChannel {
    async fn next_exchange(&mut self) -> Result<Option<Exchange>> {
        Ok(self.exchanges.recv().await)
    }

    fn close(&mut self) -> Result<()> {
        self.exchanges.close();
        Ok(())
    }
}

impl MemoryClient {
    /// Submits a payload and returns the receiving end of its response.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the channel is closed.
    pub fn submit(&self, payload: impl Into<String>) -> Result<mpsc::UnboundedReceiver<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.exchanges
            .send(Exchange::new(payload, ChannelRenderer::new(tx)))
            .map_err(|_| Error::transport("request channel is closed", None))?;
        Ok(rx)
    }

    /// Submits a payload and collects the whole response.
    pub async fn request(&self, payload: impl Into<String>) -> Result<String> {
        let mut rx = self.submit(payload)?;
        let mut response = String::new();
        while let Some(text) = rx.recv().await {
            response.push_str(&text);
        }
        Ok(response)
    }
}

/// The caller's side of a [`UnixSocketChannel`].
pub struct RemoteClient {
    stream: UnixStream,
}

impl RemoteClient {
    /// Connects to the session at `path`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if nothing is serving at `path`.
    pub async fn connect(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path).await.map_err(|err| {
            Error::transport("chat server is not running.", Some(err))
        })?;
        tracing::debug!(path = %path.display(), "connected");
        Ok(Self { stream })
    }

    /// Sends `payload` and copies the response to `out` as it arrives.
    pub async fn request<W>(mut self, payload: &str, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let request = RemoteRequest {
            payload: payload.to_string(),
        };
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        self.stream
            .write_all(line.as_bytes())
            .await
            .map_err(|err| Error::transport("failed to send request", Some(err)))?;

        let mut buf = [0u8; 4096];
        loop {
            let n = self
                .stream
                .read(&mut buf)
                .await
                .map_err(|err| Error::transport("failed to read response", Some(err)))?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).await?;
            out.flush().await?;
        }
        Ok(())
    }
}
