//! Channel transport between the host router and UI clients
//!
//! A channel is ordered, reliable and duplicate-free. Two carriers are
//! provided: an in-process mpsc pair for tests and single-process
//! embedding, and a Unix domain socket carrier framing envelopes as
//! ndjson, one UI connection per endpoint.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use crate::ipc::protocol::{decode, encode, socket_path, state_dir, Request, Response};

/// Default depth of the per-connection envelope queues
const CHANNEL_CAPACITY: usize = 64;

/// Host half of a channel: inbound requests, outbound responses
pub struct HostChannel {
    pub requests: mpsc::Receiver<Request>,
    pub responses: mpsc::Sender<Response>,
}

/// Client half of a channel: outbound requests, inbound responses
pub struct ClientChannel {
    pub requests: mpsc::Sender<Request>,
    pub responses: mpsc::Receiver<Response>,
}

/// Create a connected in-process channel pair.
///
/// Dropping either half is observed by the other side as endpoint
/// teardown, exactly like a socket disconnect.
pub fn pair(capacity: usize) -> (HostChannel, ClientChannel) {
    let (req_tx, req_rx) = mpsc::channel(capacity);
    let (resp_tx, resp_rx) = mpsc::channel(capacity);
    (
        HostChannel {
            requests: req_rx,
            responses: resp_tx,
        },
        ClientChannel {
            requests: req_tx,
            responses: resp_rx,
        },
    )
}

/// Listening side of the Unix socket carrier, owned by the host.
///
/// Each accepted connection is one endpoint: the embedder creates one
/// [`Router`](crate::Router) per accepted [`HostChannel`].
pub struct HostListener {
    listener: UnixListener,
    path: PathBuf,
}

impl HostListener {
    /// Bind the default UI socket under the runtime directory
    pub fn bind() -> Result<Self> {
        ensure_state_dir()?;
        Self::bind_at(socket_path())
    }

    /// Bind a specific socket path
    pub fn bind_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Clean up stale socket
        if path.exists() {
            match std::os::unix::net::UnixStream::connect(&path) {
                Ok(_) => {
                    anyhow::bail!(
                        "Another taglab host is already running (socket {} is active)",
                        path.display()
                    );
                }
                Err(_) => {
                    // Stale socket, safe to remove
                    std::fs::remove_file(&path).with_context(|| {
                        format!("Failed to remove stale socket: {}", path.display())
                    })?;
                }
            }
        }

        let listener = UnixListener::bind(&path).context("Failed to bind UI Unix socket")?;

        // Owner-only access
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700))
            .context("Failed to set socket permissions")?;

        tracing::debug!("UI channel listening on {}", path.display());
        Ok(Self { listener, path })
    }

    /// Accept the next UI connection as a host channel half
    pub async fn accept(&self) -> Result<HostChannel> {
        let (stream, _) = self
            .listener
            .accept()
            .await
            .context("UI socket accept failed")?;
        let (requests, responses) = spawn_pumps::<Request, Response>(stream);
        Ok(HostChannel {
            requests,
            responses,
        })
    }
}

impl Drop for HostListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Connect to the default UI socket as the client side
pub async fn connect() -> Result<ClientChannel> {
    connect_to(socket_path()).await
}

/// Connect to a specific socket path as the client side
pub async fn connect_to(path: impl AsRef<Path>) -> Result<ClientChannel> {
    let stream = UnixStream::connect(path.as_ref())
        .await
        .with_context(|| format!("Failed to connect to host socket: {}", path.as_ref().display()))?;
    let (responses, requests) = spawn_pumps::<Response, Request>(stream);
    Ok(ClientChannel {
        requests,
        responses,
    })
}

/// Spawn the read and write pumps for one connection.
///
/// Inbound ndjson lines are decoded as `In` and queued; `Out` envelopes
/// are encoded and written. Each direction runs on its own task: a
/// partially read inbound line must never be cancelled by outbound
/// traffic, so the read loop awaits nothing but the socket. The read
/// pump ends on EOF or when the local receiver is gone; ending it
/// closes the returned receiver, which the router and client stub
/// observe as teardown. The write pump ends on write failure or when
/// all local senders are dropped, shutting down the write half.
fn spawn_pumps<In, Out>(stream: UnixStream) -> (mpsc::Receiver<In>, mpsc::Sender<Out>)
where
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
{
    let (in_tx, in_rx) = mpsc::channel::<In>(CHANNEL_CAPACITY);
    let (out_tx, mut out_rx) = mpsc::channel::<Out>(CHANNEL_CAPACITY);
    let (reader, mut writer) = stream.into_split();

    tokio::spawn(async move {
        let mut buf_reader = BufReader::new(reader);
        let mut line_buf = String::new();

        loop {
            line_buf.clear();
            match buf_reader.read_line(&mut line_buf).await {
                Ok(0) => break, // EOF
                Ok(_) => match decode::<In>(line_buf.trim_end().as_bytes()) {
                    Ok(msg) => {
                        if in_tx.send(msg).await.is_err() {
                            break; // local receiver gone
                        }
                    }
                    Err(e) => {
                        tracing::debug!("dropping malformed channel line: {}", e);
                    }
                },
                Err(e) => {
                    tracing::debug!("channel read error: {}", e);
                    break;
                }
            }
        }

        tracing::debug!("channel read pump ended");
    });

    tokio::spawn(async move {
        while let Some(out) = out_rx.recv().await {
            match encode(&out) {
                Ok(bytes) => {
                    if writer.write_all(&bytes).await.is_err() {
                        break;
                    }
                    let _ = writer.flush().await;
                }
                Err(_) => break,
            }
        }

        tracing::debug!("channel write pump ended");
    });

    (in_rx, out_tx)
}

/// Ensure the runtime directory exists with proper permissions
fn ensure_state_dir() -> Result<()> {
    let dir = state_dir();
    // Check for symlink attack before creating
    if dir.exists() {
        let meta = std::fs::symlink_metadata(&dir)
            .with_context(|| format!("Failed to read metadata for: {}", dir.display()))?;
        if meta.is_symlink() {
            anyhow::bail!(
                "Runtime directory is a symlink (possible attack): {}",
                dir.display()
            );
        }
    }
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create runtime directory: {}", dir.display()))?;
    let metadata = std::fs::metadata(&dir)
        .with_context(|| format!("Failed to read metadata for: {}", dir.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("Runtime path is not a directory: {}", dir.display());
    }
    let mode = metadata.permissions().mode() & 0o777;
    if mode != 0o700 {
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("Failed to set permissions on: {}", dir.display()))?;
    }
    Ok(())
}
