//! Byte transport beneath the protocol client
//!
//! Messages are newline-delimited JSON. The `Transport` trait hides the
//! concrete stream so the client logic is testable against a scripted
//! in-memory transport; `Connector` abstracts dialing so reconnects can
//! build fresh transports.

use crate::error::{PraxisError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One bidirectional line-oriented connection
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one message (a line without the trailing newline)
    async fn send(&self, line: &str) -> Result<()>;

    /// Receive the next message. `Ok(None)` means the peer closed the
    /// connection. Must be cancel-safe: a dropped `recv` future never
    /// loses a message.
    async fn recv(&self) -> Result<Option<String>>;

    /// Close the connection. Subsequent sends fail, pending and future
    /// receives yield `Ok(None)`.
    async fn close(&self);
}

/// Dials fresh transports for connects and reconnects
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a new connection
    async fn connect(&self) -> Result<Box<dyn Transport>>;
}

/// TCP transport carrying newline-delimited JSON
pub struct TcpTransport {
    reader: Mutex<Lines<BufReader<OwnedReadHalf>>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl TcpTransport {
    /// Wrap an established stream
    pub fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: Mutex::new(BufReader::new(read_half).lines()),
            writer: Mutex::new(Some(write_half)),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, line: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let writer = writer
            .as_mut()
            .ok_or_else(|| PraxisError::Connection("transport closed".to_string()))?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<String>> {
        // Lines::next_line is cancel-safe, so this may sit inside a select.
        let mut reader = self.reader.lock().await;
        Ok(reader.next_line().await?)
    }

    async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }
}

/// Dials TCP connections to a fixed address
pub struct TcpConnector {
    addr: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    /// Connector for `host:port` with a dial timeout
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        debug!(addr = %self.addr, "dialing");
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| {
                PraxisError::Connection(format!("connect to {} timed out", self.addr))
            })??;
        stream.set_nodelay(true)?;
        Ok(Box::new(TcpTransport::new(stream)))
    }
}

/// In-memory transport driven by a [`ScriptedEndpoint`]
pub struct ScriptedTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<String>>,
    outbound: mpsc::UnboundedSender<String>,
    closed: CancellationToken,
}

/// Test handle playing the role of the remote server
pub struct ScriptedEndpoint {
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
    closed: CancellationToken,
}

/// Build a connected transport/endpoint pair
pub fn scripted_pair() -> (ScriptedTransport, ScriptedEndpoint) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    let closed = CancellationToken::new();
    (
        ScriptedTransport {
            inbound: Mutex::new(inbound),
            outbound,
            closed: closed.clone(),
        },
        ScriptedEndpoint {
            to_client,
            from_client,
            closed,
        },
    )
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, line: &str) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(PraxisError::Connection("transport closed".to_string()));
        }
        self.outbound
            .send(line.to_string())
            .map_err(|_| PraxisError::Connection("peer gone".to_string()))
    }

    async fn recv(&self) -> Result<Option<String>> {
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            _ = self.closed.cancelled() => Ok(None),
            line = inbound.recv() => Ok(line),
        }
    }

    async fn close(&self) {
        self.closed.cancel();
    }
}

impl ScriptedEndpoint {
    /// Deliver one line to the client
    pub fn push(&self, line: impl Into<String>) {
        let _ = self.to_client.send(line.into());
    }

    /// Next line the client sent, or `None` when the client side is gone
    pub async fn next_sent(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Next line the client sent, parsed as JSON
    pub async fn next_sent_json(&mut self) -> Option<serde_json::Value> {
        let line = self.next_sent().await?;
        serde_json::from_str(&line).ok()
    }

    /// Drop the connection from the server side
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether either side has closed the connection
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
