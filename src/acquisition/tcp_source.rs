//! TCP line source
//!
//! Connects to a device or bridge speaking the line grammar over TCP.
//! Incoming bytes are split into lines; [`post`](LineSource::post) writes
//! the UTF-8 encoding of each character back to the peer.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{pump_lines, LineHub, LineSource, LineStream, OpenFlag, SourceError};
use crate::config::defaults::TCP_CONNECT_TIMEOUT_SECS;

struct Connection {
    writer: OwnedWriteHalf,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
}

pub struct TcpSource {
    address: String,
    hub: LineHub,
    open: Arc<OpenFlag>,
    connection: Option<Connection>,
}

impl TcpSource {
    pub fn new(host: &str, port: u16) -> Self {
        Self::from_address(format!("{host}:{port}"))
    }

    /// `address` in `host:port` form.
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            hub: LineHub::new(),
            open: Arc::new(OpenFlag::new()),
            connection: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl LineSource for TcpSource {
    async fn open(&mut self) -> Result<(), SourceError> {
        if self.connection.is_some() {
            self.close().await?;
        }

        info!("[TcpSource] Connecting to {}", self.address);
        let timeout = Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS);
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| {
                SourceError::ConnectionFailed(format!(
                    "timed out connecting to {} after {}s",
                    self.address, TCP_CONNECT_TIMEOUT_SECS
                ))
            })?
            .map_err(|e| SourceError::ConnectionFailed(format!("{}: {}", self.address, e)))?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!("[TcpSource] Could not disable Nagle: {}", e);
        }

        self.open.set(true);
        let (read_half, writer) = stream.into_split();
        let cancel = CancellationToken::new();
        let reader = tokio::spawn(pump_lines(
            BufReader::new(read_half),
            self.hub.clone(),
            Arc::clone(&self.open),
            cancel.clone(),
            "TcpSource",
        ));

        self.connection = Some(Connection {
            writer,
            cancel,
            reader,
        });
        info!("[TcpSource] Connected to {}", self.address);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };
        connection.cancel.cancel();
        if let Err(e) = connection.writer.shutdown().await {
            warn!("[TcpSource] Shutdown error: {}", e);
        }
        if let Err(e) = connection.reader.await {
            warn!("[TcpSource] Reader task ended abnormally: {}", e);
        }
        self.open.set(false);
        info!("[TcpSource] Closed connection to {}", self.address);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.get()
    }

    fn watch_open(&self) -> watch::Receiver<bool> {
        self.open.watch()
    }

    fn subscribe(&self) -> LineStream {
        self.hub.subscribe()
    }

    async fn post(&mut self, c: char) -> Result<(), SourceError> {
        if !self.open.get() {
            return Err(SourceError::NotOpen);
        }
        let connection = self.connection.as_mut().ok_or(SourceError::NotOpen)?;
        let mut buf = [0u8; 4];
        connection
            .writer
            .write_all(c.encode_utf8(&mut buf).as_bytes())
            .await
            .map_err(|e| SourceError::WriteFailed(e.to_string()))
    }

    fn source_name(&self) -> &str {
        "tcp"
    }
}

impl Drop for TcpSource {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.cancel.cancel();
        }
    }
}
