//! Stdin line source
//!
//! Reads newline-delimited text from process stdin, e.g. when piping the
//! generator binary in: `simulation --mode sine-wave | linescope --stdin`.
//! Stdin is read-only, so [`post`](LineSource::post) is unsupported.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{pump_lines, LineHub, LineSource, LineStream, OpenFlag, SourceError};

pub struct StdinSource {
    hub: LineHub,
    open: Arc<OpenFlag>,
    reader: Option<(CancellationToken, JoinHandle<()>)>,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            hub: LineHub::new(),
            open: Arc::new(OpenFlag::new()),
            reader: None,
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineSource for StdinSource {
    async fn open(&mut self) -> Result<(), SourceError> {
        if self.reader.is_some() {
            self.close().await?;
        }

        self.open.set(true);
        let cancel = CancellationToken::new();
        let reader = BufReader::new(tokio::io::stdin());
        let handle = tokio::spawn(pump_lines(
            reader,
            self.hub.clone(),
            Arc::clone(&self.open),
            cancel.clone(),
            "StdinSource",
        ));
        self.reader = Some((cancel, handle));
        info!("[StdinSource] Reading lines from stdin");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        let Some((cancel, handle)) = self.reader.take() else {
            return Ok(());
        };
        cancel.cancel();
        // The reader may be parked in a blocking stdin read; do not wait on it.
        handle.abort();
        self.open.set(false);
        info!("[StdinSource] Closed");
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

    async fn post(&mut self, _c: char) -> Result<(), SourceError> {
        Err(SourceError::Unsupported {
            source_name: "stdin",
            operation: "post",
        })
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

impl Drop for StdinSource {
    fn drop(&mut self) {
        if let Some((cancel, handle)) = self.reader.take() {
            cancel.cancel();
            handle.abort();
        }
    }
}
