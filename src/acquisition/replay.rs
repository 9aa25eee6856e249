//! Scripted line sources
//!
//! - [`ReplaySource`]: plays back a fixed list of lines (or a text file)
//!   with an optional delay between lines, then reports itself closed.
//! - [`ManualSource`]: lines are pushed by hand through a [`ManualFeed`]
//!   handle; characters posted to it are recorded. Used to drive the
//!   pipeline deterministically from tests.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{LineHub, LineSource, LineStream, OpenFlag, SourceError};

// ============================================================================
// Replay Source
// ============================================================================

pub struct ReplaySource {
    lines: Arc<[String]>,
    delay: Duration,
    hub: LineHub,
    open: Arc<OpenFlag>,
    player: Option<(CancellationToken, JoinHandle<()>)>,
}

impl ReplaySource {
    pub fn new(lines: Vec<String>, delay: Duration) -> Self {
        Self {
            lines: lines.into(),
            delay,
            hub: LineHub::new(),
            open: Arc::new(OpenFlag::new()),
            player: None,
        }
    }

    /// Replay every line of a text file.
    pub fn from_file(path: &Path, delay: Duration) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path)?;
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        info!("[ReplaySource] Loaded {} lines from {}", lines.len(), path.display());
        Ok(Self::new(lines, delay))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[async_trait]
impl LineSource for ReplaySource {
    async fn open(&mut self) -> Result<(), SourceError> {
        if self.player.is_some() {
            self.close().await?;
        }

        // Before spawning: a short replay may finish and clear it immediately.
        self.open.set(true);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(play(
            Arc::clone(&self.lines),
            self.delay,
            self.hub.clone(),
            Arc::clone(&self.open),
            cancel.clone(),
        ));
        self.player = Some((cancel, handle));
        info!("[ReplaySource] Replaying {} lines", self.lines.len());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        let Some((cancel, handle)) = self.player.take() else {
            return Ok(());
        };
        cancel.cancel();
        if let Err(e) = handle.await {
            debug!("[ReplaySource] Player task ended abnormally: {}", e);
        }
        self.open.set(false);
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
            source_name: "replay",
            operation: "post",
        })
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        if let Some((cancel, _)) = self.player.take() {
            cancel.cancel();
        }
    }
}

async fn play(
    lines: Arc<[String]>,
    delay: Duration,
    hub: LineHub,
    open: Arc<OpenFlag>,
    cancel: CancellationToken,
) {
    for (i, line) in lines.iter().enumerate() {
        // No delay before the first line.
        if i > 0 && !delay.is_zero() {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return;
        }
        hub.publish(line.as_str());
    }
    info!("[ReplaySource] Replay finished");
    open.set(false);
}

// ============================================================================
// Manual Source
// ============================================================================

/// Source whose lines are pushed through a [`ManualFeed`].
pub struct ManualSource {
    feed: ManualFeed,
}

/// Cloneable handle for pushing lines into a [`ManualSource`].
#[derive(Clone, Default)]
pub struct ManualFeed {
    hub: LineHub,
    open: Arc<OpenFlag>,
    posted: Arc<Mutex<String>>,
}

impl ManualSource {
    pub fn new() -> (Self, ManualFeed) {
        let feed = ManualFeed::default();
        (Self { feed: feed.clone() }, feed)
    }
}

impl ManualFeed {
    /// Publish a line if the source is open. Returns whether it was sent.
    pub fn push(&self, line: &str) -> bool {
        if !self.open.get() {
            return false;
        }
        self.hub.publish(line);
        true
    }

    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// Everything posted to the source so far.
    pub fn posted(&self) -> String {
        self.posted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LineSource for ManualSource {
    async fn open(&mut self) -> Result<(), SourceError> {
        self.feed.open.set(true);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.feed.open.set(false);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.feed.open.get()
    }

    fn watch_open(&self) -> watch::Receiver<bool> {
        self.feed.open.watch()
    }

    fn subscribe(&self) -> LineStream {
        self.feed.hub.subscribe()
    }

    async fn post(&mut self, c: char) -> Result<(), SourceError> {
        if !self.feed.open.get() {
            return Err(SourceError::NotOpen);
        }
        self.feed
            .posted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(c);
        Ok(())
    }

    fn source_name(&self) -> &str {
        "manual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn replay_publishes_in_order_then_closes() {
        let lines = vec!["1".to_string(), "2".to_string(), "hello".to_string()];
        let mut source = ReplaySource::new(lines, Duration::from_millis(10));
        let mut stream = source.subscribe();
        let mut open = source.watch_open();

        source.open().await.unwrap();
        assert_eq!(stream.next().await.as_deref(), Some("1"));
        assert_eq!(stream.next().await.as_deref(), Some("2"));
        assert_eq!(stream.next().await.as_deref(), Some("hello"));

        open.wait_for(|o| !*o).await.unwrap();
        assert!(!source.is_open());
        assert!(source.post('x').await.is_err());
    }

    #[tokio::test]
    async fn replay_reads_lines_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "1,2\n(3,4)\n").unwrap();
        let source = ReplaySource::from_file(file.path(), Duration::ZERO).unwrap();
        assert_eq!(source.len(), 2);
    }

    #[tokio::test]
    async fn manual_feed_only_publishes_while_open() {
        let (mut source, feed) = ManualSource::new();
        let mut stream = source.subscribe();

        assert!(!feed.push("early"));
        source.open().await.unwrap();
        assert!(feed.push("1, 2"));
        assert_eq!(stream.next().await.as_deref(), Some("1, 2"));

        source.post_str("ok").await.unwrap();
        assert_eq!(feed.posted(), "ok");

        source.close().await.unwrap();
        assert!(!feed.push("late"));
        assert!(matches!(source.post('x').await, Err(SourceError::NotOpen)));
    }
}
