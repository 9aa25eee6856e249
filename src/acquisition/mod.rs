//! Line source acquisition
//!
//! Every data source (emulated generator, stdin, TCP, scripted replay) is
//! exposed through the [`LineSource`] contract: it can be opened and closed,
//! reports whether it is open, fans its text lines out to any number of
//! [`LineStream`] subscribers, and optionally accepts outgoing characters.
//!
//! Lines are delivered raw (untrimmed); [`line_parser`] turns them into
//! samples.

pub mod emulated;
pub mod line_parser;
pub mod replay;
pub mod stdin_source;
pub mod tcp_source;

pub use emulated::{EmulatedSource, EmulationMode, PollingPlan};
pub use line_parser::{
    classify_line, parse_line, parse_line_detailed, DiagnosticKind, LineEvent, ParseDiagnostic,
    ParsedLine,
};
pub use replay::{ManualFeed, ManualSource, ReplaySource};
pub use stdin_source::StdinSource;
pub use tcp_source::TcpSource;

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by line sources.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{operation} is not supported by the {source_name} source")]
    Unsupported {
        source_name: &'static str,
        operation: &'static str,
    },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Source is not open")]
    NotOpen,

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Source Contract
// ============================================================================

/// Anything that produces a stream of text lines.
///
/// Streams are cold before [`open`](LineSource::open): subscribers created
/// early simply receive nothing until the source runs. Opening an already
/// open source restarts it; closing a closed source is a no-op.
#[async_trait]
pub trait LineSource: Send + 'static {
    /// Start producing lines. Acquisition failures are reported here.
    async fn open(&mut self) -> Result<(), SourceError>;

    /// Stop producing lines. Returns promptly (within one polling interval).
    async fn close(&mut self) -> Result<(), SourceError>;

    fn is_open(&self) -> bool;

    /// Observe open/closed transitions.
    fn watch_open(&self) -> watch::Receiver<bool>;

    /// Register a new subscriber to the line stream.
    fn subscribe(&self) -> LineStream;

    /// Send one character to the device.
    ///
    /// Read-only sources return [`SourceError::Unsupported`].
    async fn post(&mut self, c: char) -> Result<(), SourceError>;

    /// Send each character of `s`, stopping at the first failure.
    async fn post_str(&mut self, s: &str) -> Result<(), SourceError> {
        for c in s.chars() {
            self.post(c).await?;
        }
        Ok(())
    }

    /// Human-readable name for logging (e.g. "emulated", "stdin", "tcp").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Line Fan-out
// ============================================================================

/// Receiving end of a source's line stream.
///
/// Unbounded: a slow consumer makes lines queue up, never drop.
#[derive(Debug)]
pub struct LineStream {
    rx: mpsc::UnboundedReceiver<Arc<str>>,
}

impl LineStream {
    /// Wait for the next line. `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<Arc<str>> {
        self.rx.recv().await
    }

    /// Take a line if one is already queued.
    pub fn try_next(&mut self) -> Option<Arc<str>> {
        self.rx.try_recv().ok()
    }
}

/// Multicast publisher shared by all source implementations.
#[derive(Debug, Clone, Default)]
pub struct LineHub {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<Arc<str>>>>>,
}

impl LineHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> LineStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        LineStream { rx }
    }

    /// Deliver `line` to every live subscriber, pruning dropped ones.
    ///
    /// Returns the number of subscribers that received the line.
    pub fn publish(&self, line: impl Into<Arc<str>>) -> usize {
        let line = line.into();
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(Arc::clone(&line)).is_ok());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<Arc<str>>>> {
        // A panicking publisher cannot leave the list half-updated.
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Observable open/closed flag.
#[derive(Debug)]
pub struct OpenFlag {
    tx: watch::Sender<bool>,
}

impl OpenFlag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn set(&self, open: bool) {
        self.tx.send_replace(open);
    }

    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for OpenFlag {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Shared Reader Loop
// ============================================================================

/// Read lines from `reader` into `hub` until EOF, error or cancellation.
///
/// Used by the stdin and TCP sources. Clears `open` when the peer goes away.
pub(crate) async fn pump_lines<R>(
    reader: R,
    hub: LineHub,
    open: Arc<OpenFlag>,
    cancel: CancellationToken,
    name: &'static str,
) where
    R: AsyncBufRead + Unpin + Send,
{
    let mut lines = reader.lines();
    let mut received = 0u64;
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("[{}] Reader cancelled after {} lines", name, received);
                return;
            }
            next = lines.next_line() => match next {
                Ok(Some(line)) => {
                    received += 1;
                    hub.publish(line);
                }
                Ok(None) => {
                    tracing::info!("[{}] End of input after {} lines", name, received);
                    break;
                }
                Err(e) => {
                    tracing::warn!("[{}] Read error: {}", name, e);
                    break;
                }
            }
        }
    }
    open.set(false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hub_multicasts_to_every_subscriber() {
        let hub = LineHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        assert_eq!(hub.publish("1, 2"), 2);

        assert_eq!(a.next().await.as_deref(), Some("1, 2"));
        assert_eq!(b.next().await.as_deref(), Some("1, 2"));
    }

    #[tokio::test]
    async fn hub_prunes_dropped_subscribers() {
        let hub = LineHub::new();
        let keep = hub.subscribe();
        let dropped = hub.subscribe();
        drop(dropped);

        assert_eq!(hub.publish("x"), 1);
        assert_eq!(hub.subscriber_count(), 1);
        drop(keep);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn stream_queues_instead_of_dropping() {
        let hub = LineHub::new();
        let mut stream = hub.subscribe();
        for i in 0..1000 {
            hub.publish(i.to_string());
        }
        let mut count = 0;
        while let Some(line) = stream.try_next() {
            assert_eq!(line.as_ref(), count.to_string());
            count += 1;
        }
        assert_eq!(count, 1000);
    }

    /// Accepts characters until it meets `reject`.
    struct PickySource {
        hub: LineHub,
        open: OpenFlag,
        reject: char,
        attempted: String,
    }

    #[async_trait]
    impl LineSource for PickySource {
        async fn open(&mut self) -> Result<(), SourceError> {
            self.open.set(true);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SourceError> {
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

        async fn post(&mut self, c: char) -> Result<(), SourceError> {
            self.attempted.push(c);
            if c == self.reject {
                return Err(SourceError::WriteFailed(format!("rejected {c:?}")));
            }
            Ok(())
        }

        fn source_name(&self) -> &str {
            "picky"
        }
    }

    #[tokio::test]
    async fn post_str_stops_at_first_failure() {
        let mut source = PickySource {
            hub: LineHub::new(),
            open: OpenFlag::new(),
            reject: '!',
            attempted: String::new(),
        };

        let err = source.post_str("ab!cd").await.unwrap_err();
        assert!(matches!(err, SourceError::WriteFailed(_)));
        assert_eq!(source.attempted, "ab!");

        source.attempted.clear();
        source.post_str("abcd").await.unwrap();
        assert_eq!(source.attempted, "abcd");
    }

    #[test]
    fn open_flag_is_observable() {
        let flag = OpenFlag::new();
        let rx = flag.watch();
        assert!(!flag.get());
        flag.set(true);
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn pump_lines_clears_open_flag_at_eof() {
        let hub = LineHub::new();
        let mut stream = hub.subscribe();
        let open = Arc::new(OpenFlag::new());
        open.set(true);

        let input: &[u8] = b"1,2\n(3,4)\n";
        pump_lines(input, hub.clone(), Arc::clone(&open), CancellationToken::new(), "test").await;

        assert_eq!(stream.next().await.as_deref(), Some("1,2"));
        assert_eq!(stream.next().await.as_deref(), Some("(3,4)"));
        assert!(!open.get());
    }
}
