//! Tail a growing log file and emit parsed control channel events.
//!
//! The tail loop runs as its own task and moves through
//! `Closed -> Opening -> Tailing`. A missing file is retried on a fixed
//! interval; a truncated or replaced file is reopened at its current end so
//! old lines are never replayed.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::error::{LogWatchError, Result};
use crate::event::ControlChannelEvent;
use crate::parser::parse_line;

/// Watcher lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// No file handle held (stopped, or waiting to retry)
    Closed,
    /// Attempting to open the file
    Opening,
    /// File open, following appended bytes
    Tailing,
}

/// Log watcher configuration
#[derive(Debug, Clone)]
pub struct LogWatcherConfig {
    /// File to follow
    pub path: PathBuf,
    /// Delay between attempts to open a missing file
    pub retry_interval: Duration,
    /// Fallback poll period when no change notification arrives
    pub poll_interval: Duration,
}

impl LogWatcherConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retry_interval: Duration::from_secs(2),
            poll_interval: Duration::from_millis(250),
        }
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Live, ordered sequence of events from one watcher run
pub struct LogEvents {
    rx: mpsc::UnboundedReceiver<ControlChannelEvent>,
}

impl LogEvents {
    /// Next event in file order; `None` once the watcher has stopped
    pub async fn next(&mut self) -> Option<ControlChannelEvent> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<ControlChannelEvent> {
        UnboundedReceiverStream::new(self.rx)
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Follows a log file and emits [`ControlChannelEvent`]s
pub struct LogWatcher {
    config: LogWatcherConfig,
    state: Arc<watch::Sender<WatcherState>>,
    running: Mutex<Option<Running>>,
}

impl LogWatcher {
    pub fn new(config: LogWatcherConfig) -> Self {
        let (state, _) = watch::channel(WatcherState::Closed);
        Self {
            config,
            state: Arc::new(state),
            running: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    /// Subscribe to state transitions
    pub fn state_changes(&self) -> watch::Receiver<WatcherState> {
        self.state.subscribe()
    }

    /// Start tailing. Must be called within a tokio runtime.
    pub fn start(&self) -> Result<LogEvents> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(LogWatchError::AlreadyRunning);
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let wake = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let notifier = match spawn_notifier(&self.config.path, Arc::clone(&wake)) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(
                    "Change notifications unavailable for {:?} ({}), polling every {:?}",
                    self.config.path, e, self.config.poll_interval
                );
                None
            }
        };

        let tail = TailLoop {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            events: event_tx,
            open: None,
            pending: Vec::new(),
            next_position: StartPosition::End,
            opened_once: false,
            _notifier: notifier,
        };

        let task = tokio::spawn(tail.run(shutdown_rx, wake));
        *running = Some(Running {
            shutdown: shutdown_tx,
            task,
        });

        info!("Log watcher started on {:?}", self.config.path);
        Ok(LogEvents { rx: event_rx })
    }

    /// Stop tailing and release the file handle. Safe to call repeatedly.
    pub async fn stop(&self) {
        let running = self.running.lock().take();

        if let Some(Running { shutdown, task }) = running {
            let _ = shutdown.send(true);
            if let Err(e) = task.await {
                warn!("Log watcher task ended abnormally: {}", e);
            }
            info!("Log watcher stopped on {:?}", self.config.path);
        }

        self.state.send_replace(WatcherState::Closed);
    }
}

impl Drop for LogWatcher {
    fn drop(&mut self) {
        if let Some(Running { shutdown, task }) = self.running.get_mut().take() {
            let _ = shutdown.send(true);
            task.abort();
        }
    }
}

fn spawn_notifier(path: &Path, wake: Arc<Notify>) -> notify::Result<RecommendedWatcher> {
    let mut watcher =
        notify::recommended_watcher(move |res: notify::Result<Event>| on_fs_event(res, &wake))?;

    // Watch the directory so rotation and late creation are both seen
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    watcher.watch(&parent, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Wake the tail loop on changes in the watched directory.
///
/// `Notify` holds at most one permit, so a burst of events while nobody
/// waits collapses into a single wakeup.
fn on_fs_event(res: notify::Result<Event>, wake: &Notify) {
    if let Ok(event) = res {
        if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
            wake.notify_one();
        }
    }
}

/// Where to position a freshly opened file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartPosition {
    Beginning,
    End,
}

/// Identity of a file on disk, used to detect replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

#[cfg(unix)]
fn identity(meta: &std::fs::Metadata) -> Option<FileIdentity> {
    use std::os::unix::fs::MetadataExt;
    Some(FileIdentity {
        dev: meta.dev(),
        ino: meta.ino(),
    })
}

#[cfg(not(unix))]
fn identity(_meta: &std::fs::Metadata) -> Option<FileIdentity> {
    None
}

struct OpenLog {
    file: File,
    offset: u64,
    identity: Option<FileIdentity>,
}

enum Wait {
    Retry,
    Poll,
}

struct TailLoop {
    config: LogWatcherConfig,
    state: Arc<watch::Sender<WatcherState>>,
    events: mpsc::UnboundedSender<ControlChannelEvent>,
    open: Option<OpenLog>,
    pending: Vec<u8>,
    next_position: StartPosition,
    opened_once: bool,
    _notifier: Option<RecommendedWatcher>,
}

impl TailLoop {
    async fn run(
        mut self,
        mut shutdown: watch::Receiver<bool>,
        wake: Arc<Notify>,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let wait = if self.open.is_none() {
                self.try_open().await
            } else {
                self.follow().await
            };

            if self.events.is_closed() {
                debug!("Event receiver dropped, stopping tail loop");
                break;
            }

            let delay = match wait {
                Wait::Retry => self.config.retry_interval,
                Wait::Poll => self.config.poll_interval,
            };

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
                _ = wake.notified(), if matches!(wait, Wait::Poll) => {}
            }
        }

        self.open = None;
        self.state.send_replace(WatcherState::Closed);
    }

    async fn try_open(&mut self) -> Wait {
        self.state.send_replace(WatcherState::Opening);

        match open_at(&self.config.path, self.next_position).await {
            Ok(log) => {
                info!(
                    "Tailing {:?} from offset {}",
                    self.config.path, log.offset
                );
                self.open = Some(log);
                self.opened_once = true;
                self.pending.clear();
                self.state.send_replace(WatcherState::Tailing);
                Wait::Poll
            }
            Err(e) => {
                if e.kind() == std::io::ErrorKind::NotFound {
                    debug!(
                        "Log file {:?} not present yet, retrying in {:?}",
                        self.config.path, self.config.retry_interval
                    );
                } else {
                    warn!(
                        "Failed to open {:?}: {}, retrying in {:?}",
                        self.config.path, e, self.config.retry_interval
                    );
                }
                // Everything in a file that first shows up after start is new
                if !self.opened_once && e.kind() == std::io::ErrorKind::NotFound {
                    self.next_position = StartPosition::Beginning;
                }
                self.state.send_replace(WatcherState::Closed);
                Wait::Retry
            }
        }
    }

    async fn follow(&mut self) -> Wait {
        if self.rotated().await {
            info!(
                "Log file {:?} was rotated or truncated, reopening at end",
                self.config.path
            );
            self.open = None;
            self.pending.clear();
            self.next_position = StartPosition::End;
            self.state.send_replace(WatcherState::Closed);
            return self.try_open().await;
        }

        let Some(log) = self.open.as_mut() else {
            return Wait::Retry;
        };

        let mut chunk = Vec::new();
        match log.file.read_to_end(&mut chunk).await {
            Ok(0) => {}
            Ok(n) => {
                log.offset += n as u64;
                self.pending.extend_from_slice(&chunk);
                self.drain_lines();
            }
            Err(e) => {
                warn!("Read error on {:?}: {}, reopening", self.config.path, e);
                self.open = None;
                self.pending.clear();
                self.next_position = StartPosition::End;
                self.state.send_replace(WatcherState::Closed);
                return Wait::Retry;
            }
        }

        Wait::Poll
    }

    /// True when the path now names a different or shorter file
    async fn rotated(&self) -> bool {
        let Some(log) = self.open.as_ref() else {
            return false;
        };

        match tokio::fs::metadata(&self.config.path).await {
            Ok(meta) => {
                let replaced = match (log.identity, identity(&meta)) {
                    (Some(held), Some(current)) => held != current,
                    _ => false,
                };
                replaced || meta.len() < log.offset
            }
            Err(_) => true,
        }
    }

    fn drain_lines(&mut self) {
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            match parse_line(line) {
                Some(event) => {
                    if self.events.send(event).is_err() {
                        return;
                    }
                }
                None => debug!("Unrecognized log line: {}", line),
            }
        }
    }
}

async fn open_at(path: &Path, position: StartPosition) -> std::io::Result<OpenLog> {
    let mut file = File::open(path).await?;
    let meta = file.metadata().await?;

    let offset = match position {
        StartPosition::Beginning => 0,
        StartPosition::End => file.seek(SeekFrom::End(0)).await?,
    };

    Ok(OpenLog {
        file,
        offset,
        identity: identity(&meta),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = LogWatcherConfig::new("/tmp/tr.log")
            .retry_interval(Duration::from_millis(50))
            .poll_interval(Duration::from_millis(10));
        assert_eq!(config.retry_interval, Duration::from_millis(50));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_event_burst_collapses_to_one_wakeup() {
        use notify::event::{CreateKind, ModifyKind};
        use notify::EventKind;

        let wake = Notify::new();
        for _ in 0..10_000 {
            on_fs_event(Ok(Event::new(EventKind::Modify(ModifyKind::Any))), &wake);
        }
        on_fs_event(Ok(Event::new(EventKind::Create(CreateKind::File))), &wake);

        let first = tokio::time::timeout(Duration::from_millis(50), wake.notified()).await;
        assert!(first.is_ok());
        let second = tokio::time::timeout(Duration::from_millis(50), wake.notified()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_reads_do_not_wake() {
        use notify::event::AccessKind;
        use notify::EventKind;

        let wake = Notify::new();
        on_fs_event(Ok(Event::new(EventKind::Access(AccessKind::Read))), &wake);
        on_fs_event(Err(notify::Error::generic("watch lost")), &wake);

        let woke = tokio::time::timeout(Duration::from_millis(50), wake.notified()).await;
        assert!(woke.is_err());
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let watcher = LogWatcher::new(LogWatcherConfig::new("/nonexistent/tr.log"));
        watcher.stop().await;
        watcher.stop().await;
        assert_eq!(watcher.state(), WatcherState::Closed);
    }
}
