//! Change watcher for the data file
//!
//! Two stages connected by channels:
//!
//! ```text
//! poll_file (stat every poll_interval) --raw--> run_debouncer --FileChanged--> pipeline
//! ```
//!
//! The debouncer is a two-state machine (`Idle` / `Pending`). Every raw
//! event (re)arms the deadline; once the quiet period passes with no further
//! events it fires exactly one `FileChanged` and returns to `Idle`.

use crate::error::{MonitorError, MonitorResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

/// One logical "the data file changed" signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileChanged;

/// A raw change observation (may arrive in bursts)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending { deadline: Instant },
}

#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DebounceState::Pending { .. })
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Pending { deadline } => Some(deadline),
            DebounceState::Idle => None,
        }
    }

    /// Record a raw event, cancelling any pending deadline and starting a new one
    pub fn on_event(&mut self, now: Instant) {
        self.state = DebounceState::Pending {
            deadline: now + self.quiet,
        };
    }

    /// Returns true (once) if the quiet period has elapsed
    pub fn poll_fire(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Pending { deadline } if now >= deadline => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }
}

/// Coalesce raw change events into debounced `FileChanged` signals
///
/// Runs until either channel closes. A burst still pending when the raw
/// side closes is flushed as one final signal.
pub async fn run_debouncer(
    mut raw: mpsc::Receiver<RawChange>,
    fired: mpsc::Sender<FileChanged>,
    quiet: Duration,
) {
    let mut debouncer = Debouncer::new(quiet);

    loop {
        let deadline = debouncer.deadline().unwrap_or_else(Instant::now);

        tokio::select! {
            event = raw.recv() => {
                match event {
                    Some(RawChange) => debouncer.on_event(Instant::now()),
                    None => {
                        if debouncer.is_pending() {
                            let _ = fired.send(FileChanged).await;
                        }
                        log::debug!("Debouncer input closed");
                        return;
                    }
                }
            }
            _ = sleep_until(deadline), if debouncer.is_pending() => {
                if debouncer.poll_fire(Instant::now()) && fired.send(FileChanged).await.is_err() {
                    log::debug!("Debouncer output closed");
                    return;
                }
            }
        }
    }
}

/// What we compare between polls to detect a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileSignature {
    len: u64,
    modified: Option<SystemTime>,
}

async fn signature(path: &Path) -> Option<FileSignature> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Some(FileSignature {
            len: meta.len(),
            modified: meta.modified().ok(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            log::warn!("⚠️  Failed to stat {}: {}", path.display(), e);
            None
        }
    }
}

/// Emit a `RawChange` whenever the file's size or mtime differs from the last poll
///
/// `last` is the signature taken before the poller was spawned, so a write
/// landing before the first tick still counts as a change.
async fn poll_file(
    path: PathBuf,
    poll_interval: Duration,
    mut last: Option<FileSignature>,
    raw: mpsc::Sender<RawChange>,
) {
    let mut timer = interval(poll_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        timer.tick().await;

        let current = signature(&path).await;
        if current != last {
            last = current;
            if raw.send(RawChange).await.is_err() {
                return;
            }
        }
    }
}

/// Create the data file empty if it does not exist yet
pub async fn ensure_file_exists(path: &Path) -> MonitorResult<()> {
    if tokio::fs::try_exists(path)
        .await
        .map_err(|e| MonitorError::file_access(path, e))?
    {
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MonitorError::file_access(parent, e))?;
    }
    tokio::fs::write(path, "")
        .await
        .map_err(|e| MonitorError::file_access(path, e))?;
    log::info!("📄 Data file created: {}", path.display());
    Ok(())
}

/// Watches one file and yields debounced change signals
pub struct ChangeWatcher {
    path: PathBuf,
    poll_interval: Duration,
    quiet: Duration,
}

impl ChangeWatcher {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration, quiet: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            quiet,
        }
    }

    /// Ensure the file exists, then spawn the poller and debouncer
    pub async fn start(self) -> MonitorResult<mpsc::Receiver<FileChanged>> {
        ensure_file_exists(&self.path).await?;
        let baseline = signature(&self.path).await;

        let (raw_tx, raw_rx) = mpsc::channel(64);
        let (fired_tx, fired_rx) = mpsc::channel(16);

        log::info!(
            "👀 Watching {} (poll: {}ms, debounce: {}ms)",
            self.path.display(),
            self.poll_interval.as_millis(),
            self.quiet.as_millis()
        );

        tokio::spawn(poll_file(self.path, self.poll_interval, baseline, raw_tx));
        tokio::spawn(run_debouncer(raw_rx, fired_tx, self.quiet));

        Ok(fired_rx)
    }
}
