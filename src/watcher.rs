//! File watch coordination over the game's log directory.
//!
//! Owns the recursive watch, the per-file tail offsets, the active
//! [`WatchSession`] and the end-of-session liveness timer. Filesystem
//! notifications and liveness ticks are funneled into a single loop, so the
//! phase tracker has exactly one mutator and needs no locking. A malformed
//! line or an unreadable file is logged and skipped; nothing aborts the
//! loop short of session teardown or an explicit stop.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::{EngineEvent, EventBus};
use crate::parser::{classify_line, Marker, UrlMarkerKind};
use crate::phase::{PhaseEvent, PhaseTracker};
use crate::process::ProcessProbe;
use crate::raid::{resolve_latest_raid, RaidDescriptor};

/// Suffix of the per-run trace log files.
const TRACES_LOG_SUFFIX: &str = " traces.log";

/// Suffix of the per-run notification log files.
const NOTIFICATIONS_LOG_SUFFIX: &str = " notifications.log";

/// The game nests logs exactly one run-folder deep under `Logs`.
const MAX_WATCH_DEPTH: usize = 2;

#[derive(Debug, Error)]
pub enum WatchStartError {
    #[error("log directory does not exist: {}", .0.display())]
    MissingPath(PathBuf),

    #[error("failed to watch log directory: {0}")]
    Watch(#[from] notify::Error),
}

/// Bookkeeping for one continuous run of the game process.
#[derive(Debug)]
pub struct WatchSession {
    pub watch_path: PathBuf,
    pub started_at: DateTime<Utc>,
    /// Flips once the client has demonstrably reached the main menu.
    pub is_logged_in: bool,
}

/// Configuration for one watch attempt.
pub struct LogWatcher {
    logs_dir: PathBuf,
    process_name: String,
    poll_interval: Duration,
    probe: Arc<dyn ProcessProbe>,
    bus: EventBus,
}

/// Owns the running watch loop. Dropping it (or calling [`stop`]) releases
/// the OS watch handle, which lives inside the loop task and dies with it.
///
/// [`stop`]: WatcherHandle::stop
pub struct WatcherHandle {
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Stops the loop and waits for it to wind down. Safe to call after the
    /// loop already ended on its own.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        let _ = self.task.await;
    }

    /// Resolves when the loop ends, either through [`stop`] or because the
    /// tracked process exited.
    ///
    /// [`stop`]: WatcherHandle::stop
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

impl LogWatcher {
    pub fn new(
        logs_dir: PathBuf,
        process_name: impl Into<String>,
        poll_interval: Duration,
        probe: Arc<dyn ProcessProbe>,
        bus: EventBus,
    ) -> Self {
        Self {
            logs_dir,
            process_name: process_name.into(),
            poll_interval,
            probe,
            bus,
        }
    }

    /// Registers the OS watch and spawns the event loop.
    ///
    /// Fails when the log directory is missing or the OS refuses the watch;
    /// a failed start is reported upward and never retried here.
    pub fn start(self) -> Result<WatcherHandle, WatchStartError> {
        if !self.logs_dir.exists() {
            return Err(WatchStartError::MissingPath(self.logs_dir));
        }

        let (fs_tx, fs_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |result| {
            if fs_tx.send(result).is_err() {
                tracing::debug!("log watch loop receiver dropped");
            }
        })?;
        watcher.watch(&self.logs_dir, RecursiveMode::Recursive)?;
        tracing::info!(path = %self.logs_dir.display(), "log watch started");

        let (stop_tx, stop_rx) = mpsc::channel(1);
        let watch_loop = WatchLoop {
            config: self,
            tracker: PhaseTracker::new(),
            session: None,
            tails: HashMap::new(),
            _watcher: watcher,
        };
        let task = tokio::spawn(watch_loop.run(fs_rx, stop_rx));

        Ok(WatcherHandle { stop_tx, task })
    }
}

/// Per-file tail position.
#[derive(Debug, Clone, Copy)]
struct TailState {
    /// Byte offset of consumed content.
    offset: u64,
    /// Whether the offset is known to sit right after a newline. Offsets
    /// seeded from a file's current length may sit mid-line and must not
    /// trip rewrite detection.
    at_line_boundary: bool,
}

impl TailState {
    fn start_of_file() -> Self {
        Self {
            offset: 0,
            at_line_boundary: true,
        }
    }

    fn end_of(length: u64) -> Self {
        Self {
            offset: length,
            at_line_boundary: false,
        }
    }
}

struct WatchLoop {
    config: LogWatcher,
    tracker: PhaseTracker,
    session: Option<WatchSession>,
    /// Tail positions per log file.
    tails: HashMap<PathBuf, TailState>,
    /// Keeps the OS watch alive exactly as long as the loop.
    _watcher: RecommendedWatcher,
}

impl WatchLoop {
    async fn run(
        mut self,
        mut fs_rx: mpsc::UnboundedReceiver<Result<Event, notify::Error>>,
        mut stop_rx: mpsc::Receiver<()>,
    ) {
        // Existing files only matter from their current end; replaying
        // history would walk the state machine through stale sessions.
        seed_existing_offsets(&self.config.logs_dir, MAX_WATCH_DEPTH, &mut self.tails);

        // Watch is established: decide the initial state.
        if self.config.probe.is_running(&self.config.process_name) {
            self.open_session();
        }

        let mut liveness = tokio::time::interval(self.config.poll_interval);
        liveness.reset();

        loop {
            tokio::select! {
                _ = stop_rx.recv() => {
                    tracing::info!("log watch stopped");
                    break;
                }
                notification = fs_rx.recv() => {
                    let Some(result) = notification else { break };
                    match result {
                        Ok(event) => self.handle_fs_event(&event),
                        Err(error) => tracing::warn!(%error, "log watch backend error"),
                    }
                }
                _ = liveness.tick(), if self.session.is_some() => {
                    if !self.config.probe.is_running(&self.config.process_name) {
                        self.close_session();
                        break;
                    }
                }
            }
        }
    }

    fn handle_fs_event(&mut self, event: &Event) {
        let paths: Vec<&PathBuf> = event
            .paths
            .iter()
            .filter(|path| self.within_watch_depth(path))
            .collect();
        if paths.is_empty() {
            return;
        }

        match event.kind {
            EventKind::Create(_) => {
                // A fresh log file is how a newly launched client announces
                // itself before the first liveness poll.
                for path in &paths {
                    self.tails.insert((*path).clone(), TailState::start_of_file());
                }
                if self.session.is_none()
                    && self.config.probe.is_running(&self.config.process_name)
                {
                    self.open_session();
                }
            }
            EventKind::Modify(_) => {
                for path in paths {
                    self.handle_change(path);
                }
            }
            _ => {}
        }
    }

    fn within_watch_depth(&self, path: &Path) -> bool {
        path.strip_prefix(&self.config.logs_dir)
            .map(|relative| relative.components().count() <= MAX_WATCH_DEPTH)
            .unwrap_or(false)
    }

    fn handle_change(&mut self, path: &Path) {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return;
        };

        if name.ends_with(TRACES_LOG_SUFFIX) {
            let lines = match read_appended_lines(path, &mut self.tails) {
                Ok(lines) => lines,
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "failed to tail trace log");
                    return;
                }
            };
            for line in lines {
                if let Some(marker) = classify_line(&line) {
                    self.apply_marker(marker, path);
                }
            }
        } else if name.ends_with(NOTIFICATIONS_LOG_SUFFIX) {
            match read_appended_lines(path, &mut self.tails) {
                Ok(lines) => {
                    for line in lines {
                        tracing::debug!(notification = %line, "notification log line");
                    }
                }
                Err(error) => {
                    tracing::debug!(path = %path.display(), %error, "failed to tail notification log");
                }
            }
        }
    }

    fn apply_marker(&mut self, marker: Marker, path: &Path) {
        let event = match marker {
            Marker::NewRaidTrace => match self.resolve_raid_from(path) {
                Some(descriptor) => PhaseEvent::RaidResolved(descriptor),
                // Fields unusable; skip without transitioning.
                None => return,
            },
            Marker::Url(UrlMarkerKind::Keepalive) => {
                if self.tracker.is_in_raid() {
                    // Raid already acknowledged; no redundant full-file scan.
                    return;
                }
                match self.resolve_raid_from(path) {
                    Some(descriptor) => PhaseEvent::RaidResolved(descriptor),
                    // No usable trace line right now; the next keepalive
                    // will try again on its own schedule.
                    None => return,
                }
            }
            Marker::Url(UrlMarkerKind::Items) => {
                if let Some(session) = self.session.as_mut() {
                    session.is_logged_in = true;
                }
                PhaseEvent::Marker(marker)
            }
            other => PhaseEvent::Marker(other),
        };
        self.apply_phase_event(event);
    }

    fn apply_phase_event(&mut self, event: PhaseEvent) {
        if let Some(phase) = self.tracker.apply(event) {
            tracing::info!(?phase, "phase changed");
            self.config.bus.emit(EngineEvent::PhaseChanged(phase));
        }
    }

    fn resolve_raid_from(&self, path: &Path) -> Option<RaidDescriptor> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "failed to read trace log for raid resolution");
                return None;
            }
        };
        resolve_latest_raid(&contents)
    }

    fn open_session(&mut self) {
        if self.session.is_some() {
            // Single-instance assumption: a second launch mid-session is
            // deliberately ignored.
            tracing::warn!("watch session already active, ignoring new session trigger");
            return;
        }

        tracing::info!(process = %self.config.process_name, "game session started");
        self.session = Some(WatchSession {
            watch_path: self.config.logs_dir.clone(),
            started_at: Utc::now(),
            is_logged_in: false,
        });
        self.config.bus.emit(EngineEvent::SessionStarted);
        self.apply_phase_event(PhaseEvent::LifecycleStart);
    }

    fn close_session(&mut self) {
        // Stale tick after teardown: nothing to do.
        if self.session.take().is_none() {
            return;
        }

        tracing::info!(process = %self.config.process_name, "game session ended");
        // Consumers act on SessionEnded; returning to Idle is internal and
        // intentionally not surfaced as a phase change.
        let _ = self.tracker.apply(PhaseEvent::LifecycleEnd);
        self.config.bus.emit(EngineEvent::SessionEnded);
    }
}

/// Reads lines appended to `path` since the last call, advancing the stored
/// offset. Handles truncation by restarting from the top and leaves a
/// partially written final line for the next notification.
fn read_appended_lines(
    path: &Path,
    offsets: &mut HashMap<PathBuf, TailState>,
) -> io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    let length = file.metadata()?.len();
    let state = offsets
        .entry(path.to_path_buf())
        .or_insert_with(|| TailState::end_of(length));
    if length < state.offset {
        // Truncated or rotated underneath us.
        *state = TailState::start_of_file();
    } else if state.at_line_boundary {
        if let Some(last_consumed) = state.offset.checked_sub(1) {
            // Content we consumed ended on a newline. Anything else at the
            // stored offset means the file was rewritten to an equal or
            // larger size and the offset now points mid-line.
            let mut boundary = [0_u8; 1];
            file.seek(SeekFrom::Start(last_consumed))?;
            file.read_exact(&mut boundary)?;
            if boundary[0] != b'\n' {
                *state = TailState::start_of_file();
            }
        }
    }

    file.seek(SeekFrom::Start(state.offset))?;
    let mut reader = BufReader::new(file);
    let mut lines = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        if !line.ends_with('\n') {
            // Mid-write tail; re-read it on the next notification.
            break;
        }
        state.offset = state.offset.saturating_add(read as u64);
        state.at_line_boundary = true;
        lines.push(line.trim_end().to_string());
    }

    Ok(lines)
}

/// Records the current length of every file already under `dir`, bounded to
/// the watch depth, so only genuinely new content is parsed.
fn seed_existing_offsets(dir: &Path, depth: usize, offsets: &mut HashMap<PathBuf, TailState>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if depth > 1 {
                seed_existing_offsets(&path, depth - 1, offsets);
            }
        } else if let Ok(metadata) = entry.metadata() {
            offsets.insert(path, TailState::end_of(metadata.len()));
        }
    }
}
