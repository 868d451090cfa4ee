//! File watcher — monitors the notebook for changes via notify (inotify on
//! Linux) and re-parses it on a worker thread.
//!
//! notify::RecommendedWatcher runs callbacks on an internal thread.
//! FileWatcher bridges change notifications to the reload worker via
//! mpsc::channel; the worker ships parsed blocks to the render loop over a
//! bounded channel so a burst of saves cannot queue up stale documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use log::{debug, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::notebook::{self, SourceBlock};

pub struct FileWatcher {
    rx: mpsc::Receiver<()>,
    _watcher: RecommendedWatcher, // Drop stops watching
}

impl FileWatcher {
    /// Create a FileWatcher that monitors the given file for changes.
    ///
    /// Linux inotify loses the watch on rename (atomic save), so we watch
    /// the parent directory (NonRecursive) and filter events by path.
    pub fn new(path: &Path) -> Result<Self> {
        let canonical = path.canonicalize()?;
        let target = canonical.clone();
        let (tx, rx) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| {
                if let Ok(event) = res {
                    let hit = event.paths.iter().any(|p| p == &target);
                    if hit && (event.kind.is_modify() || event.kind.is_create()) {
                        let _ = tx.send(());
                    }
                }
            },
            notify::Config::default(),
        )?;
        let parent = canonical
            .parent()
            .ok_or_else(|| anyhow::anyhow!("cannot watch root path"))?;
        watcher.watch(parent, RecursiveMode::NonRecursive)?;

        Ok(Self { rx, _watcher: watcher })
    }

    /// Block up to `timeout` for a change. Multiple queued notifications
    /// (editors fire several per save) collapse into a single true.
    pub fn changed_within(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => {
                while self.rx.try_recv().is_ok() {}
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                // Watcher backend died; don't spin.
                thread::sleep(timeout);
                false
            }
        }
    }
}

/// Spawn the reload worker: watch `path`, re-parse on change, ship the new
/// source blocks to the render loop. The watcher is set up before spawning
/// so setup failures surface to the caller.
pub fn spawn_reload_worker(
    path: &Path,
    tx: SyncSender<Vec<SourceBlock>>,
    stop: Arc<AtomicBool>,
    interval: Duration,
) -> Result<JoinHandle<()>> {
    let watcher = FileWatcher::new(path)?;
    let path: PathBuf = path.to_path_buf();
    let handle = thread::Builder::new()
        .name("nbview-reload".into())
        .spawn(move || {
            let mut pending: Option<Vec<SourceBlock>> = None;
            while !stop.load(Ordering::Relaxed) {
                if watcher.changed_within(interval) {
                    match notebook::load(&path) {
                        Ok(nb) => {
                            debug!("reload: parsed {} blocks", nb.blocks.len());
                            pending = Some(nb.blocks);
                        }
                        // Mid-save truncation produces invalid JSON; keep
                        // showing the last good document and wait for the
                        // next event.
                        Err(e) => warn!("reload skipped: {e:#}"),
                    }
                }
                if let Some(blocks) = pending.take() {
                    match tx.try_send(blocks) {
                        Ok(()) => {}
                        Err(TrySendError::Full(blocks)) => pending = Some(blocks),
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
            }
        })?;
    Ok(handle)
}
