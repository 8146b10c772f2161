// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem watching for a folder.
//!
//! The watcher forwards activity under the folder root to the repository,
//! dropping access events, paths under an adapter exclude path, and
//! everything observed while its [`WatchGate`] is closed. Syncs close the
//! gate so the adapter's own writes are not seen as local edits.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Result;

/// Shared on/off switch for a watcher.
#[derive(Debug, Clone)]
pub struct WatchGate(Arc<AtomicBool>);

impl WatchGate {
    /// A gate that starts open.
    pub fn new() -> Self {
        WatchGate(Arc::new(AtomicBool::new(true)))
    }

    pub fn enable(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for WatchGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Paths touched by one filesystem event, relative to the folder root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileActivity {
    pub paths: Vec<PathBuf>,
}

/// Returns true when `relative` lies under one of the `excludes` entries
/// (top-level names such as `.git`).
pub fn is_excluded(relative: &Path, excludes: &[String]) -> bool {
    match relative.components().next() {
        Some(Component::Normal(first)) => {
            excludes.iter().any(|e| first.to_str() == Some(e.as_str()))
        }
        _ => false,
    }
}

/// Reduces a raw event to the activity worth reporting, if any.
pub fn filter_event(root: &Path, excludes: &[String], event: &Event) -> Option<FileActivity> {
    if matches!(event.kind, EventKind::Access(_)) {
        return None;
    }
    let paths: Vec<PathBuf> = event
        .paths
        .iter()
        .filter_map(|p| p.strip_prefix(root).ok())
        .filter(|rel| !rel.as_os_str().is_empty() && !is_excluded(rel, excludes))
        .map(Path::to_path_buf)
        .collect();
    if paths.is_empty() {
        None
    } else {
        Some(FileActivity { paths })
    }
}

/// A live recursive watch on a folder. Dropping it stops watching.
pub struct FolderWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl FolderWatcher {
    /// Starts watching `root` and sends accepted activity to `tx`.
    pub fn start(
        root: &Path,
        excludes: Vec<String>,
        gate: WatchGate,
        tx: mpsc::UnboundedSender<FileActivity>,
    ) -> Result<Self> {
        // Events carry canonical paths on some platforms.
        let root = root.canonicalize()?;
        let event_root = root.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !gate.is_enabled() {
                        return;
                    }
                    if let Some(activity) = filter_event(&event_root, &excludes, &event) {
                        let _ = tx.send(activity);
                    }
                }
                Err(e) => warn!("watcher error: {}", e),
            })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        debug!("watching {}", root.display());
        Ok(FolderWatcher {
            root,
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl std::fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderWatcher").field("root", &self.root).finish()
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
