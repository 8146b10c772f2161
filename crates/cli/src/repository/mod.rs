// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! A running folder: an [`Engine`] wired to its watcher, listener and
//! poll timer.

mod engine;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::path::Path;
use std::sync::Arc;

use drift_core::{Announcement, ChangeSet, ErrorStatus, Identifier, SyncStatus};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::error::Result;
use crate::listener::Listener;
use crate::watcher::FolderWatcher;

pub use engine::{
    Engine, EngineSettings, FolderStore, PollInterval, Progress, RepositoryEvent, Timing,
    HISTORY_LIMIT,
};

pub struct Repository {
    engine: Arc<Engine>,
    watcher: Option<FolderWatcher>,
    tasks: Vec<JoinHandle<()>>,
}

impl Repository {
    /// Starts watching and syncing the folder behind `backend`.
    ///
    /// Initialization (history load, catch-up fetch, flush of local edits)
    /// runs in the background; the watcher only reports activity once it
    /// has finished.
    pub fn start(
        settings: EngineSettings,
        backend: Arc<dyn Backend>,
        listener: Arc<dyn Listener>,
        store: Arc<dyn FolderStore>,
    ) -> Result<Self> {
        let cancel = CancellationToken::new();
        let engine = Arc::new(Engine::new(
            settings,
            backend,
            Arc::clone(&listener),
            store,
            cancel.clone(),
        ));

        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = FolderWatcher::start(
            engine.path(),
            engine.exclude_paths(),
            engine.gate().clone(),
            tx,
        )?;
        let listener_events = listener.events();
        listener.subscribe_channel(engine.identifier().as_str());
        info!(
            "[{}] watching {} ({})",
            engine.name(),
            engine.path().display(),
            listener.server()
        );

        let tasks = vec![
            tokio::spawn(lifecycle(Arc::clone(&engine))),
            tokio::spawn(forward_activity(Arc::clone(&engine), rx)),
            tokio::spawn(forward_listener(Arc::clone(&engine), listener_events)),
        ];

        Ok(Repository {
            engine,
            watcher: Some(watcher),
            tasks,
        })
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn name(&self) -> &str {
        self.engine.name()
    }

    pub fn path(&self) -> &Path {
        self.engine.path()
    }

    pub fn identifier(&self) -> &Identifier {
        self.engine.identifier()
    }

    pub fn status(&self) -> SyncStatus {
        self.engine.status()
    }

    pub fn error_status(&self) -> ErrorStatus {
        self.engine.error_status()
    }

    pub fn change_sets(&self) -> Vec<ChangeSet> {
        self.engine.change_sets()
    }

    pub fn progress(&self) -> Progress {
        self.engine.progress()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RepositoryEvent> {
        self.engine.subscribe()
    }

    pub fn pause(&self) -> Result<()> {
        self.engine.pause()
    }

    pub async fn resume(&self, message: Option<String>) -> Result<()> {
        self.engine.resume(message).await
    }

    pub async fn force_retry(&self) -> bool {
        self.engine.force_retry().await
    }

    pub async fn restore_file(&self, path: &str, revision: &str, target: &Path) -> Result<()> {
        self.engine.restore_file(path, revision, target).await
    }

    pub async fn on_announcement(&self, announcement: &Announcement) {
        self.engine.on_announcement(announcement).await
    }

    /// Stops the watcher and all background work. Idempotent.
    pub fn dispose(&mut self) {
        self.engine.dispose();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.watcher = None;
    }
}

impl Drop for Repository {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("engine", &self.engine)
            .finish()
    }
}

async fn lifecycle(engine: Arc<Engine>) {
    engine.initialize().await;
    engine.arm();

    let mut ticker = tokio::time::interval(engine.timing().tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let cancel = engine.cancel_token().clone();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => engine.poll_tick().await,
        }
    }
}

async fn forward_activity(
    engine: Arc<Engine>,
    mut rx: mpsc::UnboundedReceiver<crate::watcher::FileActivity>,
) {
    while let Some(activity) = rx.recv().await {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.on_file_activity(activity).await });
    }
}

async fn forward_listener(
    engine: Arc<Engine>,
    mut events: broadcast::Receiver<crate::listener::ListenerEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.on_listener_event(event).await });
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                debug!("[{}] missed {} listener events", engine.name(), n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
