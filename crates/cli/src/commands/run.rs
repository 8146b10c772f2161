// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `drift run`: keeps every configured folder in sync until interrupted.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::config::{Config, ConfigStore, FolderConfig, LOCK_FILE_NAME, LOG_FILE_NAME};
use crate::display::short_revision;
use crate::error::Result;
use crate::listener::ListenerRegistry;
use crate::logging;
use crate::repository::{FolderStore, Repository, RepositoryEvent};

use super::{engine_settings, open_backend};

pub fn run(foreground: bool) -> Result<()> {
    let (config_dir, state_dir) = super::dirs();
    let _lock = logging::acquire_lock(&state_dir.join(LOCK_FILE_NAME))?;
    let log_path = state_dir.join(LOG_FILE_NAME);
    if foreground {
        logging::setup_logging(None);
    } else {
        eprintln!("drift: logging to {}", log_path.display());
        logging::setup_logging(Some(&log_path));
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(&config_dir, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }))
}

/// Starts a repository per configured folder and runs until `shutdown`
/// resolves. Folders that fail to start are logged and skipped.
pub(crate) async fn serve(config_dir: &Path, shutdown: impl Future<Output = ()>) -> Result<()> {
    let config = Config::load(config_dir)?;
    let registry = ListenerRegistry::new(config.sync.listener());
    let store: Arc<dyn FolderStore> = Arc::new(ConfigStore::new(config_dir));

    let mut repositories = Vec::new();
    for folder in &config.folders {
        match start(&config, folder, &registry, &store) {
            Ok(repository) => repositories.push(repository),
            Err(e) => error!("[{}] not started: {}", folder.name, e),
        }
    }
    if repositories.is_empty() {
        warn!("no folders to sync; add one with 'drift add <address>'");
    } else {
        info!("syncing {} folder(s)", repositories.len());
    }

    let loggers: Vec<JoinHandle<()>> = repositories
        .iter()
        .map(|r| tokio::spawn(log_events(r.name().to_string(), r.subscribe())))
        .collect();

    let mut ticker = tokio::time::interval(config.sync.timing().tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => apply_paused_flags(config_dir, &repositories),
        }
    }

    info!("shutting down");
    for repository in &mut repositories {
        repository.dispose();
    }
    for logger in loggers {
        logger.abort();
    }
    Ok(())
}

fn start(
    config: &Config,
    folder: &FolderConfig,
    registry: &ListenerRegistry,
    store: &Arc<dyn FolderStore>,
) -> Result<Repository> {
    let settings = engine_settings(config, folder)?;
    let backend: Arc<dyn Backend> =
        Arc::from(open_backend(config, folder, CancellationToken::new())?);
    let listener = registry.listener(folder.announcements_url.as_deref());
    Repository::start(settings, backend, listener, Arc::clone(store))
}

/// Follows `drift pause` and `drift resume` run from another shell.
///
/// A folder that is busy cannot pause; the next tick tries again.
fn apply_paused_flags(config_dir: &Path, repositories: &[Repository]) {
    let config = match Config::load(config_dir) {
        Ok(config) => config,
        Err(e) => {
            warn!("cannot reload config: {}", e);
            return;
        }
    };
    for repository in repositories {
        let Ok(folder) = config.folder(repository.name()) else {
            continue;
        };
        let engine = repository.engine();
        if folder.paused && !engine.is_paused() {
            if let Err(e) = engine.pause() {
                debug!("[{}] pause deferred: {}", folder.name, e);
            }
        } else if !folder.paused && engine.is_paused() {
            let engine = Arc::clone(engine);
            tokio::spawn(async move {
                if let Err(e) = engine.resume(None).await {
                    warn!("[{}] resume failed: {}", engine.name(), e);
                }
            });
        }
    }
}

async fn log_events(name: String, mut events: broadcast::Receiver<RepositoryEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return,
        };
        match event {
            RepositoryEvent::SyncStatusChanged(status) => info!("[{}] {}", name, status),
            RepositoryEvent::NewChangeSet(change_set) => info!(
                "[{}] {} by {}: {} change(s)",
                name,
                short_revision(&change_set.revision),
                change_set.user.name,
                change_set.changes.len()
            ),
            RepositoryEvent::ConflictResolved => info!("[{}] resolved a conflict", name),
            RepositoryEvent::ProgressChanged(progress) => {
                debug!("[{}] {:.0}% {}", name, progress.percentage, progress.message)
            }
            RepositoryEvent::ChangesDetected => debug!("[{}] changes detected", name),
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
