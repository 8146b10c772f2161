// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod add;
pub mod list;
pub mod log;
pub mod pause;
pub mod remove;
pub mod restore;
pub mod retry;
pub mod run;
pub mod status;
#[cfg(test)]
#[path = "mod_tests.rs"]
pub mod testing;

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::backend::{self, Backend, BackendOptions};
use crate::config::{self, Config, ConfigStore, FolderConfig, LOCK_FILE_NAME};
use crate::error::Result;
use crate::listener::NullListener;
use crate::logging;
use crate::marker;
use crate::repository::{Engine, EngineSettings};

/// Opens the adapter for a configured folder.
pub fn open_backend(
    config: &Config,
    folder: &FolderConfig,
    cancel: CancellationToken,
) -> Result<Box<dyn Backend>> {
    let options = BackendOptions {
        storage: folder.storage_type,
        commands: folder.commands.clone(),
        cancel,
        ..BackendOptions::new(&folder.path, &folder.url, config.user())
    };
    backend::open(folder.backend_kind()?, options)
}

/// Engine settings for a configured folder.
///
/// The marker file is the source of truth for the identifier; a folder
/// without one was not fetched by drift.
pub fn engine_settings(config: &Config, folder: &FolderConfig) -> Result<EngineSettings> {
    let identifier = marker::read(&folder.path)?;
    if identifier.as_str() != folder.identifier {
        tracing::warn!(
            "[{}] marker identifier differs from config, using the marker",
            folder.name
        );
    }
    Ok(EngineSettings {
        name: folder.name.clone(),
        identifier,
        user: config.user(),
        remote_url: folder.url.clone(),
        paused: folder.paused,
        timing: config.sync.timing(),
    })
}

/// Runs one engine operation for `folder` outside of `drift run`.
///
/// Takes the instance lock so a running instance and a one-shot command
/// never drive the same working copy. No announcements are sent; peers
/// catch up on their poll timer.
pub(crate) fn with_engine<T, F, Fut>(
    config_dir: &Path,
    state_dir: &Path,
    folder: &str,
    op: F,
) -> Result<T>
where
    F: FnOnce(Arc<Engine>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let _lock = logging::acquire_lock(&state_dir.join(LOCK_FILE_NAME))?;
    let config = Config::load(config_dir)?;
    let folder = config.folder(folder)?;
    let settings = engine_settings(&config, folder)?;
    let cancel = CancellationToken::new();
    let backend: Arc<dyn Backend> = Arc::from(open_backend(&config, folder, cancel.clone())?);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let engine = Arc::new(Engine::new(
            settings,
            backend,
            Arc::new(NullListener::new()),
            Arc::new(ConfigStore::new(config_dir)),
            cancel,
        ));
        let result = op(Arc::clone(&engine)).await;
        engine.dispose();
        result
    })
}

/// Default locations of the configuration and state directories.
pub(crate) fn dirs() -> (PathBuf, PathBuf) {
    (config::config_dir(), config::state_dir())
}

pub(crate) fn print_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}
