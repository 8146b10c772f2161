// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The per-folder sync state machine.
//!
//! An [`Engine`] decides when to sync and in which direction. Its triggers
//! (settled local edits, poll ticks, announcements and listener state
//! changes) may fire concurrently; a single work flag keeps at most one
//! adapter transfer in flight, and triggers that find it taken either
//! give up or sleep and recheck. Adapter calls run on the blocking pool so
//! event delivery never waits on a subprocess.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use drift_core::{
    group_change_sets, Announcement, ChangeSet, ErrorStatus, Identifier, SyncStatus, User,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::{tree_size, Backend, SyncContext, SyncFailure, SyncReporter, SyncResult};
use crate::error::{Error, Result};
use crate::listener::{DisconnectReason, Listener, ListenerEvent, ReconnectBackoff};
use crate::marker::{self, MARKER_FILE_NAME};
use crate::settle::wait_until_settled;
use crate::watcher::{is_excluded, FileActivity, WatchGate};

/// Change sets kept in memory per folder.
pub const HISTORY_LIMIT: usize = 30;

/// Timers and thresholds of the state machine.
#[derive(Debug, Clone)]
pub struct Timing {
    pub poll_short: Duration,
    pub poll_long: Duration,
    /// How often the poll timer wakes up to check whether a poll is due.
    pub tick: Duration,
    pub settle_interval: Duration,
    pub settle_samples: usize,
    /// Pause between rechecks while waiting for an in-flight sync.
    pub busy_wait: Duration,
    pub sleep_backoff_initial: Duration,
    pub sleep_backoff_max: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            poll_short: Duration::from_secs(5 * 60),
            poll_long: Duration::from_secs(15 * 60),
            tick: Duration::from_secs(5),
            settle_interval: Duration::from_millis(500),
            settle_samples: 4,
            busy_wait: Duration::from_millis(100),
            sleep_backoff_initial: Duration::from_secs(2),
            sleep_backoff_max: Duration::from_secs(64),
        }
    }
}

/// Remote polling cadence: short while the listener is unreliable.
#[derive(Debug, Clone)]
pub struct PollInterval {
    short: Duration,
    long: Duration,
    current: Duration,
    last_check: Instant,
}

impl PollInterval {
    pub fn new(short: Duration, long: Duration, now: Instant) -> Self {
        PollInterval {
            short,
            long,
            current: short,
            last_check: now,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn shorten(&mut self) {
        self.current = self.short;
    }

    pub fn lengthen(&mut self) {
        self.current = self.long;
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_check) >= self.current
    }

    pub fn checked(&mut self, now: Instant) {
        self.last_check = now;
    }
}

/// Progress of the operation in flight.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Progress {
    pub percentage: f64,
    pub speed: Option<String>,
    pub message: String,
}

/// Notifications for frontends.
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryEvent {
    SyncStatusChanged(SyncStatus),
    ProgressChanged(Progress),
    NewChangeSet(ChangeSet),
    ConflictResolved,
    ChangesDetected,
}

/// Persistence for per-folder flags that outlive the process.
pub trait FolderStore: Send + Sync {
    fn set_paused(&self, name: &str, paused: bool) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Forwards adapter progress as events, never letting it go backwards
/// within one operation.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    events: broadcast::Sender<RepositoryEvent>,
    current: Mutex<Progress>,
}

impl ProgressTracker {
    pub(crate) fn new(events: broadcast::Sender<RepositoryEvent>) -> Self {
        ProgressTracker {
            events,
            current: Mutex::new(Progress::default()),
        }
    }

    pub(crate) fn reset(&self) {
        *lock(&self.current) = Progress::default();
    }

    pub(crate) fn snapshot(&self) -> Progress {
        lock(&self.current).clone()
    }
}

impl SyncReporter for ProgressTracker {
    fn progress(&self, percentage: f64, speed: Option<&str>, message: &str) {
        let mut current = lock(&self.current);
        if percentage < current.percentage {
            return;
        }
        *current = Progress {
            percentage: percentage.min(100.0),
            speed: speed.map(str::to_string),
            message: message.to_string(),
        };
        let _ = self
            .events
            .send(RepositoryEvent::ProgressChanged(current.clone()));
    }

    fn conflict_resolved(&self) {
        let _ = self.events.send(RepositoryEvent::ConflictResolved);
    }
}

/// Static description of a folder handed to [`Engine::new`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub name: String,
    pub identifier: Identifier,
    pub user: User,
    pub remote_url: String,
    pub paused: bool,
    pub timing: Timing,
}

struct State {
    status: SyncStatus,
    error: ErrorStatus,
    change_sets: Vec<ChangeSet>,
    poll: PollInterval,
}

/// Clears a flag when dropped.
struct FlagGuard<'a>(&'a AtomicBool);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn raise(flag: &AtomicBool) -> Option<FlagGuard<'_>> {
    flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .ok()
        .map(|_| FlagGuard(flag))
}

pub struct Engine {
    name: String,
    identifier: Identifier,
    user: User,
    remote_url: String,
    path: PathBuf,
    backend: Arc<dyn Backend>,
    listener: Arc<dyn Listener>,
    store: Arc<dyn FolderStore>,
    timing: Timing,
    gate: WatchGate,
    events: broadcast::Sender<RepositoryEvent>,
    progress: Arc<ProgressTracker>,
    cancel: CancellationToken,
    state: Mutex<State>,
    syncing: AtomicBool,
    buffering: AtomicBool,
    /// Set once initialization finished and the watcher may run.
    armed: AtomicBool,
    poll_stopped: AtomicBool,
    /// The listener dropped because the machine slept.
    slept: AtomicBool,
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        backend: Arc<dyn Backend>,
        listener: Arc<dyn Listener>,
        store: Arc<dyn FolderStore>,
        cancel: CancellationToken,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let status = if settings.paused {
            SyncStatus::Paused
        } else {
            SyncStatus::Idle
        };
        let gate = WatchGate::new();
        gate.disable();
        let poll = PollInterval::new(
            settings.timing.poll_short,
            settings.timing.poll_long,
            Instant::now(),
        );
        Engine {
            path: backend.path().to_path_buf(),
            name: settings.name,
            identifier: settings.identifier,
            user: settings.user,
            remote_url: settings.remote_url,
            backend,
            listener,
            store,
            timing: settings.timing,
            gate,
            progress: Arc::new(ProgressTracker::new(events.clone())),
            events,
            cancel,
            state: Mutex::new(State {
                status,
                error: ErrorStatus::None,
                change_sets: Vec::new(),
                poll,
            }),
            syncing: AtomicBool::new(false),
            buffering: AtomicBool::new(false),
            armed: AtomicBool::new(false),
            poll_stopped: AtomicBool::new(false),
            slept: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn gate(&self) -> &WatchGate {
        &self.gate
    }

    pub fn listener(&self) -> &Arc<dyn Listener> {
        &self.listener
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn exclude_paths(&self) -> Vec<String> {
        self.backend.exclude_paths()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RepositoryEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        lock(&self.state).status
    }

    pub fn error_status(&self) -> ErrorStatus {
        lock(&self.state).error
    }

    /// Change sets newest first, one entry per author and day.
    pub fn change_sets(&self) -> Vec<ChangeSet> {
        lock(&self.state).change_sets.clone()
    }

    pub fn progress(&self) -> Progress {
        self.progress.snapshot()
    }

    pub fn poll_interval(&self) -> Duration {
        lock(&self.state).poll.current()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.status() == SyncStatus::Paused
    }

    fn emit(&self, event: RepositoryEvent) {
        let _ = self.events.send(event);
    }

    fn set_status(&self, status: SyncStatus) {
        let changed = {
            let mut state = lock(&self.state);
            let changed = state.status != status;
            state.status = status;
            changed
        };
        if changed {
            debug!("[{}] {}", self.name, status);
            self.emit(RepositoryEvent::SyncStatusChanged(status));
        }
    }

    fn set_error(&self, error: ErrorStatus) {
        lock(&self.state).error = error;
    }

    fn fail(&self, failure: SyncFailure) {
        error!("[{}] {} ({})", self.name, failure.message, failure.status);
        self.set_error(failure.status);
        self.set_status(SyncStatus::Error);
    }

    fn context(&self, message: Option<String>) -> SyncContext {
        let reporter: Arc<dyn SyncReporter> = self.progress.clone();
        SyncContext::new(self.cancel.child_token())
            .with_reporter(reporter)
            .with_message(message)
    }

    /// Runs `f` against the adapter on the blocking pool; `None` if the
    /// call panicked.
    async fn adapter<T, F>(&self, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Backend) -> T + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        match tokio::task::spawn_blocking(move || f(backend.as_ref())).await {
            Ok(value) => Some(value),
            Err(e) => {
                error!("[{}] adapter call failed: {}", self.name, e);
                None
            }
        }
    }

    async fn transfer<F>(&self, f: F) -> SyncResult
    where
        F: FnOnce(&dyn Backend) -> SyncResult + Send + 'static,
    {
        self.adapter(f)
            .await
            .unwrap_or_else(|| Err(SyncFailure::unknown("adapter call failed")))
    }

    async fn has_local_changes(&self) -> bool {
        self.adapter(|b| b.has_local_changes())
            .await
            .unwrap_or(false)
    }

    async fn has_remote_changes(&self) -> bool {
        let ctx = self.context(None);
        self.adapter(move |b| b.has_remote_changes(&ctx))
            .await
            .unwrap_or(false)
    }

    async fn has_unsynced_changes(&self) -> bool {
        self.adapter(|b| b.has_unsynced_changes())
            .await
            .unwrap_or(false)
    }

    async fn set_unsynced_changes(&self, value: bool) {
        if let Some(Err(e)) = self.adapter(move |b| b.set_unsynced_changes(value)).await {
            warn!("[{}] could not update unsynced flag: {}", self.name, e);
        }
    }

    pub async fn current_revision(&self) -> Option<String> {
        self.adapter(|b| b.current_revision()).await.flatten()
    }

    fn try_begin(&self) -> Option<FlagGuard<'_>> {
        raise(&self.syncing)
    }

    /// Waits until no sync is in flight and takes the work flag.
    async fn begin(&self) -> Option<FlagGuard<'_>> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            if !self.is_buffering() {
                if let Some(guard) = self.try_begin() {
                    return Some(guard);
                }
            }
            tokio::time::sleep(self.timing.busy_wait).await;
        }
    }

    fn reenable_watcher(&self) {
        if self.armed.load(Ordering::Acquire) && !self.cancel.is_cancelled() {
            self.gate.enable();
        }
    }

    /// Loads history, then brings the folder up to date unless paused.
    pub async fn initialize(&self) {
        self.refresh_change_sets().await;
        if self.is_paused() {
            info!("[{}] paused", self.name);
            return;
        }
        if self.has_remote_changes().await {
            self.sync_down().await;
        }
        self.flush_local_changes(None).await;
    }

    /// Lets the watcher report activity from now on.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::Release);
        if !self.is_syncing() {
            self.gate.enable();
        }
    }

    async fn flush_local_changes(&self, message: Option<String>) {
        while !self.cancel.is_cancelled()
            && (self.has_unsynced_changes().await || self.has_local_changes().await)
        {
            if !self.sync_up(message.clone()).await {
                break;
            }
        }
    }

    /// Stops syncing. Only possible while idle; the flag is persisted.
    pub fn pause(&self) -> Result<()> {
        let status = self.status();
        if status != SyncStatus::Idle || self.is_syncing() {
            return Err(Error::CannotPause(status.as_str().to_string()));
        }
        self.store.set_paused(&self.name, true)?;
        self.set_status(SyncStatus::Paused);
        info!("[{}] paused", self.name);
        Ok(())
    }

    /// Leaves the paused state and sends whatever piled up meanwhile,
    /// with `message` as the first line of the commit message.
    pub async fn resume(&self, message: Option<String>) -> Result<()> {
        if !self.is_paused() {
            return Ok(());
        }
        self.store.set_paused(&self.name, false)?;
        self.set_status(SyncStatus::Idle);
        info!("[{}] resumed", self.name);
        self.flush_local_changes(message).await;
        Ok(())
    }

    /// Sends local edits and any unconfirmed send once. `Ok(false)` when
    /// nothing was pending.
    pub async fn send_pending(&self, message: Option<String>) -> Result<bool> {
        if !self.has_unsynced_changes().await && !self.has_local_changes().await {
            return Ok(false);
        }
        if self.sync_up(message).await {
            return Ok(true);
        }
        let status = self.error_status();
        Err(Error::Sync(SyncFailure::new(
            status,
            format!("sending changes failed: {}", status.describe()),
        )))
    }

    /// Retries sending after an error. Returns whether a sync succeeded.
    pub async fn force_retry(&self) -> bool {
        if self.status() != SyncStatus::Error || self.is_syncing() {
            return false;
        }
        info!("[{}] retrying", self.name);
        self.sync_up(None).await
    }

    /// Handles filesystem activity reported by the watcher.
    pub async fn on_file_activity(&self, activity: FileActivity) {
        let excludes = self.backend.exclude_paths();
        if activity.paths.iter().all(|p| is_excluded(p, &excludes)) {
            return;
        }
        if self.is_paused() {
            self.emit(RepositoryEvent::ChangesDetected);
            return;
        }
        if self.is_buffering() || self.is_syncing() {
            return;
        }
        if !self.has_local_changes().await {
            return;
        }
        let Some(_buffering) = raise(&self.buffering) else {
            return;
        };
        self.emit(RepositoryEvent::ChangesDetected);

        debug!("[{}] waiting for changes to settle", self.name);
        let root = self.path.clone();
        let settled = wait_until_settled(
            self.timing.settle_interval,
            self.timing.settle_samples,
            &self.cancel,
            || tree_size(&root, &excludes),
        )
        .await;
        if !settled {
            return;
        }
        while !self.cancel.is_cancelled() && self.has_local_changes().await {
            if !self.sync_up(None).await {
                break;
            }
        }
    }

    /// Sends local changes. Returns false when the sync failed or another
    /// one was in flight.
    pub async fn sync_up(&self, message: Option<String>) -> bool {
        let Some(_guard) = self.try_begin() else {
            return false;
        };
        self.gate.disable();
        let ok = self.sync_up_base(message).await;
        self.reenable_watcher();
        ok
    }

    async fn run_sync_up(&self, message: Option<String>) -> SyncResult {
        let ctx = self.context(message);
        self.transfer(move |b| b.sync_up(&ctx)).await
    }

    async fn sync_up_base(&self, message: Option<String>) -> bool {
        info!("[{}] syncing up", self.name);
        self.progress.reset();
        self.set_status(SyncStatus::SyncUp);
        self.set_unsynced_changes(true).await;

        let failure = match self.run_sync_up(message.clone()).await {
            Ok(()) => {
                self.finish_sync_up().await;
                return true;
            }
            Err(failure) => failure,
        };
        if failure.status == ErrorStatus::UnreadableFiles {
            self.fail(failure);
            return false;
        }

        warn!(
            "[{}] sync up failed ({}), fetching remote changes first",
            self.name, failure.status
        );
        self.sync_down_base().await;
        let failure = if self.error_status().is_none() {
            self.progress.reset();
            self.set_status(SyncStatus::SyncUp);
            match self.run_sync_up(message).await {
                Ok(()) => {
                    self.finish_sync_up().await;
                    return true;
                }
                Err(failure) => failure,
            }
        } else {
            failure
        };
        lock(&self.state).poll.shorten();
        self.fail(failure);
        false
    }

    async fn finish_sync_up(&self) {
        self.refresh_change_sets().await;
        self.set_unsynced_changes(false).await;
        lock(&self.state).poll.lengthen();
        if let Some(revision) = self.current_revision().await {
            self.listener
                .announce(Announcement::new(self.identifier.as_str(), revision));
        }
        self.set_error(ErrorStatus::None);
        self.set_status(SyncStatus::Idle);
        info!("[{}] changes sent", self.name);
    }

    /// Fetches remote changes. Returns false when the sync failed or
    /// another one was in flight.
    pub async fn sync_down(&self) -> bool {
        let Some(guard) = self.try_begin() else {
            return false;
        };
        self.sync_down_holding(guard).await
    }

    async fn sync_down_holding(&self, _guard: FlagGuard<'_>) -> bool {
        self.gate.disable();
        let mut ok = self.sync_down_base().await;
        if ok && self.has_unsynced_changes().await {
            ok = self.sync_up_base(None).await;
        }
        self.reenable_watcher();
        ok
    }

    async fn sync_down_base(&self) -> bool {
        info!("[{}] syncing down", self.name);
        self.progress.reset();
        self.set_status(SyncStatus::SyncDown);
        let before = self.current_revision().await;

        let ctx = self.context(None);
        if let Err(failure) = self.transfer(move |b| b.sync_down(&ctx)).await {
            self.refresh_change_sets().await;
            self.fail(failure);
            return false;
        }

        self.set_error(ErrorStatus::None);
        if let Err(e) = marker::write(&self.path, &self.identifier) {
            warn!("[{}] could not restamp marker: {}", self.name, e);
        }
        let newest = self.refresh_change_sets().await;
        let after = self.current_revision().await;
        if after != before {
            if let Some(change_set) = newest.filter(|cs| self.is_foreign(cs)) {
                self.emit(RepositoryEvent::NewChangeSet(change_set));
            }
        }
        self.set_status(SyncStatus::Idle);
        true
    }

    /// True when `change_set` is worth notifying: someone else made it and
    /// it is more than a marker restamp.
    fn is_foreign(&self, change_set: &ChangeSet) -> bool {
        let author = &change_set.user;
        let same_author = if !author.email.is_empty() && !self.user.email.is_empty() {
            author.email.eq_ignore_ascii_case(&self.user.email)
        } else {
            author.name == self.user.name
        };
        !same_author && !change_set.only_touches(MARKER_FILE_NAME)
    }

    /// Reloads history, stored grouped. Returns the newest single change
    /// set as the adapter reported it.
    async fn refresh_change_sets(&self) -> Option<ChangeSet> {
        let result = self
            .adapter(|b| b.change_sets(None, HISTORY_LIMIT))
            .await
            .unwrap_or_else(|| Err(SyncFailure::unknown("adapter call failed")));
        match result {
            Ok(mut change_sets) => {
                for change_set in &mut change_sets {
                    change_set.folder = Some(self.name.clone());
                    change_set.remote_url = Some(self.remote_url.clone());
                }
                let newest = change_sets.iter().max_by_key(|cs| cs.timestamp).cloned();
                lock(&self.state).change_sets = group_change_sets(change_sets);
                newest
            }
            Err(e) => {
                warn!("[{}] could not read history: {}", self.name, e);
                None
            }
        }
    }

    /// One wake-up of the poll timer.
    pub async fn poll_tick(&self) {
        if self.poll_stopped.load(Ordering::Acquire)
            || self.is_syncing()
            || self.is_buffering()
            || self.is_paused()
        {
            return;
        }
        let due = {
            let mut state = lock(&self.state);
            let now = Instant::now();
            let due = state.poll.is_due(now);
            if due {
                state.poll.checked(now);
            }
            due
        };

        if due {
            debug!("[{}] polling remote", self.name);
            if self.has_unsynced_changes().await || self.has_local_changes().await {
                self.sync_up(None).await;
            }
            if self.has_remote_changes().await {
                self.sync_down().await;
            }
            if self.listener.is_connected() {
                lock(&self.state).poll.lengthen();
            }
        } else if self.error_status().is_none()
            && !self.is_syncing()
            && self.has_unsynced_changes().await
        {
            self.sync_up(None).await;
        }
    }

    /// Fetches the announced revision unless it is already here.
    pub async fn on_announcement(&self, announcement: &Announcement) {
        if announcement.folder_identifier != self.identifier.as_str() {
            return;
        }
        if self.current_revision().await.as_deref() == Some(announcement.message.as_str()) {
            debug!("[{}] already at announced revision", self.name);
            return;
        }
        info!(
            "[{}] remote announced revision {}",
            self.name, announcement.message
        );
        let Some(guard) = self.begin().await else {
            return;
        };
        if self.is_paused() {
            return;
        }
        self.sync_down_holding(guard).await;
    }

    pub async fn on_listener_event(&self, event: ListenerEvent) {
        match event {
            ListenerEvent::Connected => {
                lock(&self.state).poll.lengthen();
                if self.slept.swap(false, Ordering::AcqRel) {
                    info!("[{}] reconnected after sleep, fetching changes", self.name);
                    if let Some(guard) = self.begin().await {
                        if !self.is_paused() {
                            self.sync_down_holding(guard).await;
                        }
                    }
                }
            }
            ListenerEvent::Disconnected(reason) => {
                lock(&self.state).poll.shorten();
                if reason == DisconnectReason::SystemSleep {
                    self.slept.store(true, Ordering::Release);
                    self.recover_from_sleep().await;
                }
            }
            ListenerEvent::Announcement(announcement) => {
                self.on_announcement(&announcement).await;
            }
        }
    }

    /// Keeps polling off and retries the listener with exponential
    /// backoff until it is connected again.
    pub async fn recover_from_sleep(&self) {
        self.poll_stopped.store(true, Ordering::Release);
        let mut backoff =
            ReconnectBackoff::new(self.timing.sleep_backoff_initial, self.timing.sleep_backoff_max);
        while !self.listener.is_connected() {
            let delay = backoff.next_delay();
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            if self.listener.is_connected() {
                break;
            }
            debug!("[{}] reconnecting listener", self.name);
            self.listener.reconnect();
        }
        self.poll_stopped.store(false, Ordering::Release);
    }

    /// Writes `path` as of `revision` to `target` without touching history.
    pub async fn restore_file(&self, path: &str, revision: &str, target: &Path) -> Result<()> {
        let ctx = self.context(None);
        let (p, rev, dest) = (path.to_string(), revision.to_string(), target.to_path_buf());
        self.transfer(move |b| b.restore_file(&p, &rev, &dest, &ctx))
            .await?;
        info!(
            "[{}] restored {} at {} to {}",
            self.name,
            path,
            revision,
            target.display()
        );
        Ok(())
    }

    /// Stops everything; an in-flight adapter call is cancelled.
    pub fn dispose(&self) {
        self.cancel.cancel();
        self.gate.disable();
        self.listener.unsubscribe_channel(self.identifier.as_str());
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name)
            .field("backend", &self.backend.name())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
