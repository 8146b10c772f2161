// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory adapter, listener and store for orchestrator tests.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use drift_core::{Announcement, Change, ChangeSet, ChangeType, ErrorStatus, Identifier, User};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::engine::{Engine, EngineSettings, FolderStore, Timing};
use crate::backend::{Backend, SyncContext, SyncFailure, SyncResult};
use crate::error::Result;
use crate::listener::{Listener, ListenerEvent};
use crate::marker::MARKER_FILE_NAME;

pub const FAKE_STATE_DIR: &str = ".fake";

pub fn me() -> User {
    User::new("Alice", "alice@example.com")
}

pub fn bob() -> User {
    User::new("Bob", "bob@example.com")
}

/// Short timers so tests finish quickly on the real clock.
pub fn fast_timing() -> Timing {
    Timing {
        poll_short: Duration::from_secs(3600),
        poll_long: Duration::from_secs(7200),
        tick: Duration::from_millis(20),
        settle_interval: Duration::from_millis(20),
        settle_samples: 3,
        busy_wait: Duration::from_millis(5),
        ..Timing::default()
    }
}

type Snapshot = BTreeMap<String, Vec<u8>>;

fn snapshot(root: &Path) -> Snapshot {
    fn walk(root: &Path, dir: &Path, out: &mut Snapshot) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let rel = path
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            if rel == FAKE_STATE_DIR || rel == MARKER_FILE_NAME {
                continue;
            }
            if path.is_dir() {
                walk(root, &path, out);
            } else if let Ok(bytes) = fs::read(&path) {
                out.insert(rel, bytes);
            }
        }
    }
    let mut out = Snapshot::new();
    walk(root, root, &mut out);
    out
}

fn diff(before: &Snapshot, after: &Snapshot) -> Vec<Change> {
    let now = Local::now();
    let mut changes = Vec::new();
    for (path, bytes) in after {
        match before.get(path) {
            None => changes.push(Change::new(path, ChangeType::Added, now)),
            Some(old) if old != bytes => changes.push(Change::new(path, ChangeType::Edited, now)),
            _ => {}
        }
    }
    for path in before.keys().filter(|p| !after.contains_key(*p)) {
        changes.push(Change::new(path, ChangeType::Deleted, now));
    }
    changes
}

/// Content arriving with the next sync down.
#[derive(Debug, Clone)]
struct RemoteUpdate {
    user: User,
    files: Vec<(String, Vec<u8>)>,
    changes: Vec<Change>,
}

#[derive(Default)]
struct FakeState {
    synced: Snapshot,
    revision: usize,
    history: Vec<ChangeSet>,
    remote: Option<RemoteUpdate>,
    fail_up: VecDeque<SyncFailure>,
    fail_down: VecDeque<SyncFailure>,
    calls: Vec<&'static str>,
    messages: Vec<Option<String>>,
    versions: BTreeMap<(String, String), Vec<u8>>,
}

/// Adapter over a plain directory that records what it was asked to do.
pub struct FakeBackend {
    root: PathBuf,
    user: User,
    unsynced: AtomicBool,
    up_delay: Mutex<Option<Duration>>,
    progress_steps: Mutex<Vec<f64>>,
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new(root: &Path) -> Arc<Self> {
        Arc::new(FakeBackend {
            root: root.to_path_buf(),
            user: me(),
            unsynced: AtomicBool::new(false),
            up_delay: Mutex::new(None),
            progress_steps: Mutex::new(vec![50.0, 100.0]),
            state: Mutex::new(FakeState::default()),
        })
    }

    /// Queues remote changes by `user` writing `files`.
    pub fn push_remote(&self, user: User, files: &[(&str, &str)]) {
        let now = Local::now();
        let files: Vec<(String, Vec<u8>)> = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
            .collect();
        let changes = files
            .iter()
            .map(|(p, _)| Change::new(p, ChangeType::Added, now))
            .collect();
        self.state.lock().unwrap().remote = Some(RemoteUpdate {
            user,
            files,
            changes,
        });
    }

    /// Queues a remote change set that only touches the marker file.
    pub fn push_remote_marker_restamp(&self, user: User) {
        let now = Local::now();
        self.state.lock().unwrap().remote = Some(RemoteUpdate {
            user,
            files: Vec::new(),
            changes: vec![Change::new(MARKER_FILE_NAME, ChangeType::Edited, now)],
        });
    }

    pub fn fail_next_up(&self, status: ErrorStatus) {
        self.state
            .lock()
            .unwrap()
            .fail_up
            .push_back(SyncFailure::new(status, format!("up failed: {}", status)));
    }

    pub fn fail_next_down(&self, status: ErrorStatus) {
        self.state
            .lock()
            .unwrap()
            .fail_down
            .push_back(SyncFailure::new(status, format!("down failed: {}", status)));
    }

    pub fn set_up_delay(&self, delay: Duration) {
        *self.up_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_progress_steps(&self, steps: &[f64]) {
        *self.progress_steps.lock().unwrap() = steps.to_vec();
    }

    pub fn store_version(&self, path: &str, revision: &str, content: &str) {
        self.state.lock().unwrap().versions.insert(
            (path.to_string(), revision.to_string()),
            content.as_bytes().to_vec(),
        );
    }

    pub fn mark_unsynced(&self) {
        self.unsynced.store(true, Ordering::SeqCst);
    }

    /// Adapter operations performed so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn messages(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn history(&self) -> Vec<ChangeSet> {
        self.state.lock().unwrap().history.clone()
    }

    fn commit(state: &mut FakeState, user: User, changes: Vec<Change>) {
        state.revision += 1;
        let mut change_set = ChangeSet::new(format!("r{}", state.revision), user, Local::now());
        change_set.changes = changes;
        state.history.push(change_set);
    }
}

impl Backend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn path(&self) -> &Path {
        &self.root
    }

    fn sync_up(&self, ctx: &SyncContext) -> SyncResult {
        if let Some(delay) = *self.up_delay.lock().unwrap() {
            std::thread::sleep(delay);
        }
        for step in self.progress_steps.lock().unwrap().iter() {
            ctx.report(*step, None, "sending");
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push("up");
        state.messages.push(ctx.message.clone());
        if let Some(failure) = state.fail_up.pop_front() {
            return Err(failure);
        }
        let current = snapshot(&self.root);
        let changes = diff(&state.synced, &current);
        if !changes.is_empty() {
            Self::commit(&mut state, self.user.clone(), changes);
        }
        state.synced = current;
        Ok(())
    }

    fn sync_down(&self, ctx: &SyncContext) -> SyncResult {
        for step in self.progress_steps.lock().unwrap().iter() {
            ctx.report(*step, None, "receiving");
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push("down");
        if let Some(failure) = state.fail_down.pop_front() {
            return Err(failure);
        }
        if let Some(update) = state.remote.take() {
            for (path, bytes) in &update.files {
                fs::write(self.root.join(path), bytes)?;
                state.synced.insert(path.clone(), bytes.clone());
            }
            Self::commit(&mut state, update.user, update.changes);
        }
        Ok(())
    }

    fn has_local_changes(&self) -> bool {
        let state = self.state.lock().unwrap();
        snapshot(&self.root) != state.synced
    }

    fn has_remote_changes(&self, _ctx: &SyncContext) -> bool {
        self.state.lock().unwrap().remote.is_some()
    }

    fn has_unsynced_changes(&self) -> bool {
        self.unsynced.load(Ordering::SeqCst)
    }

    fn set_unsynced_changes(&self, value: bool) -> std::io::Result<()> {
        self.unsynced.store(value, Ordering::SeqCst);
        Ok(())
    }

    fn current_revision(&self) -> Option<String> {
        let revision = self.state.lock().unwrap().revision;
        (revision > 0).then(|| format!("r{}", revision))
    }

    fn size(&self) -> u64 {
        snapshot(&self.root).values().map(|b| b.len() as u64).sum()
    }

    fn history_size(&self) -> u64 {
        0
    }

    fn exclude_paths(&self) -> Vec<String> {
        vec![FAKE_STATE_DIR.to_string()]
    }

    fn change_sets(&self, _path: Option<&str>, limit: usize) -> SyncResult<Vec<ChangeSet>> {
        let state = self.state.lock().unwrap();
        Ok(state.history.iter().rev().take(limit).cloned().collect())
    }

    fn restore_file(
        &self,
        path: &str,
        revision: &str,
        target: &Path,
        _ctx: &SyncContext,
    ) -> SyncResult {
        let state = self.state.lock().unwrap();
        let Some(bytes) = state
            .versions
            .get(&(path.to_string(), revision.to_string()))
        else {
            return Err(SyncFailure::new(
                ErrorStatus::NotFound,
                format!("no {} at {}", path, revision),
            ));
        };
        fs::write(target, bytes)?;
        Ok(())
    }
}

/// Records persisted pause flags.
#[derive(Default)]
pub struct RecordingStore {
    pub paused: Mutex<Vec<(String, bool)>>,
}

impl FolderStore for RecordingStore {
    fn set_paused(&self, name: &str, paused: bool) -> Result<()> {
        self.paused
            .lock()
            .unwrap()
            .push((name.to_string(), paused));
        Ok(())
    }
}

/// Listener whose connection state the test controls.
pub struct FakeListener {
    connected: AtomicBool,
    /// Becomes connected on this reconnect attempt.
    connect_on: AtomicUsize,
    reconnects: Mutex<Vec<Instant>>,
    events: broadcast::Sender<ListenerEvent>,
    pub announced: Mutex<Vec<Announcement>>,
    pub subscribed: Mutex<Vec<String>>,
}

impl FakeListener {
    pub fn new(connected: bool) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(FakeListener {
            connected: AtomicBool::new(connected),
            connect_on: AtomicUsize::new(usize::MAX),
            reconnects: Mutex::new(Vec::new()),
            events,
            announced: Mutex::new(Vec::new()),
            subscribed: Mutex::new(Vec::new()),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn connect_on_attempt(&self, attempt: usize) {
        self.connect_on.store(attempt, Ordering::SeqCst);
    }

    pub fn reconnects(&self) -> Vec<Instant> {
        self.reconnects.lock().unwrap().clone()
    }

    pub fn emit(&self, event: ListenerEvent) {
        let _ = self.events.send(event);
    }
}

impl Listener for FakeListener {
    fn server(&self) -> &str {
        "fake://relay"
    }

    fn events(&self) -> broadcast::Receiver<ListenerEvent> {
        self.events.subscribe()
    }

    fn subscribe_channel(&self, channel: &str) {
        self.subscribed.lock().unwrap().push(channel.to_string());
    }

    fn unsubscribe_channel(&self, channel: &str) {
        self.subscribed.lock().unwrap().retain(|c| c != channel);
    }

    fn announce(&self, announcement: Announcement) {
        self.announced.lock().unwrap().push(announcement);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn reconnect(&self) {
        let mut reconnects = self.reconnects.lock().unwrap();
        reconnects.push(Instant::now());
        if reconnects.len() >= self.connect_on.load(Ordering::SeqCst) {
            self.connected.store(true, Ordering::SeqCst);
        }
    }
}

/// An engine over a [`FakeBackend`] rooted at `root`.
pub struct Fixture {
    pub engine: Arc<Engine>,
    pub backend: Arc<FakeBackend>,
    pub listener: Arc<FakeListener>,
    pub store: Arc<RecordingStore>,
}

pub fn settings(paused: bool, timing: Timing) -> EngineSettings {
    EngineSettings {
        name: "photos".to_string(),
        identifier: Identifier::parse("f".repeat(64).as_str()).unwrap(),
        user: me(),
        remote_url: "ssh://host/photos".to_string(),
        paused,
        timing,
    }
}

pub fn fixture(root: &Path, paused: bool) -> Fixture {
    fixture_with(root, paused, fast_timing())
}

pub fn fixture_with(root: &Path, paused: bool, timing: Timing) -> Fixture {
    let backend = FakeBackend::new(root);
    let listener = FakeListener::new(true);
    let store = Arc::new(RecordingStore::default());
    let settings = settings(paused, timing);
    let backend_dyn: Arc<dyn Backend> = backend.clone();
    let listener_dyn: Arc<dyn Listener> = listener.clone();
    let store_dyn: Arc<dyn FolderStore> = store.clone();
    let engine = Arc::new(Engine::new(
        settings,
        backend_dyn,
        listener_dyn,
        store_dyn,
        CancellationToken::new(),
    ));
    Fixture {
        engine,
        backend,
        listener,
        store,
    }
}
