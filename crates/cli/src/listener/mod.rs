// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Push notifications between replicas of a folder.
//!
//! A listener keeps one connection to an announcement server and carries
//! announcements for every folder subscribed through it. Announcements are
//! only hints: a repository that hears one still asks its adapter before
//! syncing, and polling keeps folders in sync when no listener is connected.
//!
//! ```text
//! ┌────────────┐  subscribe/announce  ┌──────────┐      ┌────────────┐
//! │ Repository │─────────────────────►│ Listener │─────►│ drift-relay│
//! │            │◄─────────────────────│  (task)  │◄─────│            │
//! └────────────┘   ListenerEvent      └──────────┘      └────────────┘
//! ```

mod connection;
mod transport;
mod websocket;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drift_core::Announcement;
use tokio::sync::broadcast;

pub use connection::{ConnectionState, SharedConnectionState};
pub use transport::{Transport, TransportError, TransportFuture, TransportResult, WebSocketTransport};
pub use websocket::{ListenerConfig, WebSocketListener};

/// Announcements remembered per folder for duplicate detection.
pub const RECENT_ANNOUNCEMENTS: usize = 10;

/// Why a listener lost its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server stopped answering heartbeats.
    TimeOut,
    /// The machine was suspended long enough to drop the connection.
    SystemSleep,
    Other,
}

/// Signals delivered to every subscriber of a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    Connected,
    Disconnected(DisconnectReason),
    Announcement(Announcement),
}

/// A push-notification client shared by the folders using one server.
pub trait Listener: Send + Sync {
    /// Announcement server address.
    fn server(&self) -> &str;

    /// New receiver for this listener's events.
    fn events(&self) -> broadcast::Receiver<ListenerEvent>;

    /// Starts delivering announcements for `channel` (a folder identifier).
    fn subscribe_channel(&self, channel: &str);

    fn unsubscribe_channel(&self, channel: &str);

    /// Publishes a new revision; queued while disconnected.
    fn announce(&self, announcement: Announcement);

    fn is_connected(&self) -> bool;

    /// Attempts to connect now instead of waiting for the retry timer.
    fn reconnect(&self);
}

/// Last few announcements seen per folder.
#[derive(Debug, Default)]
pub struct RecentAnnouncements {
    by_folder: HashMap<String, VecDeque<String>>,
}

impl RecentAnnouncements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers `announcement`; returns false when it was already known.
    pub fn remember(&mut self, announcement: &Announcement) -> bool {
        let seen = self
            .by_folder
            .entry(announcement.folder_identifier.clone())
            .or_default();
        if seen.iter().any(|m| *m == announcement.message) {
            return false;
        }
        if seen.len() == RECENT_ANNOUNCEMENTS {
            seen.pop_front();
        }
        seen.push_back(announcement.message.clone());
        true
    }

    pub fn forget(&mut self, folder: &str) {
        self.by_folder.remove(folder);
    }
}

/// Exponential backoff used to reconnect after a system sleep.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    next: Duration,
    initial: Duration,
    max: Duration,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        ReconnectBackoff {
            next: initial,
            initial,
            max,
        }
    }

    /// Delay before the next attempt; doubles up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

impl Default for ReconnectBackoff {
    /// 2 s, 4 s, 8 s, … capped at 64 s.
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(64))
    }
}

/// Listener for folders without an announcement server; never connects.
#[derive(Debug)]
pub struct NullListener {
    events: broadcast::Sender<ListenerEvent>,
}

impl NullListener {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1);
        NullListener { events }
    }
}

impl Default for NullListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Listener for NullListener {
    fn server(&self) -> &str {
        ""
    }

    fn events(&self) -> broadcast::Receiver<ListenerEvent> {
        self.events.subscribe()
    }

    fn subscribe_channel(&self, _channel: &str) {}

    fn unsubscribe_channel(&self, _channel: &str) {}

    fn announce(&self, _announcement: Announcement) {}

    fn is_connected(&self) -> bool {
        false
    }

    fn reconnect(&self) {}
}

/// One listener per announcement server, shared by every folder using it.
pub struct ListenerRegistry {
    config: ListenerConfig,
    listeners: Mutex<HashMap<String, Arc<dyn Listener>>>,
}

impl ListenerRegistry {
    pub fn new(config: ListenerConfig) -> Self {
        ListenerRegistry {
            config,
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Listener for `server`, spawning it on first use. Needs a tokio
    /// runtime. `None` or an empty address gives a [`NullListener`].
    pub fn listener(&self, server: Option<&str>) -> Arc<dyn Listener> {
        let Some(server) = server.map(str::trim).filter(|s| !s.is_empty()) else {
            return Arc::new(NullListener::new());
        };
        let mut listeners = match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners
            .entry(server.to_string())
            .or_insert_with(|| {
                let listener: Arc<dyn Listener> =
                    WebSocketListener::spawn(server, self.config.clone());
                listener
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test_helpers;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
