// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Channel membership and the last announcement seen on each channel.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use drift_core::protocol::ServerMessage;
use drift_core::Announcement;

/// Connection handle assigned by [`RelayState::connect`].
pub type ClientId = u64;

#[derive(Default)]
struct Channel {
    subscribers: HashSet<ClientId>,
    /// Replayed to new subscribers so a peer that was offline catches up.
    last: Option<Announcement>,
}

#[derive(Default)]
struct Registry {
    clients: HashMap<ClientId, mpsc::UnboundedSender<ServerMessage>>,
    channels: HashMap<String, Channel>,
}

/// Shared relay state, cheap to clone into every connection task.
#[derive(Clone, Default)]
pub struct RelayState {
    inner: Arc<RelayStateInner>,
}

#[derive(Default)]
struct RelayStateInner {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection. Messages for it arrive on the receiver.
    pub async fn connect(&self) -> (ClientId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.registry.lock().await.clients.insert(id, tx);
        (id, rx)
    }

    /// Drops a connection and all of its subscriptions.
    pub async fn disconnect(&self, client: ClientId) {
        let mut registry = self.inner.registry.lock().await;
        registry.clients.remove(&client);
        for channel in registry.channels.values_mut() {
            channel.subscribers.remove(&client);
        }
        registry
            .channels
            .retain(|_, c| !c.subscribers.is_empty() || c.last.is_some());
    }

    /// Adds `client` to `channel`; returns the announcement to replay.
    pub async fn subscribe(&self, client: ClientId, channel: &str) -> Option<Announcement> {
        let mut registry = self.inner.registry.lock().await;
        let channel = registry.channels.entry(channel.to_string()).or_default();
        channel.subscribers.insert(client);
        channel.last.clone()
    }

    pub async fn unsubscribe(&self, client: ClientId, channel: &str) {
        let mut registry = self.inner.registry.lock().await;
        if let Some(channel) = registry.channels.get_mut(channel) {
            channel.subscribers.remove(&client);
        }
    }

    /// Remembers `announcement` and forwards it to every subscriber of its
    /// channel, the sender included. Returns how many received it.
    pub async fn announce(&self, announcement: Announcement) -> usize {
        let mut registry = self.inner.registry.lock().await;
        let Registry { clients, channels } = &mut *registry;
        let channel = channels
            .entry(announcement.folder_identifier.clone())
            .or_default();
        channel.last = Some(announcement.clone());

        let mut delivered = 0;
        for id in &channel.subscribers {
            let Some(tx) = clients.get(id) else { continue };
            if tx
                .send(ServerMessage::announcement(announcement.clone()))
                .is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of subscribers of `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.inner
            .registry
            .lock()
            .await
            .channels
            .get(channel)
            .map(|c| c.subscribers.len())
            .unwrap_or(0)
    }
}
