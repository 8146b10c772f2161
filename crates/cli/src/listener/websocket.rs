// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Listener backed by a WebSocket connection to an announcement relay.
//!
//! All connection work happens in one background task. Handles talk to it
//! through a command channel and read its state from a
//! [`SharedConnectionState`], so callers never wait on the network.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use drift_core::protocol::{ClientMessage, ServerMessage};
use drift_core::Announcement;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::{ConnectionState, SharedConnectionState};
use super::transport::{Transport, WebSocketTransport};
use super::{DisconnectReason, Listener, ListenerEvent, RecentAnnouncements};

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Interval between pings; an unanswered ping drops the connection.
    pub heartbeat: Duration,
    /// Retry interval while disconnected.
    pub reconnect_interval: Duration,
    /// Extra wall-clock time between heartbeats tolerated before the gap
    /// is attributed to a system sleep.
    pub sleep_grace: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig {
            heartbeat: Duration::from_secs(30),
            reconnect_interval: Duration::from_secs(60),
            sleep_grace: Duration::from_secs(30),
        }
    }
}

/// Notices suspends by comparing wall-clock progress between heartbeats.
#[derive(Debug, Clone)]
pub(crate) struct SleepDetector {
    last: SystemTime,
    limit: Duration,
}

impl SleepDetector {
    pub(crate) fn new(now: SystemTime, heartbeat: Duration, grace: Duration) -> Self {
        SleepDetector {
            last: now,
            limit: heartbeat + grace,
        }
    }

    /// Records a heartbeat at `now`; true when the wall clock jumped past
    /// the limit since the previous one.
    pub(crate) fn check(&mut self, now: SystemTime) -> bool {
        let gap = now.duration_since(self.last).unwrap_or_default();
        self.last = now;
        gap > self.limit
    }
}

#[derive(Debug)]
enum Command {
    Subscribe(String),
    Unsubscribe(String),
    Announce(Announcement),
    Reconnect,
}

/// Handle to a running listener task. Dropping the last handle stops it.
pub struct WebSocketListener {
    server: String,
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<ListenerEvent>,
    state: Arc<SharedConnectionState>,
    shutdown: CancellationToken,
}

impl WebSocketListener {
    /// Spawns a listener for `server` on the current tokio runtime.
    pub fn spawn(server: &str, config: ListenerConfig) -> Arc<Self> {
        Self::spawn_with_transport(server, config, WebSocketTransport::new())
    }

    pub fn spawn_with_transport<T: Transport + 'static>(
        server: &str,
        config: ListenerConfig,
        transport: T,
    ) -> Arc<Self> {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(64);
        let state = Arc::new(SharedConnectionState::new());
        let shutdown = CancellationToken::new();

        let task = ListenerTask {
            server: server.to_string(),
            transport,
            config,
            commands: command_rx,
            events: events.clone(),
            state: Arc::clone(&state),
            shutdown: shutdown.clone(),
            channels: BTreeSet::new(),
            queued: HashMap::new(),
            recent: RecentAnnouncements::new(),
            ping_id: 0,
            awaiting_pong: None,
        };
        tokio::spawn(task.run());

        Arc::new(WebSocketListener {
            server: server.to_string(),
            commands,
            events,
            state,
            shutdown,
        })
    }

    /// Connection state shared with the task.
    pub fn state(&self) -> &SharedConnectionState {
        &self.state
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("listener for {} is stopped", self.server);
        }
    }
}

impl Drop for WebSocketListener {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for WebSocketListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketListener")
            .field("server", &self.server)
            .field("state", &self.state.get())
            .finish()
    }
}

impl Listener for WebSocketListener {
    fn server(&self) -> &str {
        &self.server
    }

    fn events(&self) -> broadcast::Receiver<ListenerEvent> {
        self.events.subscribe()
    }

    fn subscribe_channel(&self, channel: &str) {
        self.send(Command::Subscribe(channel.to_string()));
    }

    fn unsubscribe_channel(&self, channel: &str) {
        self.send(Command::Unsubscribe(channel.to_string()));
    }

    fn announce(&self, announcement: Announcement) {
        self.send(Command::Announce(announcement));
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn reconnect(&self) {
        self.send(Command::Reconnect);
    }
}

struct ListenerTask<T> {
    server: String,
    transport: T,
    config: ListenerConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<ListenerEvent>,
    state: Arc<SharedConnectionState>,
    shutdown: CancellationToken,
    channels: BTreeSet<String>,
    /// Latest announcement per folder made while disconnected.
    queued: HashMap<String, Announcement>,
    recent: RecentAnnouncements,
    ping_id: u64,
    awaiting_pong: Option<u64>,
}

impl<T: Transport> ListenerTask<T> {
    async fn run(mut self) {
        let start = Instant::now();
        let mut heartbeat = interval_at(start + self.config.heartbeat, self.config.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut retry = interval_at(
            start + self.config.reconnect_interval,
            self.config.reconnect_interval,
        );
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sleep = SleepDetector::new(
            SystemTime::now(),
            self.config.heartbeat,
            self.config.sleep_grace,
        );

        self.connect().await;

        loop {
            let connected = self.transport.is_connected();
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                message = self.transport.recv(), if connected => match message {
                    Ok(Some(message)) => self.handle_message(message),
                    Ok(None) => self.drop_connection(DisconnectReason::Other).await,
                    Err(e) => {
                        debug!("listener {}: {}", self.server, e);
                        self.drop_connection(DisconnectReason::Other).await;
                    }
                },
                _ = heartbeat.tick() => {
                    if sleep.check(SystemTime::now()) {
                        info!("listener {}: system sleep detected", self.server);
                        if self.transport.is_connected() {
                            self.drop_connection(DisconnectReason::SystemSleep).await;
                        }
                    } else if self.transport.is_connected() {
                        self.heartbeat().await;
                    }
                }
                _ = retry.tick(), if !connected => self.connect().await,
            }
        }

        let _ = self.transport.disconnect().await;
        self.state.set(ConnectionState::Disconnected);
        debug!("listener {} stopped", self.server);
    }

    async fn connect(&mut self) {
        if self.transport.is_connected() {
            return;
        }
        self.state.set(ConnectionState::Connecting);
        if let Err(e) = self.transport.connect(&self.server).await {
            debug!("listener {}: {}", self.server, e);
            self.state.record_failure();
            return;
        }
        self.awaiting_pong = None;

        let channels: Vec<String> = self.channels.iter().cloned().collect();
        for channel in channels {
            if !self.send(ClientMessage::subscribe(channel)).await {
                return;
            }
        }
        let queued: Vec<Announcement> = self.queued.drain().map(|(_, a)| a).collect();
        for announcement in queued {
            self.publish(announcement).await;
        }
        if !self.transport.is_connected() {
            return;
        }

        info!("listener connected to {}", self.server);
        self.state.set(ConnectionState::Connected);
        let _ = self.events.send(ListenerEvent::Connected);
    }

    async fn drop_connection(&mut self, reason: DisconnectReason) {
        let _ = self.transport.disconnect().await;
        self.awaiting_pong = None;
        self.state.set(ConnectionState::Disconnected);
        warn!("listener {} disconnected: {:?}", self.server, reason);
        let _ = self.events.send(ListenerEvent::Disconnected(reason));
    }

    /// Sends `msg`; a failure drops the connection and returns false.
    async fn send(&mut self, msg: ClientMessage) -> bool {
        match self.transport.send(msg).await {
            Ok(()) => true,
            Err(e) => {
                debug!("listener {}: {}", self.server, e);
                self.drop_connection(DisconnectReason::Other).await;
                false
            }
        }
    }

    async fn publish(&mut self, announcement: Announcement) {
        if self.transport.is_connected() {
            let msg = ClientMessage::announce(announcement.clone());
            if self.send(msg).await {
                return;
            }
        }
        self.queued
            .insert(announcement.folder_identifier.clone(), announcement);
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe(channel) => {
                if self.channels.insert(channel.clone()) && self.transport.is_connected() {
                    self.send(ClientMessage::subscribe(channel)).await;
                }
            }
            Command::Unsubscribe(channel) => {
                self.queued.remove(&channel);
                self.recent.forget(&channel);
                if self.channels.remove(&channel) && self.transport.is_connected() {
                    self.send(ClientMessage::unsubscribe(channel)).await;
                }
            }
            Command::Announce(announcement) => {
                self.recent.remember(&announcement);
                self.publish(announcement).await;
            }
            Command::Reconnect => self.connect().await,
        }
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Announcement { announcement } => {
                if !self.channels.contains(&announcement.folder_identifier) {
                    return;
                }
                if self.recent.remember(&announcement) {
                    let _ = self.events.send(ListenerEvent::Announcement(announcement));
                }
            }
            ServerMessage::Pong { id } => {
                if self.awaiting_pong == Some(id) {
                    self.awaiting_pong = None;
                }
            }
            ServerMessage::Error { message } => {
                warn!("listener {}: server error: {}", self.server, message);
            }
        }
    }

    async fn heartbeat(&mut self) {
        if self.awaiting_pong.is_some() {
            self.drop_connection(DisconnectReason::TimeOut).await;
            return;
        }
        self.ping_id = self.ping_id.wrapping_add(1);
        let id = self.ping_id;
        if self.send(ClientMessage::ping(id)).await {
            self.awaiting_pong = Some(id);
        }
    }
}

#[cfg(test)]
#[path = "websocket_tests.rs"]
mod tests;
