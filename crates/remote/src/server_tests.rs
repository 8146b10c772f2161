// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-process relay tests with real WebSocket clients.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use drift_core::protocol::{ClientMessage, ServerMessage};
use drift_core::Announcement;

use crate::server;
use crate::state::RelayState;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A relay on a random port, stopped on drop.
struct TestRelay {
    addr: SocketAddr,
    state: RelayState,
    _shutdown: oneshot::Sender<()>,
}

impl TestRelay {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = RelayState::new();
        let (shutdown, stopped) = oneshot::channel::<()>();

        let accept_state = state.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = server::accept_loop(listener, accept_state) => {}
                _ = stopped => {}
            }
        });

        TestRelay {
            addr,
            state,
            _shutdown: shutdown,
        }
    }

    async fn client(&self) -> Client {
        let (ws, _) = connect_async(format!("ws://{}", self.addr)).await.unwrap();
        let (sink, stream) = ws.split();
        Client { sink, stream }
    }
}

struct Client {
    sink: SplitSink<Ws, Message>,
    stream: SplitStream<Ws>,
}

impl Client {
    async fn send(&mut self, msg: ClientMessage) {
        self.sink
            .send(Message::Text(msg.to_json().unwrap().into()))
            .await
            .unwrap();
    }

    async fn send_raw(&mut self, text: &str) {
        self.sink
            .send(Message::Text(text.to_string().into()))
            .await
            .unwrap();
    }

    /// Next server message, or `None` after a short quiet period.
    async fn next(&mut self) -> Option<ServerMessage> {
        loop {
            match timeout(Duration::from_millis(500), self.stream.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    return Some(ServerMessage::from_json(&text).unwrap())
                }
                Ok(Some(Ok(_))) => continue,
                Ok(other) => panic!("connection ended: {:?}", other),
                Err(_) => return None,
            }
        }
    }

    /// Subscribes and waits until the relay has processed it.
    async fn subscribe(&mut self, channel: &str, ping: u64) -> Option<ServerMessage> {
        self.send(ClientMessage::subscribe(channel)).await;
        self.send(ClientMessage::ping(ping)).await;
        let first = self.next().await;
        match first {
            Some(ServerMessage::Pong { id }) if id == ping => None,
            replay => {
                assert_eq!(self.next().await, Some(ServerMessage::pong(ping)));
                replay
            }
        }
    }
}

fn announcement(channel: &str, revision: &str) -> Announcement {
    Announcement::new(channel, revision)
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let relay = TestRelay::start().await;
    let mut client = relay.client().await;

    client.send(ClientMessage::ping(42)).await;

    assert_eq!(client.next().await, Some(ServerMessage::pong(42)));
}

#[tokio::test]
async fn announcement_reaches_every_subscriber_including_sender() {
    let relay = TestRelay::start().await;
    let mut alice = relay.client().await;
    let mut bob = relay.client().await;
    alice.subscribe("folder-a", 1).await;
    bob.subscribe("folder-a", 2).await;

    alice
        .send(ClientMessage::announce(announcement("folder-a", "rev1")))
        .await;

    let expected = Some(ServerMessage::announcement(announcement("folder-a", "rev1")));
    assert_eq!(bob.next().await, expected);
    assert_eq!(alice.next().await, expected);
}

#[tokio::test]
async fn other_channels_hear_nothing() {
    let relay = TestRelay::start().await;
    let mut alice = relay.client().await;
    let mut carol = relay.client().await;
    alice.subscribe("folder-a", 1).await;
    carol.subscribe("folder-b", 2).await;

    alice
        .send(ClientMessage::announce(announcement("folder-a", "rev1")))
        .await;

    assert!(alice.next().await.is_some());
    assert_eq!(carol.next().await, None);
}

#[tokio::test]
async fn late_subscriber_gets_the_last_announcement() {
    let relay = TestRelay::start().await;
    let mut alice = relay.client().await;
    alice
        .send(ClientMessage::announce(announcement("folder-a", "rev1")))
        .await;
    alice
        .send(ClientMessage::announce(announcement("folder-a", "rev2")))
        .await;
    alice.send(ClientMessage::ping(1)).await;
    assert_eq!(alice.next().await, Some(ServerMessage::pong(1)));

    let mut bob = relay.client().await;
    let replay = bob.subscribe("folder-a", 2).await;

    assert_eq!(
        replay,
        Some(ServerMessage::announcement(announcement("folder-a", "rev2")))
    );
}

#[tokio::test]
async fn unsubscribed_client_stops_hearing() {
    let relay = TestRelay::start().await;
    let mut alice = relay.client().await;
    let mut bob = relay.client().await;
    alice.subscribe("folder-a", 1).await;
    bob.subscribe("folder-a", 2).await;

    bob.send(ClientMessage::unsubscribe("folder-a")).await;
    bob.send(ClientMessage::ping(3)).await;
    assert_eq!(bob.next().await, Some(ServerMessage::pong(3)));
    alice
        .send(ClientMessage::announce(announcement("folder-a", "rev1")))
        .await;

    assert!(alice.next().await.is_some());
    assert_eq!(bob.next().await, None);
}

#[tokio::test]
async fn malformed_message_gets_an_error_and_keeps_the_connection() {
    let relay = TestRelay::start().await;
    let mut client = relay.client().await;

    client.send_raw("{\"type\":\"shout\"}").await;
    assert!(matches!(
        client.next().await,
        Some(ServerMessage::Error { .. })
    ));

    client.send(ClientMessage::ping(7)).await;
    assert_eq!(client.next().await, Some(ServerMessage::pong(7)));
}

#[tokio::test]
async fn closed_connection_drops_its_subscriptions() {
    let relay = TestRelay::start().await;
    let mut alice = relay.client().await;
    alice.subscribe("folder-a", 1).await;
    assert_eq!(relay.state.subscriber_count("folder-a").await, 1);

    alice.sink.send(Message::Close(None)).await.unwrap();
    drop(alice);

    for _ in 0..50 {
        if relay.state.subscriber_count("folder-a").await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("subscription outlived its connection");
}

#[tokio::test]
async fn state_counts_deliveries() {
    let state = RelayState::new();
    let (alice, mut alice_rx) = state.connect().await;
    let (bob, _bob_rx) = state.connect().await;
    assert_eq!(state.subscribe(alice, "folder-a").await, None);
    state.subscribe(bob, "folder-a").await;

    assert_eq!(state.announce(announcement("folder-a", "rev1")).await, 2);
    assert_eq!(
        alice_rx.recv().await,
        Some(ServerMessage::announcement(announcement("folder-a", "rev1")))
    );

    state.disconnect(bob).await;
    assert_eq!(state.announce(announcement("folder-a", "rev2")).await, 1);
    assert_eq!(state.announce(announcement("nobody", "rev1")).await, 0);
    assert_eq!(
        state.subscribe(bob, "nobody").await,
        Some(announcement("nobody", "rev1"))
    );
}
