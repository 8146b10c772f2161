// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Each connection gets a queue in [`RelayState`]; the connection task
//! drains it while reading client messages.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use drift_core::protocol::{ClientMessage, ServerMessage};

use crate::state::{ClientId, RelayState};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: RelayState) -> Result<(), BoxError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);
    accept_loop(listener, state).await
}

pub(crate) async fn accept_loop(listener: TcpListener, state: RelayState) -> Result<(), BoxError> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: RelayState,
) -> Result<(), BoxError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!("New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();
    let (client, mut outbox) = state.connect().await;

    let result: Result<(), BoxError> = async {
        loop {
            tokio::select! {
                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let response = match handle_client_message(&text, client, &state).await {
                                Ok(response) => response,
                                Err(e) => Some(ServerMessage::error(e.to_string())),
                            };
                            if let Some(response) = response {
                                ws_sink.send(Message::Text(response.to_json()?.into())).await?;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!("Client {} disconnected", peer_addr);
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            ws_sink.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("WebSocket error from {}: {}", peer_addr, e);
                            break;
                        }
                        None => break,
                    }
                }

                queued = outbox.recv() => {
                    let Some(msg) = queued else { break };
                    if let Err(e) = ws_sink.send(Message::Text(msg.to_json()?.into())).await {
                        warn!("Failed to forward to {}: {}", peer_addr, e);
                        break;
                    }
                }
            }
        }
        Ok(())
    }
    .await;

    state.disconnect(client).await;
    info!("Connection closed: {}", peer_addr);
    result
}

/// Process a client message and return an optional direct response.
async fn handle_client_message(
    text: &str,
    client: ClientId,
    state: &RelayState,
) -> Result<Option<ServerMessage>, BoxError> {
    let msg = ClientMessage::from_json(text)?;
    debug!("Received from {}: {:?}", client, msg);

    match msg {
        ClientMessage::Subscribe { channel } => {
            let replay = state.subscribe(client, &channel).await;
            debug!(
                "{} subscribed to {} ({} subscriber(s))",
                client,
                channel,
                state.subscriber_count(&channel).await
            );
            Ok(replay.map(ServerMessage::announcement))
        }
        ClientMessage::Unsubscribe { channel } => {
            state.unsubscribe(client, &channel).await;
            Ok(None)
        }
        ClientMessage::Announce { announcement } => {
            let channel = announcement.folder_identifier.clone();
            let delivered = state.announce(announcement).await;
            debug!("Announcement on {} reached {} client(s)", channel, delivered);
            Ok(None)
        }
        ClientMessage::Ping { id } => Ok(Some(ServerMessage::pong(id))),
    }
}
