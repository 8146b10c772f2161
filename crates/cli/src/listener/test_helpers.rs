// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory transport for listener tests.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drift_core::protocol::{ClientMessage, ServerMessage};
use tokio::sync::{broadcast, mpsc};

use super::transport::{Transport, TransportError, TransportFuture};
use super::ListenerEvent;

/// Transport whose server side is a [`MockServer`].
pub struct MockTransport {
    connected: bool,
    inbox: mpsc::UnboundedReceiver<Option<ServerMessage>>,
    sent: Arc<Mutex<Vec<ClientMessage>>>,
    refuse: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
}

/// Test-side controls for a [`MockTransport`].
#[derive(Clone)]
pub struct MockServer {
    inbox: mpsc::UnboundedSender<Option<ServerMessage>>,
    sent: Arc<Mutex<Vec<ClientMessage>>>,
    refuse: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
}

pub fn mock_transport() -> (MockTransport, MockServer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let refuse = Arc::new(AtomicBool::new(false));
    let connects = Arc::new(AtomicUsize::new(0));
    let transport = MockTransport {
        connected: false,
        inbox: rx,
        sent: Arc::clone(&sent),
        refuse: Arc::clone(&refuse),
        connects: Arc::clone(&connects),
    };
    let server = MockServer {
        inbox: tx,
        sent,
        refuse,
        connects,
    };
    (transport, server)
}

impl MockServer {
    /// Delivers `msg` to the client.
    pub fn push(&self, msg: ServerMessage) {
        self.inbox.send(Some(msg)).unwrap();
    }

    /// Closes the client's connection.
    pub fn close(&self) {
        self.inbox.send(None).unwrap();
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Waits until a sent message satisfies `pred`.
    pub async fn wait_sent(&self, pred: impl Fn(&ClientMessage) -> bool) {
        for _ in 0..500 {
            if self.sent().iter().any(&pred) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected message was never sent: {:?}", self.sent());
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, _url: &str) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Err(TransportError::ConnectionFailed("refused".into()));
            }
            self.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.connected = false;
            Ok(())
        })
    }

    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            self.sent.lock().unwrap().push(msg);
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>> {
        Box::pin(async move {
            match self.inbox.recv().await {
                Some(Some(msg)) => Ok(Some(msg)),
                Some(None) => {
                    self.connected = false;
                    Ok(None)
                }
                None => std::future::pending().await,
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Next listener event, failing the test after five seconds.
pub async fn next_event(rx: &mut broadcast::Receiver<ListenerEvent>) -> ListenerEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap()
}
