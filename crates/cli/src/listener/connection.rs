// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection state shared between a listener task and its handles.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Where a listener's connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Lock-free view of the connection, readable from any repository.
#[derive(Debug)]
pub struct SharedConnectionState {
    state: AtomicU8,
    /// Failed connection attempts since the last success.
    failures: AtomicU32,
}

impl SharedConnectionState {
    pub fn new() -> Self {
        SharedConnectionState {
            state: AtomicU8::new(ConnectionState::Disconnected.to_u8()),
            failures: AtomicU32::new(0),
        }
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ConnectionState) {
        if state == ConnectionState::Connected {
            self.failures.store(0, Ordering::Release);
        }
        self.state.store(state.to_u8(), Ordering::Release);
    }

    /// Records a failed attempt and marks the connection as down.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::AcqRel);
        self.set(ConnectionState::Disconnected);
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    /// Human-readable state for status output.
    pub fn status_string(&self) -> String {
        match (self.get(), self.failures()) {
            (ConnectionState::Connected, _) => "connected".to_string(),
            (ConnectionState::Connecting, _) => "connecting".to_string(),
            (ConnectionState::Disconnected, 0) => "disconnected".to_string(),
            (ConnectionState::Disconnected, n) => {
                format!("disconnected ({} failed attempts)", n)
            }
        }
    }
}

impl Default for SharedConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
