// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages between listeners and the relay server.
//!
//! The protocol is simple:
//! - Clients subscribe to channels (one per folder identifier) and announce
//!   new revisions
//! - The server forwards each announcement to every subscriber of its channel

use serde::{Deserialize, Serialize};

/// Push hint that a folder has a new revision.
///
/// Never authoritative on its own: receivers still ask their adapter whether
/// there is anything to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Announcement {
    /// Identifier of the folder, also the channel name.
    pub folder_identifier: String,
    /// The announced revision.
    pub message: String,
}

impl Announcement {
    pub fn new(folder_identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Announcement {
            folder_identifier: folder_identifier.into(),
            message: message.into(),
        }
    }
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving announcements for a channel.
    Subscribe {
        channel: String,
    },

    /// Stop receiving announcements for a channel.
    Unsubscribe {
        channel: String,
    },

    /// Publish an announcement to its channel.
    Announce {
        announcement: Announcement,
    },

    /// Ping message for keepalive.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// An announcement on a subscribed channel.
    Announcement {
        announcement: Announcement,
    },

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },

    /// Error message.
    Error {
        /// Human-readable error description.
        message: String,
    },
}

impl ClientMessage {
    /// Creates a Subscribe message.
    pub fn subscribe(channel: impl Into<String>) -> Self {
        ClientMessage::Subscribe {
            channel: channel.into(),
        }
    }

    /// Creates an Unsubscribe message.
    pub fn unsubscribe(channel: impl Into<String>) -> Self {
        ClientMessage::Unsubscribe {
            channel: channel.into(),
        }
    }

    /// Creates an Announce message.
    pub fn announce(announcement: Announcement) -> Self {
        ClientMessage::Announce { announcement }
    }

    /// Creates a Ping message.
    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates an Announcement message.
    pub fn announcement(announcement: Announcement) -> Self {
        ServerMessage::Announcement { announcement }
    }

    /// Creates a Pong message.
    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    /// Creates an Error message.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
