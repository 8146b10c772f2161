// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Repository status types.
//!
//! [`SyncStatus`] is the orchestrator's state, [`ErrorStatus`] is the typed
//! reason for the last failed sync, and [`StorageType`] is the storage mode a
//! folder was fetched with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// State of a repository's sync state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Syncing suppressed by the user.
    Paused,
    /// Sending local changes to the remote.
    SyncUp,
    /// Receiving remote changes.
    SyncDown,
    /// The last sync attempt failed; see [`ErrorStatus`].
    Error,
}

impl SyncStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Paused => "paused",
            SyncStatus::SyncUp => "sync_up",
            SyncStatus::SyncDown => "sync_down",
            SyncStatus::Error => "error",
        }
    }

    /// True while a sync direction is active.
    pub fn is_syncing(&self) -> bool {
        matches!(self, SyncStatus::SyncUp | SyncStatus::SyncDown)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(SyncStatus::Idle),
            "paused" => Ok(SyncStatus::Paused),
            "sync_up" | "syncup" => Ok(SyncStatus::SyncUp),
            "sync_down" | "syncdown" => Ok(SyncStatus::SyncDown),
            "error" => Ok(SyncStatus::Error),
            _ => Err(Error::InvalidSyncStatus(s.to_string())),
        }
    }
}

/// Typed reason for a failed sync.
///
/// Adapters classify tool output into one of these; the orchestrator only
/// ever looks at this value, never at the output itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStatus {
    #[default]
    None,
    HostUnreachable,
    HostIdentityChanged,
    AuthenticationFailed,
    DiskSpaceExceeded,
    UnreadableFiles,
    NotFound,
    IncompatibleClientServer,
    Unknown,
}

impl ErrorStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStatus::None => "none",
            ErrorStatus::HostUnreachable => "host_unreachable",
            ErrorStatus::HostIdentityChanged => "host_identity_changed",
            ErrorStatus::AuthenticationFailed => "authentication_failed",
            ErrorStatus::DiskSpaceExceeded => "disk_space_exceeded",
            ErrorStatus::UnreadableFiles => "unreadable_files",
            ErrorStatus::NotFound => "not_found",
            ErrorStatus::IncompatibleClientServer => "incompatible_client_server",
            ErrorStatus::Unknown => "unknown",
        }
    }

    pub fn is_none(&self) -> bool {
        *self == ErrorStatus::None
    }

    /// One-line explanation suitable for a status display.
    pub fn describe(&self) -> &'static str {
        match self {
            ErrorStatus::None => "no error",
            ErrorStatus::HostUnreachable => "the host could not be reached",
            ErrorStatus::HostIdentityChanged => "the host's identity has changed",
            ErrorStatus::AuthenticationFailed => "authentication with the host failed",
            ErrorStatus::DiskSpaceExceeded => "the host or local disk is out of space",
            ErrorStatus::UnreadableFiles => "some local files could not be read",
            ErrorStatus::NotFound => "the remote project could not be found",
            ErrorStatus::IncompatibleClientServer => {
                "the local and remote tool versions are incompatible"
            }
            ErrorStatus::Unknown => "an unknown error occurred",
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ErrorStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(ErrorStatus::None),
            "host_unreachable" => Ok(ErrorStatus::HostUnreachable),
            "host_identity_changed" => Ok(ErrorStatus::HostIdentityChanged),
            "authentication_failed" => Ok(ErrorStatus::AuthenticationFailed),
            "disk_space_exceeded" => Ok(ErrorStatus::DiskSpaceExceeded),
            "unreadable_files" => Ok(ErrorStatus::UnreadableFiles),
            "not_found" => Ok(ErrorStatus::NotFound),
            "incompatible_client_server" => Ok(ErrorStatus::IncompatibleClientServer),
            "unknown" => Ok(ErrorStatus::Unknown),
            _ => Err(Error::InvalidErrorStatus(s.to_string())),
        }
    }
}

/// Storage mode of a fetched folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    #[default]
    Plain,
    /// Large files are stored outside the history (LFS-style).
    LargeFiles,
    /// Content is encrypted by the adapter before leaving the machine.
    Encrypted,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Plain => "plain",
            StorageType::LargeFiles => "large_files",
            StorageType::Encrypted => "encrypted",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "plain" => Ok(StorageType::Plain),
            "large_files" | "lfs" => Ok(StorageType::LargeFiles),
            "encrypted" => Ok(StorageType::Encrypted),
            _ => Err(Error::InvalidStorageType(s.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
