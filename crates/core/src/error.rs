// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for drift-core operations.

use thiserror::Error;

/// All possible errors that can occur in drift-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid sync status: '{0}'\n  hint: valid statuses are: idle, paused, sync_up, sync_down, error")]
    InvalidSyncStatus(String),

    #[error("invalid error status: '{0}'")]
    InvalidErrorStatus(String),

    #[error("invalid storage type: '{0}'\n  hint: valid types are: plain, large_files, encrypted")]
    InvalidStorageType(String),

    #[error("invalid change type: '{0}'\n  hint: valid types are: added, edited, deleted, moved")]
    InvalidChangeType(String),

    #[error("invalid identifier: '{0}'\n  hint: identifiers are non-empty and contain no whitespace")]
    InvalidIdentifier(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for drift-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
