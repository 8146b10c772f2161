// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Folder identifiers.
//!
//! An [`Identifier`] associates announcements with a folder independently of
//! its revision. It is minted once when a folder is fetched and then read
//! back from the folder's marker file.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

static MINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stable opaque identifier of a synced folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Mints a fresh identifier for a folder being created at `target`.
    ///
    /// Format: lowercase hex SHA-256 of (time, pid, counter, target).
    pub fn generate(target: &Path) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let count = MINT_COUNTER.fetch_add(1, Ordering::Relaxed);
        let input = format!(
            "{}:{}:{}:{}",
            nanos,
            std::process::id(),
            count,
            target.display()
        );
        Identifier(hex::encode(Sha256::digest(input.as_bytes())))
    }

    /// Validates and wraps an existing identifier string.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(Error::InvalidIdentifier(s.to_string()));
        }
        Ok(Identifier(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "identifier_tests.rs"]
mod tests;
