// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! drift-core: Shared library for the drift folder-sync engine
//!
//! This crate provides the data model shared by the `drift` CLI and the
//! `drift-relay` announcement server: change sets and their grouping rule,
//! repository status types, folder identifiers, the listener wire protocol,
//! and local user detection.

pub mod changeset;
pub mod error;
pub mod identifier;
pub mod identity;
pub mod protocol;
pub mod status;

pub use changeset::{group_change_sets, Change, ChangeSet, ChangeType, User};
pub use error::{Error, Result};
pub use identifier::Identifier;
pub use protocol::Announcement;
pub use status::{ErrorStatus, StorageType, SyncStatus};
