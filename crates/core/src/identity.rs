// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local user detection.
//!
//! The local user authors commits made by adapters and is compared against
//! change set authors to decide whether a change came from someone else.

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;

use std::process::Command;

use crate::changeset::User;

/// Returns the local user from git configuration and the environment.
pub fn local_user() -> User {
    User::new(get_user_name(), get_user_email())
}

/// Returns the current user's display name.
///
/// Resolution order:
/// 1. Git config user.name
/// 2. Unix username from USER or LOGNAME env var (if not system account)
/// 3. Fallback to "Unknown"
pub fn get_user_name() -> String {
    if let Some(name) = git_config("user.name") {
        return name;
    }

    if let Some(name) = get_unix_username() {
        if !is_system_account(&name) {
            return name;
        }
    }

    "Unknown".to_string()
}

/// Returns the current user's email from git config, or an empty string.
pub fn get_user_email() -> String {
    git_config("user.email").unwrap_or_default()
}

fn git_config(key: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["config", "--get", key])
        .output()
        .ok()?;

    if output.status.success() {
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}

fn get_unix_username() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .ok()
        .filter(|s| !s.is_empty())
}

fn is_system_account(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "root" | "system" | "administrator" | "admin" | "daemon" | "nobody"
    )
}
