// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Classification of tool output into [`ErrorStatus`].
//!
//! The first line that matches a known failure wins; output that matches
//! nothing classifies as [`ErrorStatus::Unknown`].

use drift_core::ErrorStatus;

const HOST_IDENTITY_CHANGED: &[&str] = &[
    "WARNING: REMOTE HOST IDENTIFICATION HAS CHANGED!",
    "POSSIBLE DNS SPOOFING DETECTED!",
];

const AUTHENTICATION_PREFIXES: &[&str] = &[
    "Permission denied",
    "ssh_exchange_identification: Connection closed by remote host",
    "The authenticity of host",
];

const HOST_UNREACHABLE: &[&str] = &[
    "Could not resolve hostname",
    "Connection refused",
    "Network is unreachable",
    "Connection timed out",
    "No route to host",
];

const DISK_SPACE: &[&str] = &[
    "error: Disk space exceeded",
    "No space left on device",
    "Disk quota exceeded",
];

const UNREADABLE: &[&str] = &["error: cannot stat", "error: open(", "Permission denied"];

/// Classifies a single line, or `None` when it carries no known failure.
pub fn classify_line(line: &str) -> Option<ErrorStatus> {
    let line = line.trim();
    let lower = line.to_lowercase();

    if HOST_IDENTITY_CHANGED.iter().any(|m| line.contains(m)) {
        return Some(ErrorStatus::HostIdentityChanged);
    }
    if AUTHENTICATION_PREFIXES.iter().any(|m| line.starts_with(m)) {
        return Some(ErrorStatus::AuthenticationFailed);
    }
    if line.ends_with("does not appear to be a git repository")
        || lower.contains("repository not found")
        || (line.contains("No such file or directory") && line.contains("change_dir"))
    {
        return Some(ErrorStatus::NotFound);
    }
    if line.ends_with("expected old/new/ref, got 'shallow") {
        return Some(ErrorStatus::IncompatibleClientServer);
    }
    if HOST_UNREACHABLE.iter().any(|m| line.contains(m)) {
        return Some(ErrorStatus::HostUnreachable);
    }
    if DISK_SPACE.iter().any(|m| line.contains(m)) {
        return Some(ErrorStatus::DiskSpaceExceeded);
    }
    None
}

/// Classifies tool output; [`ErrorStatus::Unknown`] when nothing matches.
pub fn classify<'a>(lines: impl IntoIterator<Item = &'a str>) -> ErrorStatus {
    lines
        .into_iter()
        .find_map(classify_line)
        .unwrap_or(ErrorStatus::Unknown)
}

/// Classifies output of a staging step.
///
/// Unreadable local files take precedence over everything else: they abort
/// the sync without falling back to a sync down.
pub fn classify_staging<'a>(lines: impl IntoIterator<Item = &'a str> + Clone) -> ErrorStatus {
    let unreadable = lines
        .clone()
        .into_iter()
        .any(|l| UNREADABLE.iter().any(|m| l.contains(m)));
    if unreadable {
        ErrorStatus::UnreadableFiles
    } else {
        classify(lines)
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
