// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use drift_core::{Change, ChangeSet, ChangeType};

use crate::colors;
use crate::config::FolderConfig;
use crate::fetcher::redact_credentials;

/// Revisions are shown with this many characters.
const REVISION_WIDTH: usize = 10;

/// Shortens a revision for display; short ones are kept whole.
pub fn short_revision(revision: &str) -> &str {
    match revision.char_indices().nth(REVISION_WIDTH) {
        Some((end, _)) => &revision[..end],
        None => revision,
    }
}

/// Human-readable byte count using binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// One change, prefixed like commit messages: `+` added, `/` edited,
/// `-` deleted, `>` moved.
pub fn format_change(change: &Change) -> String {
    let suffix = if change.is_folder { "/" } else { "" };
    match (change.change_type, &change.moved_to_path) {
        (ChangeType::Moved, Some(to)) => {
            format!("> {}{} -> {}{}", change.path, suffix, to, suffix)
        }
        (change_type, _) => {
            let sign = match change_type {
                ChangeType::Added => '+',
                ChangeType::Edited => '/',
                ChangeType::Deleted => '-',
                ChangeType::Moved => '>',
            };
            format!("{} {}{}", sign, change.path, suffix)
        }
    }
}

/// Header line plus one indented line per change.
///
/// Merged entries show the span of times they cover.
pub fn format_change_set(change_set: &ChangeSet) -> Vec<String> {
    let end = change_set.timestamp.format("%H:%M");
    let when = match change_set.first_timestamp {
        Some(first) if first.format("%H:%M").to_string() != end.to_string() => format!(
            "{} {}-{}",
            change_set.timestamp.format("%Y-%m-%d"),
            first.format("%H:%M"),
            end
        ),
        _ => change_set.timestamp.format("%Y-%m-%d %H:%M").to_string(),
    };

    let mut lines = vec![format!(
        "{}  {}  {}",
        colors::context(short_revision(&change_set.revision)),
        colors::context(&when),
        colors::literal(&change_set.user.name)
    )];
    if change_set.changes.is_empty() {
        lines.push("    (no file changes)".to_string());
    }
    lines.extend(
        change_set
            .changes
            .iter()
            .map(|c| format!("    {}", format_change(c))),
    );
    lines
}

/// `name  state  path  address` row for `drift list`.
pub fn format_folder_line(folder: &FolderConfig) -> String {
    let state = if folder.paused {
        colors::paint(colors::codes::BUSY, "paused")
    } else {
        colors::paint(colors::codes::GOOD, "active")
    };
    format!(
        "{}  {}  {}  {}",
        colors::literal(&folder.name),
        state,
        folder.path.display(),
        colors::context(&format!(
            "{} ({})",
            redact_credentials(&folder.url),
            folder.backend
        ))
    )
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
