// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal colors for help text and folder status output.
//!
//! `NO_COLOR=1` disables colors, `COLOR=1` forces them without a TTY.

use std::io::IsTerminal;

use drift_core::{ErrorStatus, SyncStatus};

use crate::env;

/// ANSI 256-color palette.
pub mod codes {
    /// Section headers.
    pub const HEADER: u8 = 74;
    /// Commands and folder names.
    pub const LITERAL: u8 = 250;
    /// Placeholders, revisions, timestamps.
    pub const CONTEXT: u8 = 245;
    /// Healthy state.
    pub const GOOD: u8 = 114;
    /// Transfers and paused folders.
    pub const BUSY: u8 = 179;
    /// Failures.
    pub const BAD: u8 = 167;
}

const RESET: &str = "\x1b[0m";

pub fn should_colorize() -> bool {
    if env::no_color() {
        return false;
    }
    if env::force_color() {
        return true;
    }
    std::io::stdout().is_terminal()
}

fn fg256(code: u8) -> String {
    format!("\x1b[38;5;{code}m")
}

/// Wraps `text` in `code` when colors are enabled.
pub fn paint(code: u8, text: &str) -> String {
    if should_colorize() {
        format!("{}{}{}", fg256(code), text, RESET)
    } else {
        text.to_string()
    }
}

pub fn header(text: &str) -> String {
    paint(codes::HEADER, text)
}

pub fn literal(text: &str) -> String {
    paint(codes::LITERAL, text)
}

pub fn context(text: &str) -> String {
    paint(codes::CONTEXT, text)
}

/// Status word colored by health: errors beat transfers beat idle.
pub fn status(status: SyncStatus, error: ErrorStatus) -> String {
    let code = match status {
        SyncStatus::Error => codes::BAD,
        SyncStatus::SyncUp | SyncStatus::SyncDown | SyncStatus::Paused => codes::BUSY,
        SyncStatus::Idle if !error.is_none() => codes::BAD,
        SyncStatus::Idle => codes::GOOD,
    };
    paint(code, status.as_str())
}

/// Colors an examples block used in `after_help`.
///
/// ```text
/// Examples:
///   drift add ssh://host/photos    Fetch a folder
/// ```
///
/// Header lines (ending in `:`) get the header color. Example lines are split
/// at the first run of two spaces into a command and a description.
pub fn examples(text: &str) -> String {
    if !should_colorize() {
        return text.to_string();
    }

    text.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let indent = &line[..line.len() - trimmed.len()];
            if trimmed.ends_with(':') && !trimmed.contains("  ") {
                return format!("{indent}{}", header(trimmed));
            }
            match find_description_start(trimmed) {
                Some(split) => format!(
                    "{indent}{}{}",
                    colorize_command(&trimmed[..split]),
                    &trimmed[split..]
                ),
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Colors a command line word by word. `<placeholders>`, `"quoted text"` and
/// the value following a bare `--flag` use the context color.
pub fn colorize_command(cmd: &str) -> String {
    let mut out = String::with_capacity(cmd.len() + 64);
    let mut after_flag = false;
    let mut rest = cmd;

    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix(' ') {
            out.push(' ');
            rest = stripped;
            continue;
        }
        let (word, tail) = split_word(rest);
        let is_value = word.starts_with('<') || word.starts_with('"') || after_flag;
        if is_value {
            out.push_str(&context(word));
            after_flag = false;
        } else {
            out.push_str(&literal(word));
            after_flag = word.starts_with('-') && !word.contains('=');
        }
        rest = tail;
    }

    out
}

/// Splits off one word, keeping `<...>` and `"..."` groups whole even when
/// they contain spaces. Unclosed groups run to the end.
fn split_word(s: &str) -> (&str, &str) {
    let close = match s.as_bytes().first() {
        Some(b'<') => Some('>'),
        Some(b'"') => Some('"'),
        _ => None,
    };
    let end = match close {
        Some(close) => s[1..].find(close).map(|i| i + 2).unwrap_or(s.len()),
        None => s.find(' ').unwrap_or(s.len()),
    };
    s.split_at(end)
}

/// Byte offset where a run of two or more spaces starts, if any.
pub fn find_description_start(line: &str) -> Option<usize> {
    let start = line.find("  ")?;
    let after = line[start..].trim_start_matches(' ');
    if after.is_empty() {
        None
    } else {
        Some(start)
    }
}

#[cfg(test)]
#[path = "colors_tests.rs"]
mod tests;
