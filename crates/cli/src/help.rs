// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level help text.

use crate::colors;
use clap::builder::styling::Styles;

/// Clap styles using the shared palette.
pub fn styles() -> Styles {
    if !colors::should_colorize() {
        return Styles::plain();
    }

    use anstyle::{Ansi256Color, Color, Style};

    let fg = |code: u8| Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(code))));

    Styles::styled()
        .header(fg(colors::codes::HEADER))
        .usage(fg(colors::codes::HEADER))
        .literal(fg(colors::codes::LITERAL))
        .placeholder(fg(colors::codes::CONTEXT))
        .valid(fg(colors::codes::CONTEXT))
}

/// Main help template; the command list goes in `before_help`.
pub fn template() -> String {
    format!(
        "{{about-with-newline}}
{{usage-heading}} {{usage}}

{{before-help}}{}
{{options}}{{after-help}}",
        colors::header("Options:")
    )
}

/// Commands grouped by purpose.
pub fn commands() -> String {
    // Padding is computed on the bare name so escapes do not shift columns.
    let row = |name: &str, about: &str| {
        let pad = " ".repeat(12usize.saturating_sub(name.len()));
        format!("  {}{}{}", colors::literal(name), pad, about)
    };

    [
        colors::header("Folders:"),
        row("add", "Fetch a remote folder and start tracking it"),
        row("list", "List configured folders"),
        row("status", "Show sync status of a folder"),
        row("log", "Show recent changes"),
        row("restore", "Write an old version of a file"),
        row("remove", "Stop tracking a folder"),
        String::new(),
        colors::header("Syncing:"),
        row("run", "Watch and sync every folder until interrupted"),
        row("pause", "Suspend syncing for a folder"),
        row("resume", "Resume syncing for a folder"),
        row("retry", "Send pending changes now"),
        String::new(),
        colors::header("Setup:"),
        row("completion", "Generate shell completions"),
    ]
    .join("\n")
}

/// Quickstart shown after the options in main help.
pub fn quickstart() -> String {
    colors::examples(
        "\
Get started:
  drift add ssh://host/srv/photos    Fetch a folder into ~/Drift/photos
  drift run                          Keep every folder in sync
  drift status photos                See what a folder is doing
  drift log photos                   See who changed what",
    )
}

#[cfg(test)]
#[path = "help_tests.rs"]
mod tests;
