// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Ignore rules for editor and OS temporary files.
//!
//! The same glob list is written into each tool's native ignore mechanism
//! (`.git/info/exclude`, rsync `--exclude-from`, unison `-ignore`) and is
//! evaluated directly when scanning a folder.

use std::sync::LazyLock;

use regex::RegexSet;

/// Glob patterns matched against file names.
pub const IGNORE_RULES: &[&str] = &[
    "*~",
    ".*.sw[a-z]",
    "*.swp",
    "*.tmp",
    "*.part",
    "*.crdownload",
    ".~lock.*#",
    "~$*",
    ".#*",
    "*.kate-swp",
    ".goutputstream-*",
    ".DS_Store",
    "._*",
    ".directory",
    "Thumbs.db",
    "Desktop.ini",
];

static RULES: LazyLock<RegexSet> = LazyLock::new(|| {
    match RegexSet::new(IGNORE_RULES.iter().map(|g| glob_to_regex(g))) {
        Ok(set) => set,
        Err(_) => unreachable!("static glob patterns"),
    }
});

/// True when a file name matches one of [`IGNORE_RULES`].
pub fn is_ignored(file_name: &str) -> bool {
    RULES.is_match(file_name)
}

/// Rules as a newline-separated file body.
pub fn rules_file() -> String {
    let mut body = String::from("# Managed by drift\n");
    for rule in IGNORE_RULES {
        body.push_str(rule);
        body.push('\n');
    }
    body
}

/// Translates a file-name glob (`*`, `?`, `[...]`) into an anchored regex.
pub fn glob_to_regex(glob: &str) -> String {
    let mut re = String::from("^");
    let mut in_class = false;
    for c in glob.chars() {
        match c {
            '*' if !in_class => re.push_str("[^/]*"),
            '?' if !in_class => re.push_str("[^/]"),
            '[' if !in_class => {
                in_class = true;
                re.push('[');
            }
            ']' if in_class => {
                in_class = false;
                re.push(']');
            }
            _ if in_class => re.push(c),
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    re
}

#[cfg(test)]
#[path = "ignore_tests.rs"]
mod tests;
