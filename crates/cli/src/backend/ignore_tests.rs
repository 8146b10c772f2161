// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    backup = { "notes.txt~" },
    vim_swap = { ".notes.txt.swp" },
    vim_swo = { ".notes.txt.swo" },
    lock = { ".~lock.report.odt#" },
    office = { "~$report.docx" },
    emacs = { ".#notes.txt" },
    mac = { ".DS_Store" },
    resource_fork = { "._photo.jpg" },
    partial = { "movie.mkv.part" },
    thumbs = { "Thumbs.db" },
)]
fn temporary_files_are_ignored(name: &str) {
    assert!(is_ignored(name), "{name} should be ignored");
}

#[parameterized(
    text = { "notes.txt" },
    hidden = { ".bashrc" },
    tilde_inside = { "a~b.txt" },
    marker = { ".drift_id" },
)]
fn regular_files_are_kept(name: &str) {
    assert!(!is_ignored(name), "{name} should be kept");
}

#[test]
fn glob_translation_escapes_literals() {
    assert_eq!(glob_to_regex("*.tmp"), r"^[^/]*\.tmp$");
    assert_eq!(glob_to_regex(".*.sw[a-z]"), r"^\.[^/]*\.sw[a-z]$");
}

#[test]
fn rules_file_lists_every_rule() {
    let body = rules_file();
    for rule in IGNORE_RULES {
        assert!(body.lines().any(|l| l == *rule));
    }
}
