// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Progress parsing from tool output.
//!
//! Tools report progress per phase ("Compressing objects", "Writing objects",
//! ...). A [`PhasedProgress`] maps each phase onto a slice of the overall
//! 0-100 range and never reports a value lower than one it already reported.

use std::sync::LazyLock;

use regex::Regex;

// Hard-coded patterns, verified by the tests.
static PERCENT: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"(\d{1,3}(?:\.\d+)?)%") {
    Ok(re) => re,
    Err(_) => unreachable!("static regex pattern"),
});
static SPEED: LazyLock<Regex> =
    LazyLock::new(|| match Regex::new(r"(\d+(?:[.,]\d+)?\s*[KMGT]i?B/s)") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    });

/// Parses the first `NN%` value on a line.
pub fn parse_percentage(line: &str) -> Option<f64> {
    let value: f64 = PERCENT.captures(line)?.get(1)?.as_str().parse().ok()?;
    (0.0..=100.0).contains(&value).then_some(value)
}

/// Parses a transfer speed such as `3.40 MiB/s` or `1.23MB/s`.
pub fn parse_speed(line: &str) -> Option<String> {
    Some(SPEED.captures(line)?.get(1)?.as_str().to_string())
}

/// One phase of a multi-phase operation, covering `start..end` of the whole.
#[derive(Debug, Clone, Copy)]
pub struct Phase {
    pub prefix: &'static str,
    pub start: f64,
    pub end: f64,
}

/// Maps phase-local percentages onto one monotonic overall percentage.
#[derive(Debug, Clone)]
pub struct PhasedProgress {
    phases: &'static [Phase],
    last: f64,
}

impl PhasedProgress {
    pub fn new(phases: &'static [Phase]) -> Self {
        PhasedProgress { phases, last: 0.0 }
    }

    /// Returns the overall percentage for a line, if it advances progress.
    ///
    /// Lines of unknown phases are ignored when phases are configured;
    /// with no phases every percentage maps directly.
    pub fn update(&mut self, line: &str) -> Option<f64> {
        let pct = parse_percentage(line)?;
        let overall = if self.phases.is_empty() {
            pct
        } else {
            let trimmed = line.trim_start_matches("remote: ").trim_start();
            let phase = self.phases.iter().find(|p| trimmed.starts_with(p.prefix))?;
            phase.start + (phase.end - phase.start) * pct / 100.0
        };
        if overall > self.last {
            self.last = overall;
            Some(overall)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
