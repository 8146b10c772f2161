// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Settle detection for bursts of local edits.
//!
//! A folder counts as settled once a fixed number of consecutive size
//! samples are equal, so a sync never starts while a large file is still
//! being written.

use std::collections::VecDeque;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Sliding window over the most recent size samples.
#[derive(Debug, Clone)]
pub struct SettleDetector {
    window: usize,
    samples: VecDeque<u64>,
}

impl SettleDetector {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        SettleDetector {
            window,
            samples: VecDeque::with_capacity(window),
        }
    }

    /// Records a sample and returns whether the window is now settled.
    pub fn push(&mut self, sample: u64) -> bool {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.is_settled()
    }

    pub fn is_settled(&self) -> bool {
        self.samples.len() == self.window
            && self.samples.iter().all(|s| Some(s) == self.samples.front())
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

/// Samples every `interval` until `window` consecutive samples agree.
///
/// Returns `false` when `cancel` fires first.
pub async fn wait_until_settled<F>(
    interval: Duration,
    window: usize,
    cancel: &CancellationToken,
    mut sample: F,
) -> bool
where
    F: FnMut() -> u64,
{
    let mut detector = SettleDetector::new(window);
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        if detector.push(sample()) {
            return true;
        }
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
#[path = "settle_tests.rs"]
mod tests;
