// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Counting barrier over generations still tearing down.

use tokio::sync::watch;

/// Tracks how many generations have been started and not yet fully
/// stopped. [`idle`](Self::idle) is the barrier behind
/// [`SleepBroker::await_idle`](crate::SleepBroker::await_idle).
#[derive(Debug)]
pub(crate) struct GenerationTracker {
    active: watch::Sender<usize>,
}

impl GenerationTracker {
    pub(crate) fn new() -> Self {
        Self {
            active: watch::Sender::new(0),
        }
    }

    /// Counts a new generation in. The returned guard counts it back out
    /// when dropped, whichever way the generation's control loop ends.
    pub(crate) fn enter(&self) -> GenerationGuard {
        self.active.send_modify(|n| *n += 1);
        GenerationGuard {
            active: self.active.clone(),
        }
    }

    /// Completes once no generation is active.
    ///
    /// Returns immediately if none ever started. Generations started after
    /// completion are seen by a later call.
    pub(crate) async fn idle(&self) {
        let mut rx = self.active.subscribe();
        while *rx.borrow_and_update() != 0 {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Current number of not-yet-stopped generations.
    pub(crate) fn active(&self) -> usize {
        *self.active.borrow()
    }
}

/// Keeps one generation counted as active for as long as it lives.
#[derive(Debug)]
pub(crate) struct GenerationGuard {
    active: watch::Sender<usize>,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn idle_returns_immediately_when_nothing_started() {
        let tracker = GenerationTracker::new();
        tracker.idle().await;
        assert_eq!(tracker.active(), 0);
    }

    #[tokio::test]
    async fn idle_waits_for_the_guard() {
        let tracker = GenerationTracker::new();
        let guard = tracker.enter();
        assert_eq!(tracker.active(), 1);

        let blocked = tokio::time::timeout(Duration::from_millis(20), tracker.idle()).await;
        assert!(blocked.is_err());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), tracker.idle())
            .await
            .expect("idle after last guard dropped");
        assert_eq!(tracker.active(), 0);
    }

    #[tokio::test]
    async fn idle_waits_for_every_guard() {
        let tracker = GenerationTracker::new();
        let first = tracker.enter();
        let second = tracker.enter();

        drop(first);
        let blocked = tokio::time::timeout(Duration::from_millis(20), tracker.idle()).await;
        assert!(blocked.is_err());

        drop(second);
        tokio::time::timeout(Duration::from_secs(1), tracker.idle())
            .await
            .expect("idle after last guard dropped");
    }
}
