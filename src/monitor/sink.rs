// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event sink handed to power monitors.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;

use crate::activity::Activity;

/// A notification travelling over a generation's internal event pipe.
///
/// `Listening` is the readiness marker a monitor emits once after a
/// successful start; the broker consumes it and never forwards it to
/// subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Notification {
    /// The monitor is registered and delivering events.
    Listening,
    /// A genuine power-state transition.
    Activity(Activity),
}

/// Write half of a generation's event pipe, handed to a
/// [`PowerMonitor`](crate::PowerMonitor) when it is started.
///
/// The sink is the only way a monitor reports back to the broker: call
/// [`listening`](Self::listening) exactly once after registration succeeds,
/// then [`notify`](Self::notify) for every observed transition until the
/// monitor is stopped.
///
/// A sink is valid for one generation. It holds the pipe weakly, so a sink
/// retained past the end of its generation becomes inert: sends are
/// silently discarded and can never reach a later generation. Cloning is
/// cheap; clones feed the same pipe.
#[derive(Debug, Clone)]
pub struct EventSink {
    pipe: Weak<mpsc::Sender<Notification>>,
}

impl EventSink {
    /// Creates a sink feeding the given pipe sender.
    pub(crate) fn new(pipe: &Arc<mpsc::Sender<Notification>>) -> Self {
        Self {
            pipe: Arc::downgrade(pipe),
        }
    }

    /// Reports that the monitor is registered and listening.
    ///
    /// Must be delivered exactly once per generation, before any call to
    /// [`notify`](Self::notify). The broker uses it to complete the
    /// Starting transition; it is never visible to subscribers.
    pub async fn listening(&self) {
        self.send(Notification::Listening).await;
    }

    /// Delivers a power-state transition to the broker for fan-out.
    pub async fn notify(&self, activity: Activity) {
        self.send(Notification::Activity(activity)).await;
    }

    /// Returns `true` once the generation this sink fed has ended.
    ///
    /// Monitors driving their own delivery tasks can poll this to notice
    /// that further sends would be discarded.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pipe.strong_count() == 0
    }

    async fn send(&self, notification: Notification) {
        // Sends after the generation closed its pipe are dropped on purpose.
        if let Some(pipe) = self.pipe.upgrade() {
            let _ = pipe.send(notification).await;
        }
    }
}
