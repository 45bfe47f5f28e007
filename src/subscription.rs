// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscriber-facing stream handles.
//!
//! A [`Subscription`] is the read half of a per-subscriber channel owned by
//! the broker's control loop. It is created by
//! [`SleepBroker::subscribe`](crate::SleepBroker::subscribe) together with a
//! background watcher that converts the caller's cancellation token into an
//! unsubscribe request.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::activity::Activity;

/// Unique identifier for a subscription.
///
/// Assigned by the broker when the subscription is created; unique for the
/// broker's lifetime. Mostly useful to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a new subscription ID with the given value.
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// A read-only stream of [`Activity`] events for one subscriber.
///
/// Obtained from [`SleepBroker::subscribe`](crate::SleepBroker::subscribe).
/// Each subscription has its own stream; there is no sharing and no replay.
/// The stream closes exactly once: after the subscription's cancellation
/// token fires and the broker processes the unsubscribe, or when the
/// generation it belongs to ends.
///
/// # Examples
///
/// ```no_run
/// use sleepwatch::{NoopMonitor, SleepBroker};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let broker = SleepBroker::new(NoopMonitor);
/// let mut subscription = broker.subscribe(CancellationToken::new()).await;
///
/// while let Some(activity) = subscription.recv().await {
///     println!("host is now {activity}");
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<Activity>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, rx: mpsc::Receiver<Activity>) -> Self {
        Self { id, rx }
    }

    /// Returns this subscription's identifier.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receives the next power-state transition.
    ///
    /// Returns `None` once the stream is closed. Events already delivered
    /// before the close are still drained first.
    pub async fn recv(&mut self) -> Option<Activity> {
        self.rx.recv().await
    }
}

/// Spawns the watcher bridging a caller's cancellation token to the
/// control loop.
///
/// Fires exactly one unsubscribe request when `token` is cancelled. If the
/// generation's loop is gone before that, the watcher exits instead of
/// parking forever; the loop has closed the stream on its way out.
pub(crate) fn spawn_cancel_watcher(
    token: CancellationToken,
    unsub_tx: mpsc::Sender<SubscriptionId>,
    id: SubscriptionId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {
                if unsub_tx.send(id).await.is_err() {
                    tracing::debug!(subscription = %id, "Unsubscribe skipped, generation already stopped");
                }
            }
            () = unsub_tx.closed() => {}
        }
    })
}
