// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sleep/wake event broker.
//!
//! The broker sits between one [`PowerMonitor`] and any number of
//! subscribers. It starts the monitor lazily when the first subscriber
//! appears, fans every observed transition out to all live subscribers,
//! and stops the monitor again once the last subscriber cancels. One such
//! start-to-stop run is a *generation*; [`SleepBroker::await_idle`] blocks
//! until every generation has fully wound down.
//!
//! # Examples
//!
//! ```no_run
//! use sleepwatch::{NoopMonitor, SleepBroker};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let broker = SleepBroker::new(NoopMonitor);
//!
//! let token = CancellationToken::new();
//! let mut subscription = broker.subscribe(token.clone()).await;
//!
//! tokio::spawn(async move {
//!     while let Some(activity) = subscription.recv().await {
//!         println!("host is now {activity}");
//!     }
//! });
//!
//! // Later: end this subscription and wait for the monitor to be released.
//! token.cancel();
//! broker.await_idle().await;
//! # }
//! ```

mod dispatch;
mod generation;
mod tracker;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::monitor::sink::Notification;
use crate::monitor::{EventSink, PowerMonitor};
use crate::subscription::{Subscription, SubscriptionId, spawn_cancel_watcher};

use dispatch::{ControlLoop, Register};
use generation::GenerationId;
use tracker::GenerationTracker;

/// Capacity of a generation's internal event pipe.
const PIPE_CAPACITY: usize = 16;

/// Capacity of a generation's registration and unsubscribe channels.
const REQUEST_CAPACITY: usize = 16;

/// Configuration for a [`SleepBroker`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use sleepwatch::BrokerConfig;
///
/// let config = BrokerConfig::new()
///     .slow_subscriber_timeout(Duration::from_secs(1))
///     .subscriber_capacity(8);
/// ```
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    slow_subscriber_timeout: Duration,
    subscriber_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            slow_subscriber_timeout: Duration::from_secs(5),
            subscriber_capacity: 1,
        }
    }
}

impl BrokerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long fan-out waits on one subscriber before skipping it
    /// for the current event (default: 5 seconds).
    #[must_use]
    pub fn slow_subscriber_timeout(mut self, timeout: Duration) -> Self {
        self.slow_subscriber_timeout = timeout;
        self
    }

    /// Sets how many undelivered events a subscription buffers before its
    /// subscriber counts as slow (default: 1, clamped to a minimum of 1).
    #[must_use]
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity.max(1);
        self
    }
}

/// Channels a live generation accepts requests on.
struct GenerationHandle {
    id: GenerationId,
    new_tx: mpsc::Sender<Register>,
    unsub_tx: mpsc::Sender<SubscriptionId>,
    token: CancellationToken,
}

/// Multi-subscriber broker for host sleep/wake transitions.
///
/// Construct one with a [`PowerMonitor`] implementation and share it by
/// cloning; clones are handles to the same broker. The monitor is not
/// started until the first call to [`subscribe`](Self::subscribe).
///
/// Orderly shutdown is driven by the subscribers: cancel every
/// subscription token, then call [`await_idle`](Self::await_idle). As a
/// backstop, dropping the last broker handle cancels a still-running
/// generation so the monitor is not left registered.
#[derive(Clone)]
pub struct SleepBroker {
    inner: Arc<SleepBrokerInner>,
}

struct SleepBrokerInner {
    monitor: Arc<dyn PowerMonitor>,
    config: BrokerConfig,
    next_subscription: AtomicU64,
    next_generation: AtomicU64,
    /// The generation new subscribers join, if one is live. Guarded by the
    /// only lock in the crate; everything else is message passing.
    current: Mutex<Option<GenerationHandle>>,
    tracker: GenerationTracker,
}

impl SleepBroker {
    /// Creates a broker with default configuration.
    #[must_use]
    pub fn new(monitor: impl PowerMonitor) -> Self {
        Self::with_config(monitor, BrokerConfig::default())
    }

    /// Creates a broker with the given configuration.
    #[must_use]
    pub fn with_config(monitor: impl PowerMonitor, config: BrokerConfig) -> Self {
        Self {
            inner: Arc::new(SleepBrokerInner {
                monitor: Arc::new(monitor),
                config,
                next_subscription: AtomicU64::new(1),
                next_generation: AtomicU64::new(1),
                current: Mutex::new(None),
                tracker: GenerationTracker::new(),
            }),
        }
    }

    /// Subscribes to sleep/wake transitions.
    ///
    /// If no generation is live, this starts one (and with it the
    /// monitor). The subscription lasts until `token` is cancelled: the
    /// stream then closes, and once no subscriber is left the monitor is
    /// stopped. Events the subscriber has not drained within the
    /// configured slow-subscriber timeout are skipped for it, never
    /// queued up by the broker.
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
    /// while let Some(activity) = subscription.recv().await {
    ///     println!("{activity}");
    /// }
    /// # }
    /// ```
    pub async fn subscribe(&self, token: CancellationToken) -> Subscription {
        let id = SubscriptionId::new(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.inner.config.subscriber_capacity);

        let (new_tx, unsub_tx) = self.inner.ensure_generation();

        if new_tx.send(Register { id, tx }).await.is_err() {
            // The generation stopped between handing out its channels and
            // this send; the dropped request closes the stream right away.
            tracing::debug!(subscription = %id, "Subscription landed in a stopped generation");
        }

        spawn_cancel_watcher(token, unsub_tx, id);

        Subscription::new(id, rx)
    }

    /// Waits until every generation ever started has fully stopped.
    ///
    /// Returns immediately if none is active. This is the barrier a host
    /// uses before exiting, so monitor resources are released; it cannot
    /// fail and may be called any number of times.
    pub async fn await_idle(&self) {
        self.inner.tracker.idle().await;
    }
}

impl Default for SleepBroker {
    /// Creates a broker backed by [`monitor::platform_default`](crate::monitor::platform_default).
    fn default() -> Self {
        Self::new(crate::monitor::platform_default())
    }
}

impl std::fmt::Debug for SleepBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SleepBroker")
            .field("live_generation", &self.inner.current.lock().is_some())
            .field("active_generations", &self.inner.tracker.active())
            .finish()
    }
}

impl SleepBrokerInner {
    /// Returns the request channels of the current generation, spawning a
    /// fresh one first if none is live.
    ///
    /// The lock makes the empty-and-not-starting check and the spawn one
    /// atomic step, so concurrent first subscribers cannot start two
    /// generations.
    fn ensure_generation(
        self: &Arc<Self>,
    ) -> (mpsc::Sender<Register>, mpsc::Sender<SubscriptionId>) {
        let mut current = self.current.lock();
        if let Some(handle) = current.as_ref() {
            return (handle.new_tx.clone(), handle.unsub_tx.clone());
        }

        let handle = self.spawn_generation();
        let channels = (handle.new_tx.clone(), handle.unsub_tx.clone());
        *current = Some(handle);
        channels
    }

    fn spawn_generation(self: &Arc<Self>) -> GenerationHandle {
        let id = GenerationId::new(self.next_generation.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();
        let (new_tx, new_rx) = mpsc::channel(REQUEST_CAPACITY);
        let (unsub_tx, unsub_rx) = mpsc::channel(REQUEST_CAPACITY);
        let (pipe_tx, pipe_rx) = mpsc::channel::<Notification>(PIPE_CAPACITY);
        let pipe_tx = Arc::new(pipe_tx);
        let sink = EventSink::new(&pipe_tx);

        let control = ControlLoop {
            generation: id,
            new_rx,
            unsub_rx,
            pipe_rx,
            subscribers: HashMap::new(),
            token: token.clone(),
            inner: Arc::downgrade(self),
            slow_subscriber_timeout: self.config.slow_subscriber_timeout,
            starting: true,
            guard: self.tracker.enter(),
        };
        tokio::spawn(control.run());
        tokio::spawn(generation::run_generation(
            id,
            Arc::clone(&self.monitor),
            sink,
            token.clone(),
            pipe_tx,
        ));

        GenerationHandle {
            id,
            new_tx,
            unsub_tx,
            token,
        }
    }
}

impl Drop for SleepBrokerInner {
    fn drop(&mut self) {
        if let Some(handle) = self.current.get_mut().take() {
            handle.token.cancel();
        }
    }
}
