// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-generation control loop.
//!
//! One loop task owns the subscriber set for one generation. Every
//! subscribe, unsubscribe, and event dispatch goes through it, which makes
//! those operations totally ordered without any locking around the set.
//! The loop ends when the generation's event pipe closes, and on its way
//! out closes every stream still registered with it.

use std::collections::HashMap;
use std::sync::Weak;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::activity::Activity;
use crate::monitor::sink::Notification;
use crate::subscription::SubscriptionId;

use super::generation::GenerationId;
use super::tracker::GenerationGuard;
use super::SleepBrokerInner;

/// Request to add one subscriber to the loop's set.
pub(super) struct Register {
    pub(super) id: SubscriptionId,
    pub(super) tx: mpsc::Sender<Activity>,
}

/// State owned by one generation's loop task.
pub(super) struct ControlLoop {
    pub(super) generation: GenerationId,
    pub(super) new_rx: mpsc::Receiver<Register>,
    pub(super) unsub_rx: mpsc::Receiver<SubscriptionId>,
    pub(super) pipe_rx: mpsc::Receiver<Notification>,
    pub(super) subscribers: HashMap<SubscriptionId, mpsc::Sender<Activity>>,
    pub(super) token: CancellationToken,
    pub(super) inner: Weak<SleepBrokerInner>,
    pub(super) slow_subscriber_timeout: Duration,
    pub(super) starting: bool,
    pub(super) guard: GenerationGuard,
}

impl ControlLoop {
    /// Runs until the event pipe closes.
    ///
    /// Registration and unsubscribe arms are polled before the pipe, so a
    /// subscriber whose registration was handed over is in the set before
    /// any still-queued event is dispatched.
    pub(super) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                Some(register) = self.new_rx.recv() => self.register(register),
                Some(id) = self.unsub_rx.recv() => self.unsubscribe(id),
                notification = self.pipe_rx.recv() => match notification {
                    Some(Notification::Listening) => self.mark_listening(),
                    Some(Notification::Activity(activity)) => self.fan_out(activity).await,
                    None => {
                        self.finish();
                        return;
                    }
                },
            }
        }
    }

    fn register(&mut self, register: Register) {
        self.subscribers.insert(register.id, register.tx);
        tracing::debug!(
            generation = %self.generation,
            subscription = %register.id,
            subscribers = self.subscribers.len(),
            "Sleep subscriber added"
        );
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        // Removal drops the sender, which is the one close of that stream.
        if self.subscribers.remove(&id).is_none() {
            tracing::debug!(
                generation = %self.generation,
                subscription = %id,
                "Unsubscribe for unknown subscription ignored"
            );
            return;
        }
        tracing::debug!(
            generation = %self.generation,
            subscription = %id,
            subscribers = self.subscribers.len(),
            "Sleep subscriber removed"
        );

        if self.subscribers.is_empty() {
            self.token.cancel();
            self.release_current();
        }
    }

    fn mark_listening(&mut self) {
        if self.starting {
            self.starting = false;
            tracing::debug!(generation = %self.generation, "Power monitor started");
        }
    }

    async fn fan_out(&self, activity: Activity) {
        for (id, tx) in &self.subscribers {
            match tokio::time::timeout(self.slow_subscriber_timeout, tx.send(activity)).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    tracing::debug!(
                        generation = %self.generation,
                        subscription = %id,
                        "Sleep subscriber dropped its stream, delivery skipped"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        generation = %self.generation,
                        subscription = %id,
                        timeout = ?self.slow_subscriber_timeout,
                        "Slow sleep subscriber skipped"
                    );
                }
            }
        }
    }

    /// Tears the loop down after the pipe closed.
    ///
    /// Dropping the subscriber map and the request receivers closes every
    /// remaining stream, including registrations still queued, and makes
    /// any in-flight watcher send fail fast instead of blocking.
    fn finish(self) {
        self.release_current();
        tracing::debug!(
            generation = %self.generation,
            outstanding = self.subscribers.len(),
            "Power monitor stopped"
        );
        drop(self.guard);
    }

    /// Stops this generation from being handed to new subscribers.
    fn release_current(&self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut current = inner.current.lock();
            if current
                .as_ref()
                .is_some_and(|handle| handle.id == self.generation)
            {
                *current = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::broker::tracker::GenerationTracker;
    use crate::monitor::EventSink;

    use super::*;

    struct Harness {
        new_tx: mpsc::Sender<Register>,
        unsub_tx: mpsc::Sender<SubscriptionId>,
        pipe_tx: Arc<mpsc::Sender<Notification>>,
        sink: EventSink,
        token: CancellationToken,
        tracker: Arc<GenerationTracker>,
        control: Option<ControlLoop>,
    }

    fn harness(slow_subscriber_timeout: Duration) -> Harness {
        let (new_tx, new_rx) = mpsc::channel(16);
        let (unsub_tx, unsub_rx) = mpsc::channel(16);
        let (pipe_tx, pipe_rx) = mpsc::channel(16);
        let pipe_tx = Arc::new(pipe_tx);
        let sink = EventSink::new(&pipe_tx);
        let token = CancellationToken::new();
        let tracker = Arc::new(GenerationTracker::new());

        let control = ControlLoop {
            generation: GenerationId::new(1),
            new_rx,
            unsub_rx,
            pipe_rx,
            subscribers: HashMap::new(),
            token: token.clone(),
            inner: Weak::new(),
            slow_subscriber_timeout,
            starting: true,
            guard: tracker.enter(),
        };

        Harness {
            new_tx,
            unsub_tx,
            pipe_tx,
            sink,
            token,
            tracker,
            control: Some(control),
        }
    }

    fn subscriber(capacity: usize) -> (Register, mpsc::Receiver<Activity>, SubscriptionId) {
        static NEXT: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);
        let id = SubscriptionId::new(NEXT.fetch_add(1, std::sync::atomic::Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(capacity);
        (Register { id, tx }, rx, id)
    }

    #[tokio::test]
    async fn readiness_marker_is_not_forwarded() {
        let mut h = harness(Duration::from_secs(1));
        let (register, mut rx, _) = subscriber(4);
        h.new_tx.send(register).await.unwrap();

        let run = tokio::spawn(h.control.take().unwrap().run());

        h.sink.listening().await;
        h.sink.notify(Activity::Sleep).await;

        // The first thing a subscriber ever sees is a genuine event.
        assert_eq!(rx.recv().await, Some(Activity::Sleep));

        drop(h.sink);
        drop(h.pipe_tx);
        run.await.unwrap();
    }

    #[tokio::test]
    async fn queued_registration_beats_queued_event() {
        let mut h = harness(Duration::from_secs(1));
        let (register, mut rx, _) = subscriber(4);

        // Both requests are already queued when the loop starts polling.
        h.new_tx.send(register).await.unwrap();
        h.sink.notify(Activity::Awake).await;

        let run = tokio::spawn(h.control.take().unwrap().run());

        assert_eq!(rx.recv().await, Some(Activity::Awake));

        drop(h.sink);
        drop(h.pipe_tx);
        run.await.unwrap();
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_block_the_rest() {
        let mut h = harness(Duration::from_millis(50));
        let (slow_register, slow_rx, _) = subscriber(1);
        let (live_register, mut live_rx, _) = subscriber(4);
        h.new_tx.send(slow_register).await.unwrap();
        h.new_tx.send(live_register).await.unwrap();

        let run = tokio::spawn(h.control.take().unwrap().run());

        // Three events: the slow subscriber's buffer holds one and is never
        // read, so later deliveries to it time out.
        h.sink.notify(Activity::Sleep).await;
        h.sink.notify(Activity::Awake).await;
        h.sink.notify(Activity::Sleep).await;

        let deadline = Duration::from_secs(2);
        assert_eq!(
            tokio::time::timeout(deadline, live_rx.recv()).await.unwrap(),
            Some(Activity::Sleep)
        );
        assert_eq!(
            tokio::time::timeout(deadline, live_rx.recv()).await.unwrap(),
            Some(Activity::Awake)
        );
        assert_eq!(
            tokio::time::timeout(deadline, live_rx.recv()).await.unwrap(),
            Some(Activity::Sleep)
        );

        drop(slow_rx);
        drop(h.sink);
        drop(h.pipe_tx);
        run.await.unwrap();
    }

    #[tokio::test]
    async fn last_unsubscribe_cancels_the_generation() {
        let mut h = harness(Duration::from_secs(1));
        let (register, mut rx, id) = subscriber(4);
        h.new_tx.send(register).await.unwrap();

        let run = tokio::spawn(h.control.take().unwrap().run());

        h.unsub_tx.send(id).await.unwrap();

        // Stream closes and the generation is asked to stop.
        assert_eq!(rx.recv().await, None);
        h.token.cancelled().await;

        drop(h.sink);
        drop(h.pipe_tx);
        run.await.unwrap();
    }

    #[tokio::test]
    async fn exit_closes_outstanding_streams_and_releases_the_tracker() {
        let mut h = harness(Duration::from_secs(1));
        let (register, mut rx, _) = subscriber(4);
        h.new_tx.send(register).await.unwrap();

        let run = tokio::spawn(h.control.take().unwrap().run());

        // Pipe closes with the subscriber still registered.
        drop(h.sink);
        drop(h.pipe_tx);
        run.await.unwrap();

        assert_eq!(rx.recv().await, None);
        h.tracker.idle().await;
        assert_eq!(h.tracker.active(), 0);
    }

    #[tokio::test]
    async fn unknown_unsubscribe_is_ignored() {
        let mut h = harness(Duration::from_secs(1));
        let (register, mut rx, _) = subscriber(4);
        h.new_tx.send(register).await.unwrap();

        let run = tokio::spawn(h.control.take().unwrap().run());

        h.unsub_tx.send(SubscriptionId::new(9999)).await.unwrap();
        h.sink.notify(Activity::Awake).await;

        // The registered subscriber is unaffected.
        assert_eq!(rx.recv().await, Some(Activity::Awake));

        drop(h.sink);
        drop(h.pipe_tx);
        run.await.unwrap();
    }
}
