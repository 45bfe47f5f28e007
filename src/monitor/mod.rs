// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power monitor backends.
//!
//! A monitor is the platform-facing half of the library: it registers with
//! whatever the operating system offers for sleep/wake notifications and
//! reports observations back through an [`EventSink`]. The broker starts a
//! monitor when the first subscriber appears and stops it when the last one
//! leaves; everything in between is the monitor's business.
//!
//! The library ships [`NoopMonitor`] as the portable fallback and selects
//! it via [`platform_default`]. Native backends are plugged in by
//! implementing [`PowerMonitor`] and handing the implementation to
//! [`SleepBroker::new`](crate::SleepBroker::new).

mod noop;
pub(crate) mod sink;

use async_trait::async_trait;

use crate::error::MonitorError;

pub use noop::NoopMonitor;
pub use sink::EventSink;

/// A source of host power-state transitions.
///
/// One monitor instance serves a broker for its whole life, but runs in
/// generations: [`start`](Self::start) is called when subscriber interest
/// appears, [`stop`](Self::stop) when it disappears, and `start` may be
/// called again later for a fresh generation. Within a generation the
/// calls are ordered: `stop` runs at most once, and only after `start`
/// returned `Ok`. When interest returns immediately, the next
/// generation's `start` can begin while the previous `stop` is still
/// returning; implementations touching global platform state must
/// tolerate that.
///
/// # Contract
///
/// After a successful `start`, the monitor must deliver exactly one
/// readiness signal ([`EventSink::listening`]) before any genuine event,
/// followed by zero or more [`EventSink::notify`] calls until `stop`. The
/// sink belongs to the generation being started; sends into an ended
/// generation are discarded, so a monitor that is slow to wind down after
/// `stop` is harmless.
///
/// Implementations should return from `stop` promptly: generation teardown
/// (and [`SleepBroker::await_idle`](crate::SleepBroker::await_idle)) waits
/// on it.
#[async_trait]
pub trait PowerMonitor: Send + Sync + 'static {
    /// Registers for power notifications and begins delivery into `sink`.
    ///
    /// # Errors
    ///
    /// Returns a [`MonitorError`] if registration fails. The broker ends
    /// the generation without calling [`stop`](Self::stop); the failure is
    /// logged and subscribers of that generation see their streams close.
    async fn start(&self, sink: EventSink) -> Result<(), MonitorError>;

    /// Deregisters from power notifications and halts delivery.
    async fn stop(&self);
}

/// Returns the default monitor for the compilation target.
///
/// There is currently no native backend wired in, so every target gets the
/// [`NoopMonitor`]; targets gain real monitors by adding an implementation
/// here behind a `cfg` for that platform.
///
/// # Examples
///
/// ```
/// use sleepwatch::SleepBroker;
///
/// let broker = SleepBroker::new(sleepwatch::monitor::platform_default());
/// ```
#[must_use]
pub fn platform_default() -> NoopMonitor {
    NoopMonitor
}
