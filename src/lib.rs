// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `sleepwatch` - A Rust library for observing host sleep/wake transitions.
//!
//! This library provides an async broker that sits between one platform
//! power monitor and any number of subscribers. Subscribers receive every
//! sleep and wake transition the monitor observes; the monitor itself is
//! only registered with the platform while at least one subscriber is
//! listening.
//!
//! # Supported Features
//!
//! - **Lazy monitoring**: The power monitor starts with the first
//!   subscriber and stops when the last one leaves
//! - **Fan-out with isolation**: Every subscriber gets its own stream; one
//!   that stops draining is skipped, never able to stall the others
//! - **Cancellation-driven lifecycle**: Subscriptions end through
//!   [`CancellationToken`](tokio_util::sync::CancellationToken)s, which
//!   compose with the rest of a Tokio application
//! - **Quiescence barrier**: [`SleepBroker::await_idle`] waits until the
//!   monitor is fully released, for orderly process shutdown
//!
//! # Quick Start
//!
//! ```no_run
//! use sleepwatch::SleepBroker;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let broker = SleepBroker::new(sleepwatch::monitor::platform_default());
//!
//!     let token = CancellationToken::new();
//!     let mut subscription = broker.subscribe(token.clone()).await;
//!
//!     tokio::spawn(async move {
//!         while let Some(activity) = subscription.recv().await {
//!             println!("host is now {activity}");
//!         }
//!     });
//!
//!     // ... run the application ...
//!
//!     token.cancel();
//!     broker.await_idle().await;
//! }
//! ```
//!
//! ## Custom Monitors
//!
//! Platforms without a built-in monitor, and tests, implement
//! [`PowerMonitor`] themselves. The broker hands `start` an [`EventSink`];
//! the monitor reports readiness once, then pushes transitions into it
//! from wherever the platform delivers them:
//!
//! ```no_run
//! use async_trait::async_trait;
//! use sleepwatch::{Activity, EventSink, MonitorError, PowerMonitor};
//!
//! struct TimerMonitor;
//!
//! #[async_trait]
//! impl PowerMonitor for TimerMonitor {
//!     async fn start(&self, sink: EventSink) -> Result<(), MonitorError> {
//!         sink.listening().await;
//!         tokio::spawn(async move {
//!             loop {
//!                 tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!                 // Once the broker stops this run, the send is dropped.
//!                 sink.notify(Activity::Sleep).await;
//!             }
//!         });
//!         Ok(())
//!     }
//!
//!     async fn stop(&self) {}
//! }
//! ```

mod activity;
mod broker;
pub mod error;
pub mod monitor;
mod subscription;

pub use activity::Activity;
pub use broker::{BrokerConfig, SleepBroker};
pub use error::MonitorError;
pub use monitor::{EventSink, NoopMonitor, PowerMonitor};
pub use subscription::{Subscription, SubscriptionId};
