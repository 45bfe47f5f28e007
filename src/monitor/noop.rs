// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fallback monitor for platforms without native sleep detection.

use async_trait::async_trait;

use crate::error::MonitorError;

use super::{EventSink, PowerMonitor};

/// A monitor that starts successfully and never observes anything.
///
/// Used as the default on platforms without a native backend. Its `start`
/// delivers the readiness signal itself, so the broker goes through its
/// normal Starting transition; no activity is ever reported and
/// subscribers simply receive no events.
///
/// # Examples
///
/// ```
/// use sleepwatch::{NoopMonitor, SleepBroker};
///
/// let broker = SleepBroker::new(NoopMonitor);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

#[async_trait]
impl PowerMonitor for NoopMonitor {
    async fn start(&self, sink: EventSink) -> Result<(), MonitorError> {
        sink.listening().await;
        Ok(())
    }

    async fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use crate::monitor::sink::Notification;

    use super::*;

    #[tokio::test]
    async fn start_reports_readiness_and_nothing_else() {
        let (tx, mut rx) = mpsc::channel(4);
        let tx = Arc::new(tx);
        let sink = EventSink::new(&tx);

        NoopMonitor.start(sink).await.unwrap();

        assert_eq!(rx.recv().await, Some(Notification::Listening));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stop_is_a_no_op() {
        NoopMonitor.stop().await;
    }
}
