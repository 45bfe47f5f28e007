// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-generation monitor lifecycle.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::monitor::sink::Notification;
use crate::monitor::{EventSink, PowerMonitor};

/// Identifier of one generation, unique for the broker's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GenerationId(u64);

impl GenerationId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for GenerationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Gen({})", self.0)
    }
}

/// Drives one run of the monitor and owns the write end of its event pipe.
///
/// Starts the monitor, then waits for the generation to be cancelled and
/// invokes the stop hook. If the start itself fails, the failure becomes
/// the generation's cancellation cause: the generation is cancelled on the
/// spot and the stop hook is skipped, since the monitor never ran.
///
/// Whichever way the run ends, dropping `pipe` here is the exactly-once
/// close of the event pipe; the control loop observes it as its Stopped
/// transition. Stop is only ever invoked after `start` returned `Ok`, even
/// when cancellation raced a start still in flight.
pub(crate) async fn run_generation(
    id: GenerationId,
    monitor: Arc<dyn PowerMonitor>,
    sink: EventSink,
    token: CancellationToken,
    pipe: Arc<mpsc::Sender<Notification>>,
) {
    tracing::debug!(generation = %id, "Power monitor starting");
    match monitor.start(sink).await {
        Ok(()) => {
            token.cancelled().await;
            monitor.stop().await;
        }
        Err(error) => {
            tracing::warn!(
                generation = %id,
                error = %error,
                "Power monitor failed to start, stopping generation"
            );
            token.cancel();
        }
    }
    drop(pipe);
}
