// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `sleepwatch` library.
//!
//! The only runtime failure the library distinguishes is a power monitor
//! that could not be started. It ends the affected generation and is
//! reported through logging; it is never delivered to subscribers.

use thiserror::Error;

/// Failure to start a power monitor backend.
///
/// Returned by [`PowerMonitor::start`](crate::PowerMonitor::start). The
/// broker attaches it as the cancellation cause of the generation it was
/// starting; subscribers of that generation simply see their streams close
/// without receiving any events.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Registering with the platform notification service failed.
    #[error("failed to register power notifications: {0}")]
    Registration(String),

    /// The selected backend cannot run in this environment.
    #[error("power monitoring is not supported: {0}")]
    Unsupported(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_display() {
        let err = MonitorError::Registration("IOKit returned 0".to_string());
        assert_eq!(
            err.to_string(),
            "failed to register power notifications: IOKit returned 0"
        );
    }

    #[test]
    fn unsupported_display() {
        let err = MonitorError::Unsupported("no session bus");
        assert_eq!(
            err.to_string(),
            "power monitoring is not supported: no session bus"
        );
    }
}
