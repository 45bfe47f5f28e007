// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power-state activity types.

use serde::{Deserialize, Serialize};

/// A power-state transition observed on the host machine.
///
/// Activities are delivered to every live subscriber of a
/// [`SleepBroker`](crate::SleepBroker). They carry no payload beyond the
/// transition itself and serialize to the lowercase names `"sleep"` and
/// `"awake"`.
///
/// # Examples
///
/// ```
/// use sleepwatch::Activity;
///
/// let activity = Activity::Sleep;
/// assert!(activity.is_sleep());
/// assert_eq!(activity.as_str(), "sleep");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    /// The host is going to sleep.
    Sleep,
    /// The host woke up.
    Awake,
}

impl Activity {
    /// Returns the lowercase name of this activity.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sleep => "sleep",
            Self::Awake => "awake",
        }
    }

    /// Returns `true` if this is a sleep transition.
    #[must_use]
    pub fn is_sleep(&self) -> bool {
        matches!(self, Self::Sleep)
    }

    /// Returns `true` if this is a wake transition.
    #[must_use]
    pub fn is_awake(&self) -> bool {
        matches!(self, Self::Awake)
    }
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names() {
        assert_eq!(Activity::Sleep.to_string(), "sleep");
        assert_eq!(Activity::Awake.to_string(), "awake");
    }

    #[test]
    fn predicates() {
        assert!(Activity::Sleep.is_sleep());
        assert!(!Activity::Sleep.is_awake());
        assert!(Activity::Awake.is_awake());
        assert!(!Activity::Awake.is_sleep());
    }

    #[test]
    fn serializes_to_lowercase_names() {
        assert_eq!(serde_json::to_string(&Activity::Sleep).unwrap(), "\"sleep\"");
        assert_eq!(serde_json::to_string(&Activity::Awake).unwrap(), "\"awake\"");
    }

    #[test]
    fn deserializes_from_lowercase_names() {
        let activity: Activity = serde_json::from_str("\"awake\"").unwrap();
        assert_eq!(activity, Activity::Awake);
    }
}
