// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dispatcher identifier type.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one dispatcher instance.
///
/// A test bench usually drives several devices at once, each with its own
/// dispatcher. The identifier is attached to every log record and lifecycle
/// notification so their output can be told apart. It serializes as the
/// bare UUID string.
///
/// # Examples
///
/// ```
/// use evdispatch::event::DispatcherId;
///
/// let id = DispatcherId::new();
/// println!("Dispatcher: {id}");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DispatcherId(Uuid);

impl DispatcherId {
    /// Creates a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DispatcherId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DispatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl fmt::Debug for DispatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First group of the UUID only
        let full = self.0.simple().to_string();
        write!(f, "DispatcherId({})", &full[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(DispatcherId::new(), DispatcherId::new());
    }

    #[test]
    fn debug_shows_first_group() {
        let id = DispatcherId::new();
        let debug = format!("{id:?}");
        let prefix = &id.to_string()[..8];
        assert_eq!(debug, format!("DispatcherId({prefix})"));
    }

    #[test]
    fn serializes_as_display_string() {
        let id = DispatcherId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));

        let back: DispatcherId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }
}
