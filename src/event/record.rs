// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The named event type polled from a device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// A named event received from the device.
///
/// The payload is schemaless: devices attach whatever structured data they
/// like, and consumers pick out the fields they care about. The sequence
/// number and arrival time are stamped by the dispatcher when the event is
/// polled; events built by an [`EventSource`](crate::source::EventSource)
/// carry a sequence of `0` until then.
///
/// # Examples
///
/// ```
/// use evdispatch::Event;
/// use serde_json::json;
///
/// let event = Event::new("BleScan", json!({"data": {"rssi": -42}}));
/// assert_eq!(event.name(), "BleScan");
/// assert_eq!(event.data(), Some(&json!({"rssi": -42})));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    name: String,
    payload: Value,
    #[serde(default)]
    sequence: u64,
    #[serde(default = "Utc::now")]
    received_at: DateTime<Utc>,
}

impl Event {
    /// Creates a new, not yet polled, event.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            sequence: 0,
            received_at: Utc::now(),
        }
    }

    /// Builds an event from a device JSON object.
    ///
    /// The object must carry a string `"name"` member. The whole object is
    /// kept as the payload, so fields such as `"data"` or `"time"` stay
    /// reachable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedEvent`] if the value is not an object or
    /// has no string `"name"` member.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let name = match value.get("name") {
            Some(Value::String(name)) => name.clone(),
            Some(other) => {
                return Err(Error::MalformedEvent(format!(
                    "event name must be a string, got {other}"
                )));
            }
            None => {
                return Err(Error::MalformedEvent(format!(
                    "missing event name in {value}"
                )));
            }
        };
        Ok(Self::new(name, value))
    }

    /// Returns the event name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the full payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the conventional `"data"` member of the payload, if any.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.payload.get("data")
    }

    /// Returns the arrival order assigned by the dispatcher.
    ///
    /// Sequence numbers start at 1 for each dispatcher run.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns when the dispatcher received the event.
    #[must_use]
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Consumes the event and returns its payload.
    #[must_use]
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Stamps arrival order and time at poll time.
    pub(crate) fn stamp(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self.received_at = Utc::now();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_event_is_unstamped() {
        let event = Event::new("WifiNetworkConnected", json!({}));
        assert_eq!(event.sequence(), 0);
    }

    #[test]
    fn stamp_sets_sequence() {
        let event = Event::new("a", Value::Null).stamp(7);
        assert_eq!(event.sequence(), 7);
    }

    #[test]
    fn from_value_keeps_whole_object() {
        let raw = json!({"name": "BleScan1onScanResults", "time": 1_400_000, "data": [1, 2]});
        let event = Event::from_value(raw.clone()).unwrap();
        assert_eq!(event.name(), "BleScan1onScanResults");
        assert_eq!(event.payload(), &raw);
        assert_eq!(event.data(), Some(&json!([1, 2])));
    }

    #[test]
    fn from_value_rejects_missing_name() {
        let err = Event::from_value(json!({"data": 1})).unwrap_err();
        assert!(matches!(err, Error::MalformedEvent(_)));
    }

    #[test]
    fn from_value_rejects_non_string_name() {
        let err = Event::from_value(json!({"name": 3})).unwrap_err();
        assert!(matches!(err, Error::MalformedEvent(ref m) if m.contains("string")));
    }

    #[test]
    fn data_absent_for_scalar_payload() {
        let event = Event::new("x", json!(5));
        assert!(event.data().is_none());
    }

    #[test]
    fn deserialize_without_dispatcher_fields() {
        let event: Event =
            serde_json::from_value(json!({"name": "x", "payload": {"k": "v"}})).unwrap();
        assert_eq!(event.name(), "x");
        assert_eq!(event.sequence(), 0);
    }
}
