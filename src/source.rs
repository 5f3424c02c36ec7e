// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The event source contract.
//!
//! The dispatcher depends on exactly one primitive of the device-control
//! layer: "wait for the next event". [`EventSource`] captures it. The
//! dispatcher drops the pending fetch future when it stops, so any source
//! whose future is cancel-safe can be interrupted cleanly.
//!
//! [`ChannelSource`] is an in-process implementation fed through an
//! [`EventSender`]. It suits device layers that already receive events on
//! a background task, and tests.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::error::SourceError;
use crate::event::Event;

/// Something the dispatcher can poll for events.
pub trait EventSource: Send + Sync + 'static {
    /// Waits for the next event from the device.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Cancelled`] if the wait was interrupted on
    /// purpose; any other error makes the dispatcher stop itself.
    fn next_event(&self) -> impl Future<Output = Result<Event, SourceError>> + Send;
}

impl<S: EventSource> EventSource for Arc<S> {
    fn next_event(&self) -> impl Future<Output = Result<Event, SourceError>> + Send {
        (**self).next_event()
    }
}

type Item = Result<Event, SourceError>;

/// Channel-backed [`EventSource`].
///
/// # Examples
///
/// ```
/// use evdispatch::source::{ChannelSource, EventSource};
/// use evdispatch::Event;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (tx, source) = ChannelSource::new();
/// tx.send(Event::new("ping", json!({}))).unwrap();
///
/// let event = source.next_event().await.unwrap();
/// assert_eq!(event.name(), "ping");
/// # }
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: Mutex<mpsc::UnboundedReceiver<Item>>,
}

impl ChannelSource {
    /// Creates a source and the sender that feeds it.
    #[must_use]
    pub fn new() -> (EventSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            EventSender { sender: tx },
            Self {
                receiver: Mutex::new(rx),
            },
        )
    }
}

impl EventSource for ChannelSource {
    async fn next_event(&self) -> Result<Event, SourceError> {
        let mut rx = self.receiver.lock().await;
        rx.recv().await.unwrap_or(Err(SourceError::Closed))
    }
}

/// Feeds events (or failures) into a [`ChannelSource`].
///
/// Dropping every sender closes the source: the next fetch returns
/// [`SourceError::Closed`].
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::UnboundedSender<Item>,
}

impl EventSender {
    /// Queues an event for the next fetch.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Closed`] if the source was dropped.
    pub fn send(&self, event: Event) -> Result<(), SourceError> {
        self.sender
            .send(Ok(event))
            .map_err(|_| SourceError::Closed)
    }

    /// Makes a future fetch fail with `error`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Closed`] if the source was dropped.
    pub fn fail(&self, error: SourceError) -> Result<(), SourceError> {
        self.sender
            .send(Err(error))
            .map_err(|_| SourceError::Closed)
    }

    /// Returns `true` once the source has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn delivers_in_send_order() {
        let (tx, source) = ChannelSource::new();
        tx.send(Event::new("a", json!(1))).unwrap();
        tx.send(Event::new("b", json!(2))).unwrap();

        assert_eq!(source.next_event().await.unwrap().name(), "a");
        assert_eq!(source.next_event().await.unwrap().name(), "b");
    }

    #[tokio::test]
    async fn injected_failure_is_returned() {
        let (tx, source) = ChannelSource::new();
        tx.fail(SourceError::Transport("reset".into())).unwrap();

        let err = source.next_event().await.unwrap_err();
        assert_eq!(err, SourceError::Transport("reset".into()));
    }

    #[tokio::test]
    async fn dropping_sender_closes_source() {
        let (tx, source) = ChannelSource::new();
        drop(tx);
        assert_eq!(source.next_event().await.unwrap_err(), SourceError::Closed);
    }

    #[test]
    fn send_after_source_dropped_fails() {
        let (tx, source) = ChannelSource::new();
        drop(source);
        assert!(tx.is_closed());
        assert_eq!(
            tx.send(Event::new("a", json!(null))).unwrap_err(),
            SourceError::Closed
        );
    }

    #[tokio::test]
    async fn arc_source_delegates() {
        let (tx, source) = ChannelSource::new();
        let source = Arc::new(source);
        tx.send(Event::new("shared", json!({}))).unwrap();
        assert_eq!(source.next_event().await.unwrap().name(), "shared");
    }
}
