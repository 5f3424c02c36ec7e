// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `evdispatch` library.
//!
//! [`Error`] covers every failure the dispatcher reports to its callers:
//! lifecycle misuse, duplicate registrations, waits that ran out of time,
//! and failures of the worker pool. [`SourceError`] is the error contract
//! of the external [`EventSource`](crate::source::EventSource).

use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by user-supplied handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Operation invoked in the wrong lifecycle state.
    ///
    /// Raised when popping before `start()`, registering a handler after
    /// `start()`, or starting a dispatcher that is already running.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A handler is already registered for this event name.
    #[error("a handler for {0} already exists")]
    DuplicateHandler(String),

    /// No qualifying event arrived before the deadline.
    #[error("timed out after {} ms", .0.as_millis())]
    TimedOut(Duration),

    /// `pop_events` found no matching event before its deadline.
    #[error("no event whose name matches {0} ever occurred")]
    EmptyResult(String),

    /// The worker pool was shut down before the task could run.
    #[error("worker pool is shut down")]
    PoolShutdown,

    /// A pooled task panicked.
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    /// A pooled task was aborted before it produced a result.
    #[error("task was cancelled")]
    TaskCancelled,

    /// A handler invoked through `handle_event` returned an error.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    /// An event object received from the device could not be interpreted.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// Dispatcher configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The event source failed.
    #[error("event source error: {0}")]
    Source(#[from] SourceError),
}

/// Errors reported by an [`EventSource`](crate::source::EventSource).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The fetch was interrupted because the dispatcher is stopping.
    ///
    /// The poller treats this as a normal shutdown, not a failure: it
    /// exits without stopping the dispatcher. A source that returns this
    /// on its own leaves the dispatcher reporting `Running` with nothing
    /// polling, so `start()` keeps failing until `stop()` is called.
    #[error("fetch cancelled")]
    Cancelled,

    /// The source has no more events and never will.
    #[error("event source closed")]
    Closed,

    /// The link to the device failed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SourceError {
    /// Returns `true` if this error is the designated cancellation signal.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_handler_display() {
        let err = Error::DuplicateHandler("conn_lost".to_string());
        assert_eq!(err.to_string(), "a handler for conn_lost already exists");
    }

    #[test]
    fn timed_out_display() {
        let err = Error::TimedOut(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "timed out after 1500 ms");
    }

    #[test]
    fn empty_result_display() {
        let err = Error::EmptyResult("scan".to_string());
        assert_eq!(
            err.to_string(),
            "no event whose name matches scan ever occurred"
        );
    }

    #[test]
    fn error_from_source_error() {
        let err: Error = SourceError::Transport("socket reset".to_string()).into();
        assert!(matches!(err, Error::Source(SourceError::Transport(ref m)) if m == "socket reset"));
    }

    #[test]
    fn only_cancelled_is_cancellation() {
        assert!(SourceError::Cancelled.is_cancelled());
        assert!(!SourceError::Closed.is_cancelled());
        assert!(!SourceError::Transport("x".to_string()).is_cancelled());
    }
}
