// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dispatcher lifecycle notifications.

use super::DispatcherId;

/// Why a dispatcher stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called.
    Requested,
    /// The event source failed and the poller shut the dispatcher down.
    SourceFailed(String),
}

/// Lifecycle transitions published by a dispatcher.
///
/// # Examples
///
/// ```
/// use evdispatch::event::{DispatcherId, LifecycleEvent, StopReason};
///
/// let id = DispatcherId::new();
/// let stopped = LifecycleEvent::stopped(id, StopReason::Requested);
/// assert!(stopped.is_stop());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The dispatcher entered the running state.
    Started {
        /// The dispatcher that started.
        dispatcher_id: DispatcherId,
    },

    /// The dispatcher returned to the stopped state.
    Stopped {
        /// The dispatcher that stopped.
        dispatcher_id: DispatcherId,
        /// What caused the transition.
        reason: StopReason,
    },
}

impl LifecycleEvent {
    /// Returns the dispatcher this event belongs to.
    #[must_use]
    pub fn dispatcher_id(&self) -> DispatcherId {
        match self {
            Self::Started { dispatcher_id } | Self::Stopped { dispatcher_id, .. } => *dispatcher_id,
        }
    }

    /// Returns `true` for a stop transition.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }

    /// Creates a started event.
    #[must_use]
    pub fn started(dispatcher_id: DispatcherId) -> Self {
        Self::Started { dispatcher_id }
    }

    /// Creates a stopped event.
    #[must_use]
    pub fn stopped(dispatcher_id: DispatcherId, reason: StopReason) -> Self {
        Self::Stopped {
            dispatcher_id,
            reason,
        }
    }
}
