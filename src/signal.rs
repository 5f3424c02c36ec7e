// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A settable flag tasks can wait on.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// A boolean flag that can be set from one task and awaited from others.
///
/// Used as the precondition of
/// [`EventDispatcher::handle_event`](crate::EventDispatcher::handle_event):
/// the handling task waits for the signal before it starts looking for its
/// event. Once set, the signal stays set until [`clear`](Self::clear) is
/// called, so late waiters return immediately.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use evdispatch::Signal;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let signal = Signal::new();
/// let waiter = signal.clone();
///
/// signal.set();
/// assert!(waiter.wait(Some(Duration::from_secs(1))).await);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Signal {
    state: Arc<watch::Sender<bool>>,
}

impl Signal {
    /// Creates an unset signal.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Sets the signal and wakes every waiter.
    pub fn set(&self) {
        self.state.send_replace(true);
    }

    /// Resets the signal.
    pub fn clear(&self) {
        self.state.send_replace(false);
    }

    /// Returns `true` if the signal is set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.state.borrow()
    }

    /// Waits for the signal to be set.
    ///
    /// Returns `false` if `timeout` elapsed first. `None` waits forever.
    pub async fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut rx = self.state.subscribe();
        let set = async move { rx.wait_for(|set| *set).await.is_ok() };
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, set).await.unwrap_or(false),
            None => set.await,
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
