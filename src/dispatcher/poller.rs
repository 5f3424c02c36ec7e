// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The background polling loop.
//!
//! ```text
//! loop while running {
//!   ├─► fetch next event ──(run cancelled / SourceError::Cancelled)──► exit
//!   │                    └─(any other error)──► log, fail-stop, exit
//!   ├─► stamp sequence number
//!   └─► under the run lock: run still current?
//!         ├─► no: drop the event, exit
//!         └─► handler registered?
//!               ├─► yes: submit handler to the pool, do not wait
//!               └─► no:  push onto the event's queue
//! }
//! ```
//!
//! A fetch can complete while `stop()` runs on another thread. Routing
//! under the same lock `stop()` takes means the event is either cleared by
//! that stop or never pushed at all.

use std::sync::Arc;

use crate::error::{Error, SourceError};
use crate::event::{Event, StopReason};
use crate::pool::WorkerPool;
use crate::source::EventSource;

use super::{Inner, is_current_run};

/// Runs the poller for one dispatcher run.
///
/// `pool` is the run's worker pool; its token is cancelled when the run
/// ends, which interrupts a pending fetch.
pub(super) async fn run<S: EventSource>(
    inner: Arc<Inner<S>>,
    pool: Arc<WorkerPool>,
) -> Result<(), Error> {
    let token = pool.token();
    let mut sequence: u64 = 0;

    tracing::debug!(dispatcher = %inner.id, "Poller started");

    while inner.is_running() {
        let fetched = tokio::select! {
            biased;
            () = token.cancelled() => break,
            fetched = inner.source.next_event() => fetched,
        };

        let event = match fetched {
            Ok(event) => event,
            Err(SourceError::Cancelled) => break,
            Err(err) => {
                tracing::error!(
                    dispatcher = %inner.id,
                    error = %err,
                    "Polling failed, stopping dispatcher"
                );
                inner.halt(StopReason::SourceFailed(err.to_string()), Some(&pool));
                return Err(err.into());
            }
        };

        sequence += 1;
        if !route(&inner, &pool, event.stamp(sequence)) {
            break;
        }
    }

    tracing::debug!(dispatcher = %inner.id, polled = sequence, "Poller exited");
    Ok(())
}

/// Hands `event` to its handler, or buffers it.
///
/// Returns `false`, dropping the event, if `pool`'s run has ended.
fn route<S: EventSource>(inner: &Inner<S>, pool: &Arc<WorkerPool>, event: Event) -> bool {
    tracing::debug!(
        dispatcher = %inner.id,
        event = %event.name(),
        sequence = event.sequence(),
        "Polled event"
    );

    let handler = {
        let slot = inner.pool.lock();
        if !is_current_run(slot.as_ref(), pool) {
            tracing::debug!(
                dispatcher = %inner.id,
                event = %event.name(),
                "Dropping event polled after stop"
            );
            return false;
        }
        match inner.handlers.get(event.name()) {
            Some(handler) => handler,
            None => {
                inner.store.push(event);
                return true;
            }
        }
    };

    tracing::debug!(event = %handler.name(), "Handling subscribed event");

    let dispatcher = inner.id;
    let name = handler.name().to_string();
    let invocation = handler.invoke(event);
    let submitted = pool.submit(async move {
        invocation.await.map_err(|e| {
            tracing::warn!(
                dispatcher = %dispatcher,
                event = %name,
                error = %e,
                "Event handler failed"
            );
            Error::Handler(e)
        })
    });

    // Fire-and-forget: the handle is dropped and the task runs detached.
    if let Err(e) = submitted {
        tracing::debug!(
            dispatcher = %inner.id,
            error = %e,
            "Dropping event, worker pool is shut down"
        );
    }
    true
}
