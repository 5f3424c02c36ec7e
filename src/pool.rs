// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded worker pool.
//!
//! Every task the dispatcher runs in the background goes through a
//! [`WorkerPool`]: the poller, handler invocations, and `handle_event`
//! waits. The pool caps how many of them run at once with a semaphore.
//!
//! ```text
//! submit(task) ──► tokio::spawn
//!                    ├─► acquire permit ──(pool shut down)──► Err(PoolShutdown)
//!                    └─► run task while holding the permit
//! ```
//!
//! Shutting the pool down does not wait for anything. Tasks still queued
//! for a permit resolve to [`Error::PoolShutdown`]; tasks already running
//! finish on their own.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Default number of concurrent workers.
pub const DEFAULT_MAX_WORKERS: usize = 15;

/// Semaphore-bounded task executor.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    semaphore: Arc<Semaphore>,
    token: CancellationToken,
    max_workers: usize,
}

impl WorkerPool {
    /// Creates a pool running at most `max_workers` tasks at once.
    pub(crate) fn new(max_workers: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers)),
            token: CancellationToken::new(),
            max_workers,
        }
    }

    /// Submits a task. It starts as soon as a worker slot is free.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolShutdown`] if the pool no longer accepts tasks.
    pub(crate) fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, Error>
    where
        F: Future<Output = Result<T, Error>> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_shutdown() {
            return Err(Error::PoolShutdown);
        }

        let semaphore = Arc::clone(&self.semaphore);
        let token = self.token.clone();
        let inner = tokio::spawn(async move {
            let _permit = tokio::select! {
                biased;
                () = token.cancelled() => return Err(Error::PoolShutdown),
                permit = semaphore.acquire_owned() => permit.map_err(|_| Error::PoolShutdown)?,
            };
            task.await
        });

        Ok(TaskHandle { inner })
    }

    /// Stops accepting tasks and releases everything waiting for a slot.
    pub(crate) fn shutdown(&self) {
        self.token.cancel();
        self.semaphore.close();
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token cancelled when the pool shuts down.
    ///
    /// Long-running tasks select on it to leave early.
    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub(crate) fn max_workers(&self) -> usize {
        self.max_workers
    }
}

/// Handle to the eventual result of a pooled task.
///
/// Dropping the handle detaches the task; it keeps running and its result is
/// discarded. Panics inside the task are captured and reported by
/// [`join`](Self::join) instead of propagating.
#[derive(Debug)]
pub struct TaskHandle<T> {
    inner: JoinHandle<Result<T, Error>>,
}

impl<T> TaskHandle<T> {
    /// Waits for the task and returns its outcome.
    ///
    /// # Errors
    ///
    /// Returns the task's own error, [`Error::PoolShutdown`] if the pool
    /// closed before the task got a worker, [`Error::TaskPanicked`] if it
    /// panicked, or [`Error::TaskCancelled`] if it was aborted.
    pub async fn join(self) -> Result<T, Error> {
        match self.inner.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(Error::TaskPanicked(panic_message(&*e.into_panic()))),
            Err(_) => Err(Error::TaskCancelled),
        }
    }

    /// Returns `true` once the task has finished, successfully or not.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Aborts the task.
    pub fn abort(&self) {
        self.inner.abort();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
