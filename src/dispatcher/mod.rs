// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The event dispatcher.
//!
//! An [`EventDispatcher`] owns one [`EventSource`] and, while running, polls
//! it continuously on a background task. Each event is either handed to the
//! handler registered for its name or buffered in a per-name queue that
//! callers drain with the `pop_*` methods.
//!
//! # Lifecycle
//!
//! ```text
//! Stopped ──start()──► Running ──stop() / source failure──► Stopped
//! ```
//!
//! - Handlers can only be registered while stopped.
//! - `pop_event`, `pop_events`, `pop_all`, `get_queue` and `handle_event`
//!   require the running state.
//! - `stop()` discards every buffered event and ends every wait in
//!   progress with [`Error::IllegalState`].

mod config;
mod poller;

pub use config::{DispatcherConfig, DispatcherConfigBuilder};

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::{BoxError, Error, Result};
use crate::event::{DispatcherId, Event, LifecycleBus, LifecycleEvent, StopReason};
use crate::handler::HandlerRegistry;
use crate::pool::{TaskHandle, WorkerPool};
use crate::signal::Signal;
use crate::source::EventSource;
use crate::store::{EventQueue, EventQueueStore};

/// Lifecycle state of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Not polling. Handlers may be registered.
    Stopped,
    /// Polling. Events may be popped and handled.
    Running,
}

/// Options for [`EventDispatcher::handle_event`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use evdispatch::{HandleOptions, Signal};
///
/// let ready = Signal::new();
/// let options = HandleOptions::new()
///     .event_timeout(Duration::from_secs(10))
///     .precondition(ready, Some(Duration::from_secs(5)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct HandleOptions {
    event_timeout: Option<Duration>,
    precondition: Option<(Signal, Option<Duration>)>,
}

impl HandleOptions {
    /// Creates options that wait forever and have no precondition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the wait for the event.
    #[must_use]
    pub fn event_timeout(mut self, timeout: Duration) -> Self {
        self.event_timeout = Some(timeout);
        self
    }

    /// Waits on `signal` before looking for the event.
    ///
    /// The wait is bounded by `timeout` (`None` waits forever). The task goes
    /// on to pop the event whether or not the signal was set in time.
    #[must_use]
    pub fn precondition(mut self, signal: Signal, timeout: Option<Duration>) -> Self {
        self.precondition = Some((signal, timeout));
        self
    }
}

/// Polls an [`EventSource`] and routes its events to handlers or queues.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use evdispatch::{Event, EventDispatcher};
/// use evdispatch::source::ChannelSource;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> evdispatch::Result<()> {
/// let (device, source) = ChannelSource::new();
/// let dispatcher = EventDispatcher::new(source);
/// dispatcher.start()?;
///
/// device.send(Event::new("WifiScanResults", json!({"data": ["guest"]})))?;
///
/// let event = dispatcher
///     .pop_event("WifiScanResults", Some(Duration::from_secs(5)))
///     .await?
///     .expect("event should arrive");
/// assert_eq!(event.data(), Some(&json!(["guest"])));
///
/// dispatcher.stop();
/// # Ok(())
/// # }
/// ```
pub struct EventDispatcher<S: EventSource> {
    inner: Arc<Inner<S>>,
}

pub(crate) struct Inner<S> {
    id: DispatcherId,
    config: DispatcherConfig,
    source: S,
    running: AtomicBool,
    store: Arc<EventQueueStore>,
    handlers: HandlerRegistry,
    /// Worker pool of the current run. Its lock also serializes lifecycle
    /// transitions and handler registration.
    pool: Mutex<Option<Arc<WorkerPool>>>,
    lifecycle: LifecycleBus,
}

impl<S: EventSource> EventDispatcher<S> {
    /// Creates a stopped dispatcher with the default configuration.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self::with_config(source, DispatcherConfig::default())
    }

    /// Creates a stopped dispatcher.
    #[must_use]
    pub fn with_config(source: S, config: DispatcherConfig) -> Self {
        let lifecycle = LifecycleBus::with_capacity(config.lifecycle_capacity());
        Self {
            inner: Arc::new(Inner {
                id: DispatcherId::new(),
                config,
                source,
                running: AtomicBool::new(false),
                store: Arc::new(EventQueueStore::new()),
                handlers: HandlerRegistry::new(),
                pool: Mutex::new(None),
                lifecycle,
            }),
        }
    }

    /// Returns this dispatcher's identifier.
    #[must_use]
    pub fn id(&self) -> DispatcherId {
        self.inner.id
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Returns `true` while the dispatcher is polling.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DispatcherState {
        if self.is_running() {
            DispatcherState::Running
        } else {
            DispatcherState::Stopped
        }
    }

    /// Subscribes to start/stop notifications.
    #[must_use]
    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.lifecycle.subscribe()
    }

    /// Returns the names of all existing event queues, sorted.
    #[must_use]
    pub fn queue_names(&self) -> Vec<String> {
        self.inner.store.names()
    }

    /// Returns `true` if a queue exists for `name`.
    ///
    /// Names with a registered handler never get a queue.
    #[must_use]
    pub fn has_queue(&self, name: &str) -> bool {
        self.inner.store.contains(name)
    }

    /// Returns `true` if a handler is registered for `name`.
    #[must_use]
    pub fn has_handler(&self, name: &str) -> bool {
        self.inner.handlers.contains(name)
    }

    /// Returns the names with a registered handler, sorted.
    #[must_use]
    pub fn handler_names(&self) -> Vec<String> {
        self.inner.handlers.names()
    }

    /// Registers a handler for every event named `name`.
    ///
    /// Events with a handler are never buffered: the poller invokes
    /// `callback(event, args.clone())` on a worker and moves on without
    /// waiting for it. Handler errors are logged and otherwise dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalState`] if the dispatcher is running
    /// - [`Error::DuplicateHandler`] if `name` already has a handler
    pub fn register_handler<F, Fut, A>(&self, name: &str, callback: F, args: A) -> Result<()>
    where
        F: Fn(Event, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
        A: Clone + Send + Sync + 'static,
    {
        let _lifecycle = self.inner.pool.lock();
        if self.inner.is_running() {
            return Err(Error::IllegalState(
                "can't register a handler after polling is started".to_string(),
            ));
        }
        self.inner.handlers.register(name, callback, args)?;
        tracing::debug!(dispatcher = %self.inner.id, event = %name, "Registered handler");
        Ok(())
    }

    /// Starts polling.
    ///
    /// Creates a fresh worker pool and submits the poller to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if the dispatcher is already running.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.inner.pool.lock();
        if self.inner.is_running() {
            return Err(Error::IllegalState(
                "dispatcher is already started".to_string(),
            ));
        }

        let pool = Arc::new(WorkerPool::new(self.inner.config.max_workers()));
        self.inner.running.store(true, Ordering::Release);
        *slot = Some(Arc::clone(&pool));

        // The poller holds one worker slot for the whole run.
        let poller = poller::run(Arc::clone(&self.inner), Arc::clone(&pool));
        if let Err(e) = pool.submit(poller) {
            self.inner.running.store(false, Ordering::Release);
            *slot = None;
            return Err(e);
        }

        tracing::info!(
            dispatcher = %self.inner.id,
            max_workers = pool.max_workers(),
            "Event dispatcher started"
        );
        self.inner.lifecycle.publish(LifecycleEvent::started(self.inner.id));
        Ok(())
    }

    /// Stops polling and discards every buffered event.
    ///
    /// Does nothing if the dispatcher is not running. Does not wait for
    /// handler invocations in flight; they may still complete afterwards.
    pub fn stop(&self) {
        self.inner.halt(StopReason::Requested, None);
    }

    /// Pops the oldest event named `name`.
    ///
    /// Waits up to `timeout` for the queue of that name to exist, then up to
    /// `timeout` again for it to hold an event, so the total wait can reach
    /// twice `timeout`. `None` waits forever.
    ///
    /// Returns `Ok(None)` on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if the dispatcher is not running or
    /// stops while waiting.
    pub async fn pop_event(&self, name: &str, timeout: Option<Duration>) -> Result<Option<Event>> {
        self.inner.pop_event(name, timeout).await
    }

    /// Waits up to `timeout` for the queue of `name` to exist.
    ///
    /// Returns `Ok(None)` on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if the dispatcher is not running or
    /// stops while waiting.
    pub async fn get_queue(&self, name: &str, timeout: Option<Duration>) -> Result<Option<EventQueue>> {
        self.inner.get_queue(name, timeout).await
    }

    /// Pops one event from each queue whose name contains `partial_name`,
    /// ignoring case.
    ///
    /// Waits until at least one such event is available or `timeout` has
    /// elapsed since the call.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalState`] if the dispatcher is not running or stops
    ///   while waiting
    /// - [`Error::EmptyResult`] if nothing matched before the deadline
    pub async fn pop_events(&self, partial_name: &str, timeout: Duration) -> Result<Vec<Event>> {
        let run = self.inner.current_pool("popping")?.token();
        let events = until_stopped(
            &run,
            self.inner
                .store
                .wait_pop_matching(partial_name, Some(timeout)),
        )
        .await?;
        if events.is_empty() {
            return Err(Error::EmptyResult(partial_name.to_string()));
        }
        Ok(events)
    }

    /// Removes and returns every buffered event named `name`, oldest first.
    ///
    /// Never waits. Unknown names yield an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if the dispatcher is not running.
    pub fn pop_all(&self, name: &str) -> Result<Vec<Event>> {
        self.inner.ensure_running("popping")?;
        Ok(self.inner.store.drain(name))
    }

    /// Handles one event of `name` on a worker.
    ///
    /// The task waits for the precondition in `options` (if any), pops one
    /// event as [`pop_event`](Self::pop_event) does with
    /// `options.event_timeout`, and calls `handler(event, user_args)`. The
    /// returned handle resolves to the handler's output, to
    /// [`Error::TimedOut`] if no event arrived, to [`Error::Handler`] if
    /// the handler failed, or to [`Error::IllegalState`] if the dispatcher
    /// stopped before the event arrived. Dropping the handle detaches the
    /// task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if the dispatcher is not running.
    pub fn handle_event<H, Fut, A, R>(
        &self,
        handler: H,
        name: &str,
        user_args: A,
        options: HandleOptions,
    ) -> Result<TaskHandle<R>>
    where
        H: FnOnce(Event, A) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<R, BoxError>> + Send + 'static,
        A: Send + 'static,
        R: Send + 'static,
    {
        let pool = self.inner.current_pool("handling events")?;
        let run = pool.token();
        let inner = Arc::clone(&self.inner);
        let name = name.to_string();

        pool.submit(async move {
            if let Some((signal, timeout)) = options.precondition
                && !until_stopped(&run, signal.wait(timeout)).await?
            {
                tracing::debug!(event = %name, "Precondition not met in time, continuing");
            }

            let event = until_stopped(&run, inner.pop_event(&name, options.event_timeout))
                .await??
                .ok_or_else(|| Error::TimedOut(options.event_timeout.unwrap_or_default()))?;

            // Once the event is in hand a stop no longer cuts the task short.
            drop(inner);
            handler(event, user_args).await.map_err(Error::Handler)
        })
    }

    /// Discards every buffered event. Allowed in any state.
    pub fn clear_all_events(&self) {
        self.inner.store.clear();
    }
}

impl<S: EventSource> Drop for EventDispatcher<S> {
    fn drop(&mut self) {
        self.inner.halt(StopReason::Requested, None);
    }
}

impl<S: EventSource> std::fmt::Debug for EventDispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<S: EventSource> Inner<S> {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn ensure_running(&self, action: &str) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(Error::IllegalState(format!(
                "dispatcher needs to be started before {action}"
            )))
        }
    }

    fn current_pool(&self, action: &str) -> Result<Arc<WorkerPool>> {
        self.ensure_running(action)?;
        self.pool.lock().clone().ok_or_else(|| {
            Error::IllegalState(format!("dispatcher needs to be started before {action}"))
        })
    }

    async fn get_queue(&self, name: &str, timeout: Option<Duration>) -> Result<Option<EventQueue>> {
        let run = self.current_pool("popping")?.token();
        let exists = until_stopped(&run, self.store.wait_for_queue(name, timeout)).await?;
        Ok(exists.then(|| EventQueue::new(name, Arc::clone(&self.store))))
    }

    async fn pop_event(&self, name: &str, timeout: Option<Duration>) -> Result<Option<Event>> {
        let run = self.current_pool("popping")?.token();
        until_stopped(&run, async {
            if !self.store.wait_for_queue(name, timeout).await {
                return None;
            }
            // The full timeout applies again once the queue exists.
            self.store.wait_pop(name, timeout).await
        })
        .await
    }

    /// Moves the dispatcher to the stopped state.
    ///
    /// With `run` set, only halts if that pool still belongs to the current
    /// run, so a poller of an earlier run cannot stop a later one. Returns
    /// `false` if nothing was halted.
    fn halt(&self, reason: StopReason, run: Option<&Arc<WorkerPool>>) -> bool {
        let pool = {
            let mut slot = self.pool.lock();
            if let Some(run) = run
                && !is_current_run(slot.as_ref(), run)
            {
                return false;
            }
            if !self.running.swap(false, Ordering::AcqRel) {
                return false;
            }
            // Cleared under the lock: the poller pushes under it too.
            self.store.clear();
            slot.take()
        };

        if let Some(pool) = pool {
            pool.shutdown();
        }

        tracing::info!(dispatcher = %self.id, reason = ?reason, "Event dispatcher stopped");
        self.lifecycle
            .publish(LifecycleEvent::stopped(self.id, reason));
        true
    }
}

/// Returns `true` if `run` is the pool of the run in progress.
fn is_current_run(slot: Option<&Arc<WorkerPool>>, run: &Arc<WorkerPool>) -> bool {
    slot.is_some_and(|current| Arc::ptr_eq(current, run))
}

/// Runs `wait` unless the run owning `run` ends first.
async fn until_stopped<T>(run: &CancellationToken, wait: impl Future<Output = T>) -> Result<T> {
    tokio::select! {
        biased;
        () = run.cancelled() => Err(Error::IllegalState(
            "dispatcher stopped while waiting".to_string(),
        )),
        done = wait => Ok(done),
    }
}
