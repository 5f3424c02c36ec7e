// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-name event queues.
//!
//! Every event without a registered handler lands in the FIFO queue named
//! after it. Queues are created the first time a name is seen and are only
//! destroyed all at once, by `clear`.
//!
//! All queues sit behind one coarse lock. Waiters park on a single
//! [`Notify`] that fires on every push and clear, then re-check the state
//! they are interested in.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::event::Event;

type Queues = BTreeMap<String, VecDeque<Event>>;

/// Storage for all per-name queues of one dispatcher.
#[derive(Debug, Default)]
pub(crate) struct EventQueueStore {
    queues: Mutex<Queues>,
    changed: Notify,
}

impl EventQueueStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends an event to its queue, creating the queue if needed.
    pub(crate) fn push(&self, event: Event) {
        {
            let mut queues = self.queues.lock();
            queues
                .entry(event.name().to_string())
                .or_default()
                .push_back(event);
        }
        self.changed.notify_waiters();
    }

    /// Returns `true` if a queue exists for `name`.
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.queues.lock().contains_key(name)
    }

    /// Returns the number of buffered events for `name`.
    pub(crate) fn len(&self, name: &str) -> usize {
        self.queues.lock().get(name).map_or(0, VecDeque::len)
    }

    /// Returns the names of all existing queues, sorted.
    pub(crate) fn names(&self) -> Vec<String> {
        self.queues.lock().keys().cloned().collect()
    }

    /// Pops the oldest event for `name` without waiting.
    pub(crate) fn try_pop(&self, name: &str) -> Option<Event> {
        self.queues.lock().get_mut(name)?.pop_front()
    }

    /// Removes and returns every buffered event for `name`.
    ///
    /// The queue itself stays in place.
    pub(crate) fn drain(&self, name: &str) -> Vec<Event> {
        self.queues
            .lock()
            .get_mut(name)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    /// Destroys every queue.
    pub(crate) fn clear(&self) {
        self.queues.lock().clear();
        self.changed.notify_waiters();
    }

    /// Waits for a queue named `name` to exist.
    ///
    /// Returns `false` if `timeout` elapsed first. `None` waits forever.
    pub(crate) async fn wait_for_queue(&self, name: &str, timeout: Option<Duration>) -> bool {
        self.wait_until(timeout, |queues| queues.contains_key(name).then_some(()))
            .await
            .is_some()
    }

    /// Waits for an event named `name` and pops it.
    pub(crate) async fn wait_pop(&self, name: &str, timeout: Option<Duration>) -> Option<Event> {
        self.wait_until(timeout, |queues| queues.get_mut(name)?.pop_front())
            .await
    }

    /// Pops one event from every non-empty queue whose name contains
    /// `partial`, ignoring case.
    ///
    /// Waits until at least one event is collected. Returns an empty vector
    /// on timeout.
    pub(crate) async fn wait_pop_matching(
        &self,
        partial: &str,
        timeout: Option<Duration>,
    ) -> Vec<Event> {
        let needle = partial.to_lowercase();
        self.wait_until(timeout, |queues| {
            let found = pop_matching_in(queues, &needle);
            (!found.is_empty()).then_some(found)
        })
        .await
        .unwrap_or_default()
    }

    async fn wait_until<T>(
        &self,
        timeout: Option<Duration>,
        mut check: impl FnMut(&mut Queues) -> Option<T>,
    ) -> Option<T> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            // Register interest before checking so a push between the check
            // and the await still wakes us.
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let found = {
                let mut queues = self.queues.lock();
                check(&mut *queues)
            };
            if found.is_some() {
                return found;
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return None;
                    }
                }
                None => notified.await,
            }
        }
    }
}

fn pop_matching_in(queues: &mut Queues, needle: &str) -> Vec<Event> {
    queues
        .iter_mut()
        .filter(|(name, _)| name.to_lowercase().contains(needle))
        .filter_map(|(_, queue)| queue.pop_front())
        .collect()
}

/// Handle to the queue of one event name.
///
/// Obtained from
/// [`EventDispatcher::get_queue`](crate::EventDispatcher::get_queue). The
/// handle stays valid after the dispatcher clears its queues; it then simply
/// observes an empty queue until events of that name arrive again.
#[derive(Debug, Clone)]
pub struct EventQueue {
    name: String,
    store: Arc<EventQueueStore>,
}

impl EventQueue {
    pub(crate) fn new(name: impl Into<String>, store: Arc<EventQueueStore>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    /// Returns the event name this queue buffers.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len(&self.name)
    }

    /// Returns `true` if no event is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pops the oldest event without waiting.
    #[must_use]
    pub fn try_pop(&self) -> Option<Event> {
        self.store.try_pop(&self.name)
    }

    /// Pops the oldest event, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` on timeout. `None` as timeout waits forever.
    pub async fn pop(&self, timeout: Option<Duration>) -> Option<Event> {
        self.store.wait_pop(&self.name, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: &str, n: i64) -> Event {
        Event::new(name, json!(n))
    }

    #[test]
    fn push_creates_queue_lazily() {
        let store = EventQueueStore::new();
        assert!(!store.contains("scan"));
        store.push(event("scan", 1));
        assert!(store.contains("scan"));
        assert_eq!(store.len("scan"), 1);
    }

    #[test]
    fn try_pop_is_fifo() {
        let store = EventQueueStore::new();
        for n in 1..=3 {
            store.push(event("scan", n));
        }
        let popped: Vec<_> = std::iter::from_fn(|| store.try_pop("scan"))
            .map(Event::into_payload)
            .collect();
        assert_eq!(popped, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn drain_keeps_queue() {
        let store = EventQueueStore::new();
        store.push(event("a", 1));
        store.push(event("a", 2));
        assert_eq!(store.drain("a").len(), 2);
        assert!(store.contains("a"));
        assert!(store.drain("unknown").is_empty());
    }

    #[tokio::test]
    async fn pop_matching_takes_one_per_queue_ignoring_case() {
        let store = EventQueueStore::new();
        store.push(event("foo_bar", 1));
        store.push(event("foo_bar", 2));
        store.push(event("FOO_baz", 3));
        store.push(event("baz", 4));

        let popped = store.wait_pop_matching("Foo", Some(Duration::ZERO)).await;
        assert_eq!(popped.len(), 2);
        assert!(popped.iter().all(|e| e.name().to_lowercase().contains("foo")));
        assert_eq!(store.len("foo_bar"), 1);
        assert_eq!(store.len("baz"), 1);
    }

    #[tokio::test]
    async fn pop_matching_skips_empty_queues() {
        let store = EventQueueStore::new();
        store.push(event("foo", 1));
        let _ = store.try_pop("foo");
        let popped = store.wait_pop_matching("foo", Some(Duration::ZERO)).await;
        assert!(popped.is_empty());
    }

    #[test]
    fn clear_removes_all_queues() {
        let store = EventQueueStore::new();
        store.push(event("a", 1));
        store.push(event("b", 1));
        store.clear();
        assert!(store.names().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_queue_times_out() {
        let store = EventQueueStore::new();
        let start = Instant::now();
        assert!(!store.wait_for_queue("never", Some(Duration::from_secs(3))).await);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_pop_wakes_on_push() {
        let store = Arc::new(EventQueueStore::new());
        let producer = Arc::clone(&store);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            producer.push(event("late", 9));
        });

        let popped = store.wait_pop("late", Some(Duration::from_secs(5))).await;
        assert_eq!(popped.map(Event::into_payload), Some(json!(9)));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_pop_matching_returns_empty_on_timeout() {
        let store = EventQueueStore::new();
        store.push(event("other", 1));
        let popped = store
            .wait_pop_matching("scan", Some(Duration::from_secs(1)))
            .await;
        assert!(popped.is_empty());
        assert_eq!(store.len("other"), 1);
    }

    #[tokio::test]
    async fn queue_handle_pops_through_store() {
        let store = Arc::new(EventQueueStore::new());
        store.push(event("q", 1));
        let queue = EventQueue::new("q", Arc::clone(&store));
        assert_eq!(queue.len(), 1);
        assert!(queue.pop(Some(Duration::ZERO)).await.is_some());
        assert!(queue.is_empty());
        assert!(queue.try_pop().is_none());
    }
}
