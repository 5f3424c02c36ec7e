// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registered event handlers.
//!
//! A handler intercepts every event of one name: the poller hands such
//! events to the handler instead of buffering them. Handlers are async
//! closures; the arguments bound at registration are cloned into every
//! invocation.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{BoxError, Error};
use crate::event::Event;

/// Future returned by a registered handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

/// Type-erased handler with its bound arguments already captured.
type Callback = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// One registered handler.
#[derive(Clone)]
pub(crate) struct HandlerEntry {
    name: String,
    callback: Callback,
}

impl HandlerEntry {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Starts one invocation of the handler.
    pub(crate) fn invoke(&self, event: Event) -> HandlerFuture {
        (self.callback)(event)
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registry mapping event names to their handler.
///
/// At most one handler exists per name. The dispatcher only allows
/// registration while stopped, so the poller reads a map that never changes
/// under it.
#[derive(Debug, Default)]
pub(crate) struct HandlerRegistry {
    handlers: RwLock<HashMap<String, HandlerEntry>>,
}

impl HandlerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for events named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateHandler`] if `name` already has a handler;
    /// the existing one is left untouched.
    pub(crate) fn register<F, Fut, A>(&self, name: &str, callback: F, args: A) -> Result<(), Error>
    where
        F: Fn(Event, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
        A: Clone + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write();
        if handlers.contains_key(name) {
            return Err(Error::DuplicateHandler(name.to_string()));
        }

        let callback: Callback =
            Arc::new(move |event: Event| Box::pin(callback(event, args.clone())) as HandlerFuture);
        handlers.insert(
            name.to_string(),
            HandlerEntry {
                name: name.to_string(),
                callback,
            },
        );
        Ok(())
    }

    /// Returns the handler for `name`, if any.
    pub(crate) fn get(&self, name: &str) -> Option<HandlerEntry> {
        self.handlers.read().get(name).cloned()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    /// Returns the registered names, sorted.
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }
}
