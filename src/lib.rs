// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `evdispatch` - asynchronous event dispatcher for device test benches.
//!
//! A device under test emits named events (scan results, connection
//! changes, call state updates). This library polls them from an
//! [`EventSource`](source::EventSource), demultiplexes them into per-name
//! FIFO queues, and lets test code wait for them by exact or partial name.
//! Events that need an immediate reaction can instead be routed to a
//! registered handler that runs on a bounded worker pool.
//!
//! # Features
//!
//! - **Per-name queues**: created on first sight of a name, FIFO within a name
//! - **Handlers**: one async callback per name, fired without blocking polling
//! - **Waiting**: exact-name and case-insensitive partial-name pops with timeouts
//! - **Deferred handling**: wait for an event on a worker and inspect the outcome later
//! - **Fail-stop**: a broken event source stops the dispatcher and notifies subscribers
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//! use evdispatch::{Event, EventDispatcher};
//! use evdispatch::source::ChannelSource;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> evdispatch::Result<()> {
//! let (device, source) = ChannelSource::new();
//! let dispatcher = EventDispatcher::new(source);
//! dispatcher.start()?;
//!
//! device.send(Event::new("BleScan1onScanResults", json!({"rssi": -40})))?;
//! device.send(Event::new("BleScan2onScanResults", json!({"rssi": -70})))?;
//!
//! // One event from every queue whose name contains "onscan"
//! let results = dispatcher.pop_events("onscan", Duration::from_secs(5)).await?;
//! assert!(!results.is_empty());
//!
//! dispatcher.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Handlers
//!
//! ```
//! use evdispatch::{BoxError, Event, EventDispatcher};
//! use evdispatch::source::ChannelSource;
//!
//! async fn on_connection_lost(event: Event, device: String) -> Result<(), BoxError> {
//!     println!("{device} lost its connection: {}", event.payload());
//!     Ok(())
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> evdispatch::Result<()> {
//! let (_device, source) = ChannelSource::new();
//! let dispatcher = EventDispatcher::new(source);
//!
//! // Handlers must be registered before start()
//! dispatcher.register_handler("conn_lost", on_connection_lost, "phone-a".to_string())?;
//! dispatcher.start()?;
//! # dispatcher.stop();
//! # Ok(())
//! # }
//! ```

mod dispatcher;
pub mod error;
pub mod event;
mod handler;
pub mod pool;
mod signal;
pub mod source;
mod store;

pub use dispatcher::{
    DispatcherConfig, DispatcherConfigBuilder, DispatcherState, EventDispatcher, HandleOptions,
};
pub use error::{BoxError, Error, Result, SourceError};
pub use event::{DispatcherId, Event, LifecycleEvent, StopReason};
pub use handler::HandlerFuture;
pub use pool::TaskHandle;
pub use signal::Signal;
pub use store::EventQueue;
