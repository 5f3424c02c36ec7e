// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event types.
//!
//! [`Event`] is the named message polled from a device. The remaining types
//! describe the dispatcher itself: [`DispatcherId`] tags one instance, and
//! [`LifecycleBus`] broadcasts its [`LifecycleEvent`]s so that a consumer
//! can notice when the poller stopped the dispatcher on a source failure.
//!
//! # Examples
//!
//! ```
//! use evdispatch::event::{DispatcherId, LifecycleBus, LifecycleEvent};
//!
//! let bus = LifecycleBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(LifecycleEvent::started(DispatcherId::new()));
//! assert!(rx.try_recv().is_ok());
//! ```

mod dispatcher_id;
mod event_bus;
mod lifecycle;
mod record;

pub use dispatcher_id::DispatcherId;
pub(crate) use event_bus::DEFAULT_LIFECYCLE_CAPACITY;
pub use event_bus::LifecycleBus;
pub use lifecycle::{LifecycleEvent, StopReason};
pub use record::Event;
