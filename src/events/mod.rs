//! Diagnostics events: types and bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! observe what the registry and the tag channel do.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over a non-replaying broadcast channel
//!
//! ## Quick reference
//! - **Publishers**: `LifecycleRegistry` (bind/attach/reject), `Manager`
//!   (removal, deferred cleanup), `TagCancelChannel` (tag sent).
//! - **Consumers**: any [`Sink`](crate::Sink) of `Event`, e.g. `LogWriter`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
