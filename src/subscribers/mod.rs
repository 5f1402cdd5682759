//! # Built-in diagnostics sinks.
//!
//! Anything implementing [`Sink<Event>`](crate::Sink) can listen on a
//! [`Bus`](crate::Bus); this module ships the reference one.
//!
//! ## Architecture
//! ```text
//! Registry / TagCancelChannel ── publish(Event) ──► Bus ──► LogWriter ──► tracing
//!                                                      └──► custom sinks
//! ```
//!
//! ## Implementing custom sinks
//! ```no_run
//! use lifebind::{Event, EventKind, LifecycleRegistry, Notification};
//!
//! let registry = LifecycleRegistry::new();
//! let _sub = registry.bus().map(|bus| {
//!     bus.subscribe(|n: Notification<Event>| {
//!         if let Notification::Next(ev) = n {
//!             if ev.kind == EventKind::BindRejected {
//!                 // count rejected binds
//!             }
//!         }
//!     })
//! });
//! ```

mod log;

pub use log::LogWriter;
