//! # lifebind
//!
//! **lifebind** ties the lifetime of background work to the lifecycle of the
//! component that requested it.
//!
//! It provides a lock-free replay-latest broadcast channel, a keyed registry
//! that keeps exactly one lifecycle manager per owner, and single-shot cancel
//! signals derived from lifecycle events or string tags.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐        ┌──────────────┐
//!     │    owner     │        │    owner     │   (external: emits Create .. Destroy)
//!     │  "screen-1"  │        │  "screen-2"  │
//!     └──────┬───────┘        └──────┬───────┘
//!            ▼ observer              ▼ observer
//! ┌───────────────────────────────────────────────────────────────┐
//! │  LifecycleRegistry (DashMap<OwnerKey, Manager>)               │
//! │  - Manager: BroadcastLatest<LifecycleEvent> + tri-state guard │
//! │  - removed once the owner is destroyed and nobody is bound    │
//! └──────┬──────────────────────────────────┬─────────────────────┘
//!        ▼ EventGate (target event)         ▼ EventGate
//!   ┌──────────────┐                   ┌──────────────┐
//!   │ CancelSignal │                   │ CancelSignal │ ──► run_until / spawn / token
//!   └──────────────┘                   └──────────────┘
//!
//! ┌───────────────────────────────────────────────────────────────┐
//! │  TagCancelChannel (BroadcastLatest<Arc<str>>, no replay)      │
//! │  bind_filter_tag("t") ──► CancelSignal, cancelled by the next │
//! │  bind or send of "t"                                          │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Binding
//! ```text
//! bind_until_event(owner, Pause)
//!   ├─ owner has no lifecycle / is destroyed ─► already-fired signal (Rejected)
//!   ├─ manager for owner.key()  (created on first bind, observed once)
//!   ├─ gate subscribed: replays the latest event, then live events
//!   └─ fires once: Event(Pause) | Closed (owner destroyed first)
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types                                  |
//! |-------------------|----------------------------------------------------------|--------------------------------------------|
//! | **Channel**       | Lock-free multicast, replay-latest, one-shot terminal.   | [`BroadcastLatest`], [`Sink`]              |
//! | **Lifecycle**     | Owner contract and a reference dispatcher.               | [`LifecycleOwner`], [`OwnerLifecycle`]     |
//! | **Registry**      | One manager per owner key, CAS-guarded cleanup.          | [`LifecycleRegistry`]                      |
//! | **Signals**       | Single-shot cancellation bridged to tokio.               | [`CancelSignal`], [`TagCancelChannel`]     |
//! | **Errors**        | Typed bind failures and cancellation reasons.            | [`BindError`], [`Cancelled`]               |
//! | **Diagnostics**   | Registry and tag events on a bus.                        | [`Bus`], [`Event`]                         |
//! | **Configuration** | Tag policy, sharding, diagnostics switch.                | [`Config`]                                 |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use lifebind::{BasicOwner, Cancelled, LifecycleEvent};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let owner = BasicOwner::new("screen-1");
//!     owner.advance(&[LifecycleEvent::Create, LifecycleEvent::Start, LifecycleEvent::Resume]);
//!
//!     // stop polling as soon as the screen pauses
//!     let signal = lifebind::bind_until_event(&owner, LifecycleEvent::Pause);
//!     let poller = signal.spawn(async {
//!         loop {
//!             tokio::time::sleep(Duration::from_millis(5)).await;
//!         }
//!     });
//!
//!     owner.handle_event(LifecycleEvent::Pause);
//!     let res: Result<(), Cancelled> = poller.await.expect("poller panicked");
//!     assert_eq!(res, Err(Cancelled::Event(LifecycleEvent::Pause)));
//! }
//! ```
mod channel;
mod core;
mod error;
mod events;
mod lifecycle;
mod signal;

// ---- Public re-exports ----

pub use channel::{
    BroadcastLatest, ChannelBuilder, Disposable, Notification, Replay, Sink, Subscription,
};
pub use crate::core::{Config, LifecycleRegistry, TagPolicy};
pub use error::{BindError, Cancelled};
pub use events::{Bus, Event, EventKind};
pub use lifecycle::{
    BasicOwner, Lifecycle, LifecycleEvent, LifecycleObserver, LifecycleOwner, LifecycleState,
    OwnerKey, OwnerLifecycle,
};
pub use signal::{CancelSignal, TagCancelChannel};

// Optional: expose a simple built-in logger sink (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
mod subscribers;
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;

// ---- Process-wide shortcuts ----

/// Binds `owner` on the process-wide [`LifecycleRegistry`].
pub fn bind_until_event<O>(owner: &std::sync::Arc<O>, event: LifecycleEvent) -> CancelSignal
where
    O: LifecycleOwner,
{
    LifecycleRegistry::global().bind_until_event(owner, event)
}

/// Binds `tag` on the process-wide [`TagCancelChannel`].
pub fn bind_filter_tag(tag: &str) -> CancelSignal {
    TagCancelChannel::global().bind_filter_tag(tag)
}

/// Sends `tag` on the process-wide [`TagCancelChannel`].
pub fn send_filter_tag(tag: &str) -> bool {
    TagCancelChannel::global().send_filter_tag(tag)
}
