//! # Diagnostics bus.
//!
//! [`Bus`] is a thin wrapper around a non-replaying
//! [`BroadcastLatest`](crate::BroadcastLatest) that lets the registry and the
//! tag channel report what they do without knowing who listens.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                    Subscribers (any):
//!   LifecycleRegistry ──┐
//!   Manager cleanup   ──┼──────► Bus ──────► LogWriter
//!   TagCancelChannel  ──┘  (Replay::Off)    user sinks
//! ```
//!
//! ## Rules
//! - **Synchronous fan-out**: events are delivered on the publishing thread.
//! - **No persistence**: events are lost if nobody listens at publish time.
//! - **Lazy construction**: [`Bus::publish_with`] skips building the event
//!   when there are no subscribers.

use super::event::Event;
use crate::channel::{BroadcastLatest, Replay, Sink, Subscription};

/// Fan-out channel for diagnostics events.
///
/// ### Properties
/// - **Non-blocking**: `publish()` never waits for a lock held across a sink call.
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: clones share the same subscribers.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: BroadcastLatest<Event>,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            tx: BroadcastLatest::builder().replay(Replay::Off).build(),
        }
    }

    /// Publishes an event to all current subscribers.
    pub fn publish(&self, ev: Event) {
        self.tx.publish(ev);
    }

    /// Builds and publishes an event only if someone listens.
    #[inline]
    pub fn publish_with<F>(&self, make: F)
    where
        F: FnOnce() -> Event,
    {
        if self.tx.has_subscribers() {
            self.tx.publish(make());
        }
    }

    /// Subscribes `sink` to events published from now on.
    ///
    /// Dropping the returned handle unsubscribes.
    pub fn subscribe<S>(&self, sink: S) -> Subscription<Event>
    where
        S: Sink<Event, std::convert::Infallible>,
    {
        self.tx.subscribe(sink)
    }

    /// Returns `true` if at least one subscriber is attached.
    pub fn has_subscribers(&self) -> bool {
        self.tx.has_subscribers()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Notification;
    use crate::events::EventKind;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_publish_with_skips_without_subscribers() {
        let bus = Bus::new();
        let mut built = false;
        bus.publish_with(|| {
            built = true;
            Event::new(EventKind::TagSent)
        });
        assert!(!built);
    }

    #[test]
    fn test_subscriber_sees_only_later_events() {
        let bus = Bus::new();
        bus.publish(Event::new(EventKind::ManagerCreated));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = bus.subscribe(move |n: Notification<Event>| {
            if let Notification::Next(ev) = n {
                s.lock().push(ev.kind);
            }
        });
        bus.publish_with(|| Event::new(EventKind::TagSent));

        assert_eq!(*seen.lock(), vec![EventKind::TagSent]);
    }
}
