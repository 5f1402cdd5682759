//! # Lock-free replay-latest broadcast channel.
//!
//! [`BroadcastLatest`] multicasts values to any number of [`Sink`]s. New
//! subscribers first receive the most recently published value (if any), then
//! every value published afterwards. A terminal (error or completion) closes the
//! channel for good.
//!
//! ## Architecture
//! ```text
//!                 snapshot: ArcSwap<{revision, current}>   (CAS per publish)
//! publish(v) ──►  subscribers: ArcSwap<[Slot, Slot, ...]> (copy-on-write)
//!                     │
//!                     ├──► slot 1 ──► sink 1
//!                     └──► slot N ──► sink N
//! ```
//!
//! ## Rules
//! - **One terminal**: the first `error`/`complete` wins; later calls and all
//!   later `publish` calls are silent no-ops returning `false`.
//! - **Replay**: `subscribe` registers first, then reads the snapshot, so a
//!   concurrent publish is either replayed or delivered, never lost.
//! - **Ordering**: each slot releases notifications in revision order, even
//!   when several threads publish at once.
//! - **No global lock**: structural changes are CAS retry loops over immutable
//!   snapshots; the only lock is each slot's short internal critical section.
//! - **Closed sentinel**: after the terminal the subscriber array is frozen and
//!   marked terminated; it reports zero live subscribers and accepts no more.

use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{Ordering, fence};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;

use super::Replay;
use super::notification::{Current, Notification, Snapshot};
use super::sink::{Disposable, Sink};
use super::slot::Slot;

type IdleHook = Box<dyn Fn() + Send + Sync>;

/// Immutable subscriber array; replaced wholesale on every structural change.
struct Subscribers<T, E> {
    slots: Vec<Arc<Slot<T, E>>>,
    terminated: bool,
}

impl<T, E> Subscribers<T, E> {
    fn live(&self) -> usize {
        if self.terminated { 0 } else { self.slots.len() }
    }
}

struct Shared<T, E> {
    snapshot: ArcSwap<Snapshot<T, E>>,
    subscribers: ArcSwap<Subscribers<T, E>>,
    replay: Replay,
    on_idle: Option<IdleHook>,
}

impl<T: Clone, E: Clone> Shared<T, E> {
    /// Installs `notification` as the next revision unless already terminal.
    fn advance(&self, notification: &Notification<T, E>) -> Option<u64> {
        loop {
            let cur = self.snapshot.load();
            if cur.is_terminal() {
                return None;
            }
            let next = Arc::new(cur.advance(notification));
            let revision = next.revision;
            let prev = self.snapshot.compare_and_swap(&*cur, next);
            if Arc::ptr_eq(&*prev, &*cur) {
                return Some(revision);
            }
        }
    }
}

impl<T, E> Shared<T, E> {
    /// Adds `slot` to the live array. Returns `false` once terminated.
    fn insert(&self, slot: &Arc<Slot<T, E>>) -> bool {
        loop {
            let cur = self.subscribers.load();
            if cur.terminated {
                return false;
            }
            let mut slots = Vec::with_capacity(cur.slots.len() + 1);
            slots.extend(cur.slots.iter().cloned());
            slots.push(Arc::clone(slot));
            let next = Arc::new(Subscribers {
                slots,
                terminated: false,
            });
            let prev = self.subscribers.compare_and_swap(&*cur, next);
            if Arc::ptr_eq(&*prev, &*cur) {
                return true;
            }
        }
    }

    /// Removes `slot` from the live array, firing the idle hook on the
    /// transition to zero.
    fn remove(&self, slot: &Arc<Slot<T, E>>) {
        let emptied = loop {
            let cur = self.subscribers.load();
            if cur.terminated {
                return;
            }
            let Some(idx) = cur.slots.iter().position(|s| Arc::ptr_eq(s, slot)) else {
                return;
            };
            let mut slots = Vec::with_capacity(cur.slots.len() - 1);
            slots.extend(cur.slots[..idx].iter().cloned());
            slots.extend(cur.slots[idx + 1..].iter().cloned());
            let emptied = slots.is_empty();
            let next = Arc::new(Subscribers {
                slots,
                terminated: false,
            });
            let prev = self.subscribers.compare_and_swap(&*cur, next);
            if Arc::ptr_eq(&*prev, &*cur) {
                break emptied;
            }
        };
        if emptied {
            self.idle();
        }
    }

    /// Freezes the array as terminated and returns the slots that were live.
    fn freeze(&self) -> Arc<Subscribers<T, E>> {
        loop {
            let cur = self.subscribers.load_full();
            if cur.terminated {
                return cur;
            }
            let next = Arc::new(Subscribers {
                slots: cur.slots.clone(),
                terminated: true,
            });
            let prev = self.subscribers.compare_and_swap(&cur, next);
            if Arc::ptr_eq(&*prev, &cur) {
                return cur;
            }
        }
    }

    fn idle(&self) {
        if let Some(hook) = &self.on_idle {
            hook();
        }
    }
}

/// Replay-latest multicast channel with one-shot terminal semantics.
///
/// Cheap to clone; clones share the same channel.
///
/// ### Properties
/// - **Lock-free publish/subscribe**: CAS over `arc_swap` snapshots.
/// - **Replay-latest**: a new subscriber gets the stored value first
///   (configurable via [`Replay`]).
/// - **Unbounded per-slot buffering**: a slot busy delivering queues new values
///   instead of blocking the publisher.
///
/// ### Example
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use lifebind::{BroadcastLatest, Notification};
///
/// let ch: BroadcastLatest<u32> = BroadcastLatest::new();
/// ch.publish(1);
/// ch.publish(2);
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let s = Arc::clone(&seen);
/// let _sub = ch.subscribe(move |n: Notification<u32>| s.lock().unwrap().push(n));
///
/// ch.publish(3);
/// ch.complete();
/// assert_eq!(
///     *seen.lock().unwrap(),
///     vec![Notification::Next(2), Notification::Next(3), Notification::Completed]
/// );
/// ```
pub struct BroadcastLatest<T, E = Infallible> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for BroadcastLatest<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> Default for BroadcastLatest<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> BroadcastLatest<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates an empty channel that replays the latest value.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a channel already holding `value`.
    pub fn with_value(value: T) -> Self {
        Self::builder().initial(value).build()
    }

    /// Starts a [`ChannelBuilder`].
    pub fn builder() -> ChannelBuilder<T, E> {
        ChannelBuilder {
            initial: None,
            replay: Replay::Latest,
            on_idle: None,
            _error: PhantomData,
        }
    }

    /// Publishes `value` to every live subscriber.
    ///
    /// Returns `false` (and does nothing) once the channel is terminated.
    pub fn publish(&self, value: T) -> bool {
        let notification = Notification::Next(value);
        let Some(revision) = self.shared.advance(&notification) else {
            return false;
        };
        fence(Ordering::SeqCst);
        let subs = self.shared.subscribers.load_full();
        for slot in &subs.slots {
            slot.offer(revision, notification.clone());
        }
        true
    }

    /// Terminates the channel with `error`. Returns `false` if already terminal.
    pub fn error(&self, error: E) -> bool {
        self.terminate(Notification::Error(error))
    }

    /// Completes the channel. Returns `false` if already terminal.
    pub fn complete(&self) -> bool {
        self.terminate(Notification::Completed)
    }

    /// Delivers a terminal notification; a [`Notification::Next`] is published
    /// as a value instead.
    pub fn terminate(&self, notification: Notification<T, E>) -> bool {
        if let Notification::Next(v) = notification {
            return self.publish(v);
        }
        let Some(revision) = self.shared.advance(&notification) else {
            return false;
        };
        fence(Ordering::SeqCst);
        let prev = self.shared.freeze();
        for slot in &prev.slots {
            slot.offer(revision, notification.clone());
        }
        if !prev.slots.is_empty() {
            self.shared.idle();
        }
        true
    }

    /// Subscribes `sink`.
    ///
    /// - Live channel: registers the slot, then replays the stored value.
    /// - Terminated channel: delivers the stored terminal only; nothing is
    ///   registered and the returned handle is already disposed.
    pub fn subscribe<S>(&self, sink: S) -> Subscription<T, E>
    where
        S: Sink<T, E>,
    {
        let slot = Arc::new(Slot::new(Box::new(sink)));
        let registered = self.shared.insert(&slot);
        fence(Ordering::SeqCst);
        let snapshot = self.shared.snapshot.load_full();
        slot.emit_first(&snapshot, self.shared.replay);
        if !registered {
            slot.cancel();
        }
        Subscription {
            slot,
            channel: Arc::downgrade(&self.shared),
        }
    }

    /// Stored value, if the last accepted signal was a value.
    pub fn value(&self) -> Option<T> {
        match &self.shared.snapshot.load().current {
            Current::Value(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Stored error, if the channel terminated with one.
    pub fn error_value(&self) -> Option<E> {
        match &self.shared.snapshot.load().current {
            Current::Error(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// Returns `true` if the channel completed normally.
    pub fn is_completed(&self) -> bool {
        matches!(self.shared.snapshot.load().current, Current::Completed)
    }

    /// Returns `true` once any terminal was accepted.
    pub fn is_terminated(&self) -> bool {
        self.shared.snapshot.load().is_terminal()
    }

    /// Revision of the stored signal (`0` before the first publish).
    pub fn revision(&self) -> u64 {
        self.shared.snapshot.load().revision
    }

    /// Number of live subscribers (always `0` once terminated).
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.load().live()
    }

    /// Returns `true` if at least one subscriber is live.
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() != 0
    }

    /// Returns `true` if both handles point at the same channel.
    pub fn same_channel(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T, E> fmt::Debug for BroadcastLatest<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snap = self.shared.snapshot.load();
        f.debug_struct("BroadcastLatest")
            .field("revision", &snap.revision)
            .field(
                "terminated",
                &matches!(snap.current, Current::Error(_) | Current::Completed),
            )
            .field("subscribers", &self.shared.subscribers.load().live())
            .field("replay", &self.shared.replay)
            .finish()
    }
}

/// Builder for [`BroadcastLatest`].
pub struct ChannelBuilder<T, E> {
    initial: Option<T>,
    replay: Replay,
    on_idle: Option<IdleHook>,
    _error: PhantomData<fn() -> E>,
}

impl<T, E> ChannelBuilder<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Stores `value` before any subscriber arrives.
    pub fn initial(mut self, value: T) -> Self {
        self.initial = Some(value);
        self
    }

    /// Sets what new subscribers receive first.
    pub fn replay(mut self, replay: Replay) -> Self {
        self.replay = replay;
        self
    }

    /// Callback run whenever the live-subscriber count drops to zero
    /// (last unsubscribe, or termination with subscribers present).
    ///
    /// Runs on the thread that caused the transition; keep it short.
    pub fn on_idle<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_idle = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> BroadcastLatest<T, E> {
        let snapshot = match self.initial {
            Some(v) => Snapshot::with_value(v),
            None => Snapshot::empty(),
        };
        BroadcastLatest {
            shared: Arc::new(Shared {
                snapshot: ArcSwap::from_pointee(snapshot),
                subscribers: ArcSwap::from_pointee(Subscribers {
                    slots: Vec::new(),
                    terminated: false,
                }),
                replay: self.replay,
                on_idle: self.on_idle,
            }),
        }
    }
}

/// Handle to one subscription. Dropping it unsubscribes.
pub struct Subscription<T, E = Infallible> {
    slot: Arc<Slot<T, E>>,
    channel: Weak<Shared<T, E>>,
}

impl<T, E> Subscription<T, E> {
    /// Stops delivery and removes the slot from the channel. Idempotent.
    ///
    /// A delivery already running on another thread finishes first.
    pub fn unsubscribe(&self) {
        if self.slot.cancel() {
            if let Some(shared) = self.channel.upgrade() {
                shared.remove(&self.slot);
            }
        }
    }

    /// Returns `true` once unsubscribed or after a terminal was delivered.
    pub fn is_closed(&self) -> bool {
        self.slot.is_cancelled()
    }
}

impl<T, E> Disposable for Subscription<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn dispose(&self) {
        self.unsubscribe();
    }

    fn is_disposed(&self) -> bool {
        self.is_closed()
    }
}

impl<T, E> Drop for Subscription<T, E> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl<T, E> fmt::Debug for Subscription<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}
