//! # Per-owner lifecycle manager.
//!
//! A [`Manager`] observes one owner's lifecycle and republishes its events on a
//! replay-latest channel that gates subscribe to. It lives in the registry from
//! the first bind for its key until the owner is destroyed and nobody is bound.
//!
//! ## Architecture
//! ```text
//! owner lifecycle ──► Forwarder (current link only) ──► transition(event)
//!                                                        ├─ Create..Stop ─► channel.publish
//!                                                        └─ Destroy ──────► publish, complete,
//!                                                                           try_cleanup()
//! channel idle hook ─────────────────────────────────────────────────────► try_cleanup()
//! ```
//!
//! ## Rules
//! - `Destroy` is handled once, whoever feeds it (owner, binder re-check, dispatch).
//! - Cleanup runs only under the guard, after confirming the owner is destroyed
//!   and no gate is subscribed; it never waits for the guard.
//! - Removal from the registry map only removes this exact manager.
//! - Each owner link registers its own forwarder; events from an owner whose
//!   link was replaced are dropped.
//! - Events the owner replays while a forwarder registers are collapsed into
//!   the latest one before publishing.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use parking_lot::ReentrantMutex;

use super::guard::{Acquire, GuardHold, TriGuard};
use super::registry::Shared;
use crate::channel::BroadcastLatest;
use crate::events::{Event, EventKind};
use crate::lifecycle::{LifecycleEvent, LifecycleObserver, LifecycleOwner, OwnerKey, same_object};

/// Link to the owner being observed, plus the observer registered with it.
struct OwnerLink {
    owner: Weak<dyn LifecycleOwner>,
    observer: Arc<dyn LifecycleObserver>,
}

/// Observer registered with one owner; forwards only while its link is current.
struct Forwarder {
    manager: Weak<Manager>,
    link: Weak<OwnerLink>,
}

impl LifecycleObserver for Forwarder {
    fn on_lifecycle_event(&self, event: LifecycleEvent) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        let _feed = manager.feed.lock();
        if manager.is_current(&self.link) {
            manager.transition(event);
        }
    }
}

/// Catch-up bookkeeping while `observe` registers with an owner.
#[derive(Default)]
struct CatchUp {
    active: bool,
    last: Option<LifecycleEvent>,
}

/// Result of pointing a manager at an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    /// New owner stored; the caller must observe it.
    Fresh,
    /// Same owner, another binder is still observing it.
    Attaching,
    /// Same owner, already observed.
    Ready,
}

pub(crate) struct Manager {
    key: OwnerKey,
    channel: BroadcastLatest<LifecycleEvent>,
    owner: ArcSwapOption<OwnerLink>,
    pub(crate) guard: TriGuard,
    /// Serializes publishing with owner link changes. Reentrant because a
    /// sink may feed the manager again from inside a delivery.
    feed: ReentrantMutex<RefCell<CatchUp>>,
    /// Owner observed (latest event already published).
    attached: AtomicBool,
    destroyed: AtomicBool,
    /// A cleanup attempt found the guard busy.
    cleanup_pending: AtomicBool,
    me: Weak<Manager>,
    registry: Weak<Shared>,
}

impl Manager {
    pub(crate) fn new(key: OwnerKey, registry: Weak<Shared>) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Manager>| {
            let hook = Weak::clone(me);
            let channel = BroadcastLatest::builder()
                .on_idle(move || {
                    if let Some(manager) = hook.upgrade() {
                        manager.try_cleanup();
                    }
                })
                .build();
            Self {
                key,
                channel,
                owner: ArcSwapOption::empty(),
                guard: TriGuard::new(),
                feed: ReentrantMutex::new(RefCell::new(CatchUp::default())),
                attached: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
                cleanup_pending: AtomicBool::new(false),
                me: Weak::clone(me),
                registry,
            }
        })
    }

    #[inline]
    pub(crate) fn channel(&self) -> &BroadcastLatest<LifecycleEvent> {
        &self.channel
    }

    /// Lifecycle channel already terminated.
    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.channel.is_terminated()
    }

    /// Routes one lifecycle event.
    ///
    /// While an owner is being observed, non-terminal events are held back
    /// and only the last one is published once registration completes.
    pub(crate) fn transition(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Destroy => self.destroy(),
            LifecycleEvent::Create
            | LifecycleEvent::Start
            | LifecycleEvent::Resume
            | LifecycleEvent::Pause
            | LifecycleEvent::Stop => {
                let feed = self.feed.lock();
                {
                    let mut catch_up = feed.borrow_mut();
                    if catch_up.active {
                        catch_up.last = Some(event);
                        return;
                    }
                }
                self.channel.publish(event);
            }
        }
    }

    fn destroy(&self) {
        let feed = self.feed.lock();
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(key = %self.key, "owner destroyed");
        self.channel.publish(LifecycleEvent::Destroy);
        self.channel.complete();
        drop(feed);
        self.try_cleanup();
    }

    /// Returns `true` if `link` is the owner link currently stored.
    fn is_current(&self, link: &Weak<OwnerLink>) -> bool {
        self.owner
            .load()
            .as_ref()
            .is_some_and(|cur| std::ptr::eq(Arc::as_ptr(cur), link.as_ptr()))
    }

    /// Points the manager at `owner`. Must be called under the guard.
    pub(crate) fn link(&self, owner: &Arc<dyn LifecycleOwner>) -> Link {
        let _feed = self.feed.lock();
        let current = self.owner.load_full();
        if let Some(link) = current.as_ref() {
            if let Some(prev) = link.owner.upgrade() {
                if same_object(&prev, owner) {
                    return if self.attached.load(Ordering::Acquire) {
                        Link::Ready
                    } else {
                        Link::Attaching
                    };
                }
                tracing::warn!(key = %self.key, "owner key reused by a different live owner");
                Self::unobserve(&prev, link);
            }
        }
        self.attached.store(false, Ordering::Release);
        let me = Weak::clone(&self.me);
        let next = Arc::new_cyclic(|weak: &Weak<OwnerLink>| OwnerLink {
            owner: Arc::downgrade(owner),
            observer: Arc::new(Forwarder {
                manager: me,
                link: Weak::clone(weak),
            }),
        });
        self.owner.store(Some(next));
        Link::Fresh
    }

    /// Starts observing `owner`'s lifecycle. Called outside the guard after
    /// [`Link::Fresh`].
    ///
    /// The events replayed by the owner while registering are collapsed into
    /// the latest one, so gates never see stale history.
    pub(crate) fn observe(&self, owner: &Arc<dyn LifecycleOwner>) {
        let link = self.owner.load_full();
        let observer = link
            .as_ref()
            .filter(|l| l.owner.upgrade().is_some_and(|o| same_object(&o, owner)))
            .map(|l| Arc::clone(&l.observer));
        if let (Some(lifecycle), Some(observer)) = (owner.lifecycle(), observer) {
            self.feed.lock().borrow_mut().active = true;
            lifecycle.add_observer(observer);

            let feed = self.feed.lock();
            let last = {
                let mut catch_up = feed.borrow_mut();
                catch_up.active = false;
                catch_up.last.take()
            };
            if let Some(event) = last {
                self.channel.publish(event);
            }
            drop(feed);
            self.emit(|| Event::new(EventKind::OwnerAttached).with_key(self.key.clone()));
        }
        self.attached.store(true, Ordering::Release);
    }

    /// Clears and returns the "cleanup found the guard busy" flag.
    #[inline]
    pub(crate) fn take_cleanup_request(&self) -> bool {
        self.cleanup_pending.swap(false, Ordering::SeqCst)
    }

    fn unobserve(owner: &Arc<dyn LifecycleOwner>, link: &OwnerLink) {
        if let Some(lifecycle) = owner.lifecycle() {
            lifecycle.remove_observer(&link.observer);
        }
    }

    /// Owner was linked once and has been dropped since.
    fn owner_dropped(&self) -> bool {
        self.owner
            .load()
            .as_ref()
            .is_some_and(|l| l.owner.strong_count() == 0)
    }

    /// Removes the manager if the owner is destroyed and nobody is bound.
    ///
    /// Never waits: if a bind holds the guard, that bind retries cleanup
    /// after releasing it.
    pub(crate) fn try_cleanup(&self) -> bool {
        if !self.destroyed.load(Ordering::Acquire) {
            return false;
        }
        // published before the guard CAS so a binder releasing it sees the request
        self.cleanup_pending.store(true, Ordering::SeqCst);
        let hold = match self.guard.try_acquire() {
            Acquire::Acquired(hold) => {
                self.cleanup_pending.store(false, Ordering::SeqCst);
                hold
            }
            Acquire::Busy => {
                self.defer("bind in progress");
                return false;
            }
            Acquire::Removed => return false,
        };
        if self.channel.has_subscribers() {
            drop(hold);
            self.defer("subscribers remain");
            return false;
        }
        self.retire(hold, "destroy");
        true
    }

    /// Closes and removes a manager whose owner was dropped without `Destroy`.
    pub(crate) fn expire(&self) -> bool {
        let Acquire::Acquired(hold) = self.guard.try_acquire() else {
            return false;
        };
        if !self.owner_dropped() {
            return false;
        }
        self.destroyed.store(true, Ordering::Release);
        // waiting gates fire `Closed`
        self.channel.complete();
        self.retire(hold, "sweep");
        true
    }

    /// Moves the guard to `Removing`, detaches and unregisters.
    pub(crate) fn retire(&self, hold: GuardHold<'_>, reason: &'static str) {
        hold.retire();
        if let Some(link) = self.owner.swap(None) {
            if let Some(owner) = link.owner.upgrade() {
                Self::unobserve(&owner, &link);
            }
        }
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let removed = registry
            .managers
            .remove_if(&self.key, |_, m| std::ptr::eq(Arc::as_ptr(m), self))
            .is_some();
        if removed {
            tracing::debug!(key = %self.key, reason, "manager removed");
            registry.emit(|| {
                Event::new(EventKind::ManagerRemoved)
                    .with_key(self.key.clone())
                    .with_reason(reason)
            });
        }
    }

    fn defer(&self, reason: &'static str) {
        tracing::trace!(key = %self.key, reason, "cleanup deferred");
        self.emit(|| {
            Event::new(EventKind::CleanupDeferred)
                .with_key(self.key.clone())
                .with_reason(reason)
        });
    }

    fn emit<F: FnOnce() -> Event>(&self, make: F) {
        if let Some(registry) = self.registry.upgrade() {
            registry.emit(make);
        }
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("key", &self.key)
            .field("destroyed", &self.destroyed.load(Ordering::Relaxed))
            .field("removing", &self.guard.is_removing())
            .field("channel", &self.channel)
            .finish()
    }
}
