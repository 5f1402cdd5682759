//! # Lifecycle registry - one manager per owner key.
//!
//! The registry maps [`OwnerKey`]s to managers and turns bind requests into
//! [`CancelSignal`]s:
//! - First bind for a key → creates the manager and starts observing the owner
//! - Later binds → reuse it (re-attaching if the owner link was lost)
//! - Owner `Destroy` → the manager closes its channel and removes itself once
//!   no bind is in flight and no gate is subscribed
//!
//! ## Architecture
//! ```text
//! bind_until_event(owner, ev)
//!   ├─► reject early: no lifecycle / already destroyed
//!   └─► loop {
//!         manager = map.entry(key).or_insert_with(Manager::new)
//!         guard.acquire()            ── Removing? retry with a fresh entry
//!         channel closed?            ── retire it, retry
//!         link owner                 ── new owner? release, observe it, retry
//!         gate = subscribe(channel)  ── under the guard
//!         release guard
//!       }
//!       owner destroyed meanwhile?   ── feed Destroy
//!       cleanup deferred / closed?   ── try_cleanup
//! ```
//!
//! ## Rules
//! - At most one manager per key is registered at any time.
//! - A bind never leaves its signal hanging: it fires on the target event, on
//!   channel close, or immediately on rejection.
//! - The map shard lock is never held while calling into a manager or an owner.
//! - Observers are added outside the guard, so a lifecycle callback may bind
//!   the same owner again without deadlocking. The events an owner replays to
//!   a new observer are collapsed into the latest one, so a gate subscribed
//!   while another binder is still attaching never fires on stale history.

use std::fmt;
use std::sync::{Arc, LazyLock, Weak};

use crossbeam::utils::Backoff;
use dashmap::DashMap;

use super::config::Config;
use super::manager::{Link, Manager};
use crate::channel::BroadcastLatest;
use crate::error::BindError;
use crate::events::{Bus, Event, EventKind};
use crate::lifecycle::{LifecycleEvent, LifecycleOwner, OwnerKey};
use crate::signal::{CancelSignal, bind_gate};

static GLOBAL: LazyLock<LifecycleRegistry> = LazyLock::new(LifecycleRegistry::new);

pub(crate) struct Shared {
    pub(crate) managers: DashMap<OwnerKey, Arc<Manager>>,
    bus: Option<Bus>,
}

impl Shared {
    #[inline]
    pub(crate) fn emit<F: FnOnce() -> Event>(&self, make: F) {
        if let Some(bus) = &self.bus {
            bus.publish_with(make);
        }
    }
}

/// Keyed registry of lifecycle managers.
///
/// Cheap to clone; clones share the same map.
///
/// ### Example
/// ```rust
/// use lifebind::{BasicOwner, Cancelled, LifecycleEvent, LifecycleRegistry};
///
/// let registry = LifecycleRegistry::new();
/// let owner = BasicOwner::new("screen");
/// owner.handle_event(LifecycleEvent::Create);
///
/// let signal = registry.bind_until_destroy(&owner);
/// assert!(registry.contains(&"screen".into()));
///
/// owner.handle_event(LifecycleEvent::Destroy);
/// assert_eq!(signal.outcome(), Some(Cancelled::Event(LifecycleEvent::Destroy)));
/// assert!(registry.is_empty());
/// ```
#[derive(Clone)]
pub struct LifecycleRegistry {
    shared: Arc<Shared>,
}

impl LifecycleRegistry {
    /// Creates a registry with the default [`Config`].
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Creates a registry sized and instrumented per `cfg`.
    pub fn with_config(cfg: &Config) -> Self {
        let managers = match cfg.shard_amount() {
            Some(n) => DashMap::with_shard_amount(n),
            None => DashMap::new(),
        };
        Self {
            shared: Arc::new(Shared {
                managers,
                bus: cfg.diagnostics.then(Bus::new),
            }),
        }
    }

    /// Process-wide registry, created on first use.
    pub fn global() -> &'static LifecycleRegistry {
        &GLOBAL
    }

    /// Signal firing when `owner` emits `event`.
    ///
    /// If `event` is the owner's latest event already, the signal fires at once.
    pub fn bind_until_event<O>(&self, owner: &Arc<O>, event: LifecycleEvent) -> CancelSignal
    where
        O: LifecycleOwner,
    {
        let owner: Arc<dyn LifecycleOwner> = Arc::clone(owner) as Arc<dyn LifecycleOwner>;
        self.bind_dyn(owner, event)
    }

    /// Signal firing when `owner` is destroyed.
    pub fn bind_until_destroy<O>(&self, owner: &Arc<O>) -> CancelSignal
    where
        O: LifecycleOwner,
    {
        self.bind_until_event(owner, LifecycleEvent::Destroy)
    }

    /// Like [`bind_until_event`](Self::bind_until_event) for an owner that may
    /// already be gone; a dropped owner yields [`BindError::MissingOwner`].
    pub fn bind_weak<O>(&self, owner: &Weak<O>, event: LifecycleEvent) -> CancelSignal
    where
        O: LifecycleOwner,
    {
        match owner.upgrade() {
            Some(owner) => self.bind_until_event(&owner, event),
            None => self.reject(None, BindError::MissingOwner),
        }
    }

    /// Type-erased form of [`bind_until_event`](Self::bind_until_event).
    pub fn bind_dyn(&self, owner: Arc<dyn LifecycleOwner>, event: LifecycleEvent) -> CancelSignal {
        let key = owner.owner_key();
        let Some(lifecycle) = owner.lifecycle() else {
            return self.reject(Some(&key), BindError::UnsupportedOwner { key: key.clone() });
        };
        if lifecycle.current_state().is_destroyed() {
            return self.reject(Some(&key), BindError::OwnerDestroyed { key: key.clone() });
        }

        let backoff = Backoff::new();
        let (manager, signal) = loop {
            let mut created = false;
            let manager = Arc::clone(
                &*self
                    .shared
                    .managers
                    .entry(key.clone())
                    .or_insert_with(|| {
                        created = true;
                        Manager::new(key.clone(), Arc::downgrade(&self.shared))
                    }),
            );
            if created {
                tracing::debug!(key = %key, "manager created");
                self.shared
                    .emit(|| Event::new(EventKind::ManagerCreated).with_key(key.clone()));
            }

            let Some(hold) = manager.guard.acquire() else {
                // being removed; wait for the entry to go away
                backoff.snooze();
                continue;
            };
            if manager.is_closed() {
                manager.retire(hold, "retired");
                continue;
            }
            match manager.link(&owner) {
                Link::Ready => {}
                Link::Fresh => {
                    drop(hold);
                    manager.observe(&owner);
                    continue;
                }
                // bounded wait: the attaching binder may itself be blocked
                // behind a lifecycle callback that is binding this owner
                Link::Attaching if !backoff.is_completed() => {
                    drop(hold);
                    backoff.snooze();
                    continue;
                }
                Link::Attaching => {}
            }
            let signal = bind_gate(manager.channel(), event);
            drop(hold);
            break (manager, signal);
        };

        if lifecycle.current_state().is_destroyed() {
            manager.transition(LifecycleEvent::Destroy);
        }
        if manager.take_cleanup_request() || manager.is_closed() {
            manager.try_cleanup();
        }
        signal
    }

    /// Routes `event` to the manager registered for `key`.
    ///
    /// Returns `false` if no manager is registered.
    pub fn dispatch(&self, key: &OwnerKey, event: LifecycleEvent) -> bool {
        let Some(manager) = self.manager(key) else {
            return false;
        };
        manager.transition(event);
        true
    }

    /// Closes and removes managers whose owner was dropped without `Destroy`.
    ///
    /// Returns the number of managers removed.
    pub fn sweep(&self) -> usize {
        let managers: Vec<Arc<Manager>> = self
            .shared
            .managers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        managers.iter().filter(|m| m.expire()).count()
    }

    /// Lifecycle channel of the manager registered for `key`.
    pub fn lifecycle_channel(&self, key: &OwnerKey) -> Option<BroadcastLatest<LifecycleEvent>> {
        self.manager(key).map(|m| m.channel().clone())
    }

    pub fn contains(&self, key: &OwnerKey) -> bool {
        self.shared.managers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.shared.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.managers.is_empty()
    }

    /// Diagnostics bus, if enabled.
    pub fn bus(&self) -> Option<&Bus> {
        self.shared.bus.as_ref()
    }

    fn manager(&self, key: &OwnerKey) -> Option<Arc<Manager>> {
        self.shared.managers.get(key).map(|m| Arc::clone(m.value()))
    }

    fn reject(&self, key: Option<&OwnerKey>, err: BindError) -> CancelSignal {
        tracing::debug!(reason = err.as_label(), "bind rejected");
        self.shared.emit(|| {
            let ev = Event::new(EventKind::BindRejected).with_reason(err.as_label());
            match key {
                Some(key) => ev.with_key(key.clone()),
                None => ev,
            }
        });
        CancelSignal::rejected(err)
    }
}

impl Default for LifecycleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LifecycleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleRegistry")
            .field("managers", &self.len())
            .field("diagnostics", &self.shared.bus.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Notification, Subscription};
    use crate::error::Cancelled;
    use crate::lifecycle::{BasicOwner, Lifecycle, LifecycleState};
    use parking_lot::Mutex;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;
    use LifecycleEvent::*;

    fn resumed(key: &str) -> Arc<BasicOwner> {
        let owner = BasicOwner::new(key);
        assert!(owner.advance(&[Create, Start, Resume]));
        owner
    }

    fn kinds(registry: &LifecycleRegistry) -> (Arc<Mutex<Vec<EventKind>>>, Subscription<Event>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let sub = registry
            .bus()
            .expect("diagnostics enabled by default")
            .subscribe(move |n: Notification<Event>| {
                if let Notification::Next(ev) = n {
                    s.lock().push(ev.kind);
                }
            });
        (seen, sub)
    }

    #[test]
    fn test_bind_fires_on_target_event() {
        let registry = LifecycleRegistry::new();
        let owner = resumed("a");
        let signal = registry.bind_until_event(&owner, Pause);
        assert!(!signal.is_cancelled());

        owner.handle_event(Pause);
        assert_eq!(signal.outcome(), Some(Cancelled::Event(Pause)));
        assert!(registry.contains(&"a".into()));
    }

    #[test]
    fn test_bind_after_event_fires_through_replay() {
        let registry = LifecycleRegistry::new();
        let owner = resumed("a");
        let _keep = registry.bind_until_destroy(&owner);
        owner.handle_event(Pause);

        let late = registry.bind_until_event(&owner, Pause);
        assert_eq!(late.outcome(), Some(Cancelled::Event(Pause)));
    }

    #[test]
    fn test_destroy_removes_manager() {
        let registry = LifecycleRegistry::new();
        let owner = resumed("a");
        let on_destroy = registry.bind_until_destroy(&owner);
        let on_pause = registry.bind_until_event(&owner, Pause);

        owner.handle_event(Pause);
        owner.handle_event(Stop);
        owner.handle_event(Destroy);

        assert_eq!(on_pause.outcome(), Some(Cancelled::Event(Pause)));
        assert_eq!(on_destroy.outcome(), Some(Cancelled::Event(Destroy)));
        assert!(registry.is_empty());
        assert_eq!(owner.dispatcher().observer_count(), 0);
    }

    #[test]
    fn test_rejected_binds_fire_immediately() {
        struct NoLifecycle;
        impl LifecycleOwner for NoLifecycle {
            fn owner_key(&self) -> OwnerKey {
                "plain".into()
            }
            fn lifecycle(&self) -> Option<&dyn Lifecycle> {
                None
            }
        }

        let registry = LifecycleRegistry::new();
        let (seen, _sub) = kinds(&registry);

        let s = registry.bind_until_event(&Arc::new(NoLifecycle), Stop);
        assert!(matches!(
            s.outcome(),
            Some(Cancelled::Rejected(BindError::UnsupportedOwner { .. }))
        ));

        let owner = BasicOwner::new("done");
        owner.handle_event(Destroy);
        let s = registry.bind_until_destroy(&owner);
        assert!(matches!(
            s.outcome(),
            Some(Cancelled::Rejected(BindError::OwnerDestroyed { .. }))
        ));

        let weak = Arc::downgrade(&BasicOwner::new("gone"));
        let s = registry.bind_weak(&weak, Stop);
        assert_eq!(s.outcome(), Some(Cancelled::Rejected(BindError::MissingOwner)));

        assert!(registry.is_empty());
        assert_eq!(*seen.lock(), vec![EventKind::BindRejected; 3]);
    }

    #[test]
    fn test_diagnostics_trace_manager_lifetime() {
        let registry = LifecycleRegistry::new();
        let (seen, _sub) = kinds(&registry);

        let owner = resumed("a");
        let _s = registry.bind_until_destroy(&owner);
        owner.handle_event(Destroy);

        let seen = seen.lock().clone();
        assert_eq!(seen.first(), Some(&EventKind::ManagerCreated));
        assert!(seen.contains(&EventKind::OwnerAttached));
        assert_eq!(seen.last(), Some(&EventKind::ManagerRemoved));
    }

    #[test]
    fn test_concurrent_binds_share_one_manager() {
        let registry = LifecycleRegistry::new();
        let owner = resumed("shared");
        let barrier = Arc::new(Barrier::new(50));

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let registry = registry.clone();
                let owner = Arc::clone(&owner);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let signal = registry.bind_until_event(&owner, Stop);
                    let channel = registry.lifecycle_channel(&"shared".into());
                    (signal, channel)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        let first = results[0].1.clone().expect("manager registered");
        for (signal, channel) in &results {
            assert!(channel.as_ref().is_some_and(|c| c.same_channel(&first)));
            assert!(!signal.is_cancelled());
        }
        assert_eq!(first.subscriber_count(), 50);
        assert_eq!(owner.dispatcher().observer_count(), 1);

        owner.handle_event(Pause);
        owner.handle_event(Stop);
        for (signal, _) in &results {
            assert_eq!(signal.outcome(), Some(Cancelled::Event(Stop)));
        }
    }

    #[test]
    fn test_bind_racing_destroy_never_hangs() {
        for round in 0..50 {
            let registry = LifecycleRegistry::new();
            let key = format!("race-{round}");
            let owner = resumed(&key);
            let barrier = Arc::new(Barrier::new(2));

            let destroyer = {
                let owner = Arc::clone(&owner);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    owner.handle_event(Destroy);
                })
            };
            let binder = {
                let registry = registry.clone();
                let owner = Arc::clone(&owner);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.bind_until_destroy(&owner)
                })
            };
            destroyer.join().unwrap();
            let signal = binder.join().unwrap();

            // rejected up front, or bound and then destroyed
            match signal.outcome() {
                Some(Cancelled::Event(Destroy)) => {}
                Some(Cancelled::Rejected(BindError::OwnerDestroyed { .. })) => {}
                other => panic!("round {round}: unexpected outcome {other:?}"),
            }
            assert_eq!(owner.state(), LifecycleState::Destroyed);
            assert!(registry.is_empty(), "round {round}: manager leaked");
        }
    }

    #[test]
    fn test_closed_manager_is_replaced() {
        let registry = LifecycleRegistry::new();
        let owner = resumed("k");
        let key: OwnerKey = "k".into();
        let _keep = registry.bind_until_destroy(&owner);
        let before = registry.lifecycle_channel(&key).expect("registered");

        // closed without the registry noticing (no cleanup yet)
        before.complete();
        let signal = registry.bind_until_event(&owner, Stop);
        let after = registry.lifecycle_channel(&key).expect("registered");

        assert!(!after.same_channel(&before));
        assert!(!signal.is_cancelled());
        assert_eq!(after.value(), Some(Resume));
    }

    #[test]
    fn test_sweep_closes_dropped_owners() {
        let registry = LifecycleRegistry::new();
        let signal = {
            let owner = resumed("leaked");
            registry.bind_until_event(&owner, Stop)
        };
        let alive = resumed("alive");
        let _s = registry.bind_until_event(&alive, Stop);

        assert_eq!(registry.sweep(), 1);
        assert_eq!(signal.outcome(), Some(Cancelled::Closed));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&"alive".into()));
    }

    #[test]
    fn test_dispatch_routes_to_manager() {
        let registry = LifecycleRegistry::new();
        let owner = resumed("d");
        let signal = registry.bind_until_event(&owner, Pause);

        assert!(!registry.dispatch(&"missing".into(), Pause));
        assert!(registry.dispatch(&"d".into(), Pause));
        assert_eq!(signal.outcome(), Some(Cancelled::Event(Pause)));

        assert!(registry.dispatch(&"d".into(), Destroy));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sharded_config_is_accepted() {
        let cfg = Config {
            registry_shards: 3,
            diagnostics: false,
            ..Config::default()
        };
        let registry = LifecycleRegistry::with_config(&cfg);
        assert!(registry.bus().is_none());
        let owner = resumed("x");
        let _s = registry.bind_until_destroy(&owner);
        assert_eq!(registry.len(), 1);
    }

    /// Lifecycle whose observer registration is slow enough for a second
    /// binder to give up waiting and subscribe first.
    struct SlowLifecycle(crate::lifecycle::OwnerLifecycle);

    impl Lifecycle for SlowLifecycle {
        fn current_state(&self) -> LifecycleState {
            self.0.current_state()
        }
        fn add_observer(&self, observer: Arc<dyn crate::lifecycle::LifecycleObserver>) {
            thread::sleep(Duration::from_millis(200));
            self.0.add_observer(observer);
        }
        fn remove_observer(&self, observer: &Arc<dyn crate::lifecycle::LifecycleObserver>) {
            self.0.remove_observer(observer);
        }
    }

    struct SlowOwner(SlowLifecycle);

    impl LifecycleOwner for SlowOwner {
        fn owner_key(&self) -> OwnerKey {
            "slow".into()
        }
        fn lifecycle(&self) -> Option<&dyn Lifecycle> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_bind_during_slow_attach_ignores_past_events() {
        let registry = LifecycleRegistry::new();
        let owner = Arc::new(SlowOwner(SlowLifecycle(crate::lifecycle::OwnerLifecycle::new())));
        for ev in [Create, Start, Resume] {
            assert!(owner.0 .0.handle_event(ev));
        }

        let attaching = {
            let registry = registry.clone();
            let owner = Arc::clone(&owner);
            thread::spawn(move || registry.bind_until_event(&owner, Stop))
        };
        thread::sleep(Duration::from_millis(20));
        let on_start = registry.bind_until_event(&owner, Start);
        let on_stop = attaching.join().unwrap();

        assert!(!on_start.is_cancelled(), "fired on a replayed Start");
        assert!(!on_stop.is_cancelled());
        assert_eq!(
            registry.lifecycle_channel(&"slow".into()).and_then(|c| c.value()),
            Some(Resume)
        );

        owner.0 .0.handle_event(Pause);
        assert!(!on_start.is_cancelled());
        owner.0 .0.handle_event(Stop);
        assert_eq!(on_stop.outcome(), Some(Cancelled::Event(Stop)));
        owner.0 .0.handle_event(Start);
        assert_eq!(on_start.outcome(), Some(Cancelled::Event(Start)));
    }

    #[test]
    fn test_new_owner_survives_old_owner_destroy() {
        for round in 0..100 {
            let registry = LifecycleRegistry::new();
            let key = format!("reuse-{round}");
            let old = resumed(&key);
            let _old_signal = registry.bind_until_destroy(&old);
            let fresh = resumed(&key);
            let barrier = Arc::new(Barrier::new(2));

            let destroyer = {
                let old = Arc::clone(&old);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    old.handle_event(Destroy);
                })
            };
            let binder = {
                let registry = registry.clone();
                let fresh = Arc::clone(&fresh);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.bind_until_destroy(&fresh)
                })
            };
            destroyer.join().unwrap();
            let signal = binder.join().unwrap();

            assert!(!signal.is_cancelled(), "round {round}: fired by the old owner");
            assert!(registry.contains(&key.as_str().into()), "round {round}: manager missing");

            fresh.handle_event(Destroy);
            assert_eq!(signal.outcome(), Some(Cancelled::Event(Destroy)));
            assert!(registry.is_empty(), "round {round}: manager leaked");
        }
    }
}
