//! # Reference lifecycle dispatcher.
//!
//! [`OwnerLifecycle`] is a ready-made [`Lifecycle`] for owners that drive their
//! own events, and [`BasicOwner`] pairs it with an [`OwnerKey`].
//!
//! ## Rules
//! - Illegal transitions are rejected (`handle_event` returns `false`).
//! - A new observer is brought up to the current state first: adding one to a
//!   resumed owner delivers `Create`, `Start`, `Resume` before anything else.
//! - Adding an observer to a destroyed owner is a no-op.
//! - Dispatch is serialized by a reentrant lock, so observers may add or remove
//!   observers (themselves included) from inside a callback.
//! - After `Destroy` all observers are dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use arc_swap::ArcSwap;
use parking_lot::ReentrantMutex;

use super::event::{LifecycleEvent, LifecycleState};
use super::owner::{Lifecycle, LifecycleObserver, LifecycleOwner, OwnerKey, same_object};

type Observers = Vec<Arc<dyn LifecycleObserver>>;

/// Event source with catch-up dispatch for late observers.
pub struct OwnerLifecycle {
    dispatch: ReentrantMutex<()>,
    state: AtomicU8,
    observers: ArcSwap<Observers>,
}

impl OwnerLifecycle {
    pub fn new() -> Self {
        Self {
            dispatch: ReentrantMutex::new(()),
            state: AtomicU8::new(encode(LifecycleState::Initialized)),
            observers: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Moves to the state following `event` and notifies every observer.
    ///
    /// Returns `false` if `event` is not a legal step from the current state.
    pub fn handle_event(&self, event: LifecycleEvent) -> bool {
        let _dispatch = self.dispatch.lock();
        let state = decode(self.state.load(Ordering::Acquire));
        if !state.accepts(event) {
            return false;
        }
        self.state
            .store(encode(event.target_state()), Ordering::Release);

        let observers = self.observers.load_full();
        for observer in observers.iter() {
            observer.on_lifecycle_event(event);
        }
        if event.is_terminal() {
            self.observers.store(Arc::new(Vec::new()));
        }
        true
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.load().len()
    }
}

impl Default for OwnerLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle for OwnerLifecycle {
    fn current_state(&self) -> LifecycleState {
        decode(self.state.load(Ordering::Acquire))
    }

    fn add_observer(&self, observer: Arc<dyn LifecycleObserver>) {
        let _dispatch = self.dispatch.lock();
        let state = self.current_state();
        if state.is_destroyed() {
            return;
        }
        let already = self
            .observers
            .load()
            .iter()
            .any(|o| same_object(o, &observer));
        if already {
            return;
        }
        self.observers.rcu(|cur| {
            let mut next = Observers::clone(cur);
            next.push(Arc::clone(&observer));
            next
        });
        for event in state.catch_up_events() {
            observer.on_lifecycle_event(*event);
        }
    }

    fn remove_observer(&self, observer: &Arc<dyn LifecycleObserver>) {
        self.observers.rcu(|cur| {
            cur.iter()
                .filter(|o| !same_object(*o, observer))
                .cloned()
                .collect::<Observers>()
        });
    }
}

/// Minimal owner: a fixed key plus an [`OwnerLifecycle`].
pub struct BasicOwner {
    key: OwnerKey,
    lifecycle: OwnerLifecycle,
}

impl BasicOwner {
    pub fn new(key: impl Into<OwnerKey>) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            lifecycle: OwnerLifecycle::new(),
        })
    }

    /// See [`OwnerLifecycle::handle_event`].
    pub fn handle_event(&self, event: LifecycleEvent) -> bool {
        self.lifecycle.handle_event(event)
    }

    /// Walks forward through `events`, stopping at the first illegal one.
    pub fn advance(&self, events: &[LifecycleEvent]) -> bool {
        events.iter().all(|e| self.lifecycle.handle_event(*e))
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.current_state()
    }

    pub fn dispatcher(&self) -> &OwnerLifecycle {
        &self.lifecycle
    }
}

impl LifecycleOwner for BasicOwner {
    fn owner_key(&self) -> OwnerKey {
        self.key.clone()
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(&self.lifecycle)
    }
}

#[inline]
fn encode(state: LifecycleState) -> u8 {
    match state {
        LifecycleState::Initialized => 0,
        LifecycleState::Created => 1,
        LifecycleState::Started => 2,
        LifecycleState::Resumed => 3,
        LifecycleState::Destroyed => 4,
    }
}

#[inline]
fn decode(raw: u8) -> LifecycleState {
    match raw {
        0 => LifecycleState::Initialized,
        1 => LifecycleState::Created,
        2 => LifecycleState::Started,
        3 => LifecycleState::Resumed,
        _ => LifecycleState::Destroyed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<LifecycleEvent>>);

    impl LifecycleObserver for Recorder {
        fn on_lifecycle_event(&self, event: LifecycleEvent) {
            self.0.lock().push(event);
        }
    }

    use LifecycleEvent::*;

    #[test]
    fn test_late_observer_catches_up() {
        let lc = OwnerLifecycle::new();
        assert!(lc.handle_event(Create));
        assert!(lc.handle_event(Start));
        assert!(lc.handle_event(Resume));

        let rec = Arc::new(Recorder::default());
        lc.add_observer(rec.clone());
        lc.handle_event(Pause);

        assert_eq!(*rec.0.lock(), vec![Create, Start, Resume, Pause]);
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let lc = OwnerLifecycle::new();
        assert!(!lc.handle_event(Resume));
        assert_eq!(lc.current_state(), LifecycleState::Initialized);
        assert!(lc.handle_event(Destroy));
        assert!(!lc.handle_event(Destroy));
    }

    #[test]
    fn test_destroy_drops_observers() {
        let lc = OwnerLifecycle::new();
        let rec = Arc::new(Recorder::default());
        lc.add_observer(rec.clone());
        lc.add_observer(rec.clone());
        assert_eq!(lc.observer_count(), 1);

        lc.handle_event(Create);
        lc.handle_event(Destroy);
        assert_eq!(lc.observer_count(), 0);
        assert_eq!(*rec.0.lock(), vec![Create, Destroy]);

        lc.add_observer(Arc::new(Recorder::default()));
        assert_eq!(lc.observer_count(), 0);
    }

    #[test]
    fn test_observer_may_remove_itself() {
        struct OneShot {
            lc: Arc<OwnerLifecycle>,
            me: Mutex<Option<Arc<dyn LifecycleObserver>>>,
            hits: Mutex<u32>,
        }
        impl LifecycleObserver for OneShot {
            fn on_lifecycle_event(&self, _event: LifecycleEvent) {
                *self.hits.lock() += 1;
                if let Some(me) = self.me.lock().take() {
                    self.lc.remove_observer(&me);
                }
            }
        }

        let lc = Arc::new(OwnerLifecycle::new());
        let obs = Arc::new(OneShot {
            lc: Arc::clone(&lc),
            me: Mutex::new(None),
            hits: Mutex::new(0),
        });
        let erased: Arc<dyn LifecycleObserver> = obs.clone();
        *obs.me.lock() = Some(Arc::clone(&erased));
        lc.add_observer(erased);

        lc.handle_event(Create);
        lc.handle_event(Start);
        assert_eq!(*obs.hits.lock(), 1);
        assert_eq!(lc.observer_count(), 0);
    }

    #[test]
    fn test_basic_owner_exposes_lifecycle() {
        let owner = BasicOwner::new("screen");
        assert!(owner.advance(&[Create, Start]));
        assert_eq!(owner.owner_key().as_str(), "screen");
        let lc = owner.lifecycle().map(|l| l.current_state());
        assert_eq!(lc, Some(LifecycleState::Started));
    }
}
