//! # Per-subscriber delivery state.
//!
//! A [`Slot`] serializes delivery to one sink without holding a lock across the
//! sink call.
//!
//! ## Architecture
//! ```text
//! publisher A ──► offer(rev=7) ─┐
//! publisher B ──► offer(rev=8) ─┼──► pending {7, 8, ...} ──► drain() ──► sink
//! sink (reentrant) ─► offer(9) ─┘        (short lock)        (one thread at a time)
//! ```
//!
//! ## Rules
//! - Nothing is delivered before the replay step (`emit_first`) ran.
//! - The thread that flips `delivering` to `true` owns delivery and drains the
//!   pending queue until it is empty; every other thread only enqueues.
//! - Notifications are released strictly in revision order. A revision at or
//!   below the last delivered one is a duplicate and is dropped.
//! - After a terminal or `cancel()`, no further delivery happens.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::notification::{Notification, Snapshot};
use super::sink::Sink;
use super::Replay;

struct SlotState<T, E> {
    /// Replay step done; offers may be delivered.
    replayed: bool,
    /// Some thread is currently inside the drain loop.
    delivering: bool,
    /// Revision of the last notification handed to the sink (or skipped by replay).
    last_revision: u64,
    /// Notifications waiting for their turn, keyed by revision.
    pending: BTreeMap<u64, Notification<T, E>>,
}

pub(crate) struct Slot<T, E> {
    sink: Box<dyn Sink<T, E>>,
    cancelled: AtomicBool,
    state: Mutex<SlotState<T, E>>,
}

impl<T, E> Slot<T, E> {
    pub(crate) fn new(sink: Box<dyn Sink<T, E>>) -> Self {
        Self {
            sink,
            cancelled: AtomicBool::new(false),
            state: Mutex::new(SlotState {
                replayed: false,
                delivering: false,
                last_revision: 0,
                pending: BTreeMap::new(),
            }),
        }
    }

    #[inline]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Marks the slot cancelled. Returns `true` only for the first caller.
    #[inline]
    pub(crate) fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Slot<T, E> {
    /// Replays the snapshot read right after registration, then drains
    /// anything that arrived in between.
    ///
    /// A terminal snapshot is replayed even when `replay` is [`Replay::Off`]:
    /// a subscriber must always learn that the channel closed.
    pub(crate) fn emit_first(&self, snapshot: &Snapshot<T, E>, replay: Replay) {
        if self.is_cancelled() {
            return;
        }
        let first = {
            let mut st = self.state.lock();
            if self.is_cancelled() || st.replayed {
                return;
            }
            st.replayed = true;
            st.last_revision = snapshot.revision;
            st.pending = st.pending.split_off(&(snapshot.revision + 1));

            let first = if snapshot.is_terminal() || replay == Replay::Latest {
                snapshot.notification()
            } else {
                None
            };
            if first.is_none() && st.pending.is_empty() {
                return;
            }
            st.delivering = true;
            first
        };

        if let Some(n) = first {
            self.deliver(n);
        }
        self.drain();
    }

    /// Offers the notification installed at `revision`.
    pub(crate) fn offer(&self, revision: u64, notification: Notification<T, E>) {
        if self.is_cancelled() {
            return;
        }
        {
            let mut st = self.state.lock();
            if self.is_cancelled() || revision <= st.last_revision {
                return;
            }
            st.pending.insert(revision, notification);
            if st.delivering || !st.replayed {
                return;
            }
            st.delivering = true;
        }
        self.drain();
    }

    fn drain(&self) {
        loop {
            let next = {
                let mut guard = self.state.lock();
                let st = &mut *guard;
                if self.is_cancelled() {
                    st.delivering = false;
                    st.pending.clear();
                    return;
                }
                let expected = st.last_revision + 1;
                match st.pending.first_entry() {
                    Some(entry) if *entry.key() == expected => {
                        st.last_revision = expected;
                        entry.remove()
                    }
                    // gap or empty: a later offer restarts the loop
                    _ => {
                        st.delivering = false;
                        return;
                    }
                }
            };
            self.deliver(next);
        }
    }

    fn deliver(&self, n: Notification<T, E>) {
        if self.is_cancelled() {
            return;
        }
        let terminal = n.is_terminal();
        self.sink.on_notification(n);
        if terminal {
            self.cancelled.store(true, Ordering::Release);
        }
    }
}
