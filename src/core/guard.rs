//! # Tri-state manager guard.
//!
//! Serializes "bind to this manager" against "remove this manager" without a
//! lock:
//!
//! ```text
//!        try_acquire (CAS)          retire()
//! Idle ─────────────────► Locked ─────────────► Removing  (permanent)
//!   ▲                        │
//!   └──────── drop ──────────┘
//! ```
//!
//! ## Rules
//! - Binders spin (with backoff) while another party holds `Locked`.
//! - Cleanup never spins: a busy guard means a bind is in progress, and that
//!   bind retries cleanup itself once it is done.
//! - `Removing` is terminal; a binder seeing it goes back to the registry map.
//! - All transitions are `SeqCst` so the manager's cleanup request flag and the
//!   guard form a Dekker pair.

use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam::utils::Backoff;

const IDLE: u8 = 0;
const LOCKED: u8 = 1;
const REMOVING: u8 = 2;

/// Outcome of a single acquisition attempt.
pub(crate) enum Acquire<'a> {
    Acquired(GuardHold<'a>),
    Busy,
    Removed,
}

pub(crate) struct TriGuard(AtomicU8);

impl TriGuard {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(IDLE))
    }

    /// One CAS attempt `Idle → Locked`.
    pub(crate) fn try_acquire(&self) -> Acquire<'_> {
        match self
            .0
            .compare_exchange(IDLE, LOCKED, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => Acquire::Acquired(GuardHold {
                guard: self,
                retired: false,
            }),
            Err(REMOVING) => Acquire::Removed,
            Err(_) => Acquire::Busy,
        }
    }

    /// Spins until the guard is acquired. Returns `None` once it is `Removing`.
    pub(crate) fn acquire(&self) -> Option<GuardHold<'_>> {
        let backoff = Backoff::new();
        loop {
            match self.try_acquire() {
                Acquire::Acquired(hold) => return Some(hold),
                Acquire::Removed => return None,
                Acquire::Busy => {
                    tracing::trace!("manager guard contended");
                    backoff.snooze();
                }
            }
        }
    }

    #[inline]
    pub(crate) fn is_removing(&self) -> bool {
        self.0.load(Ordering::SeqCst) == REMOVING
    }
}

/// Exclusive hold on a [`TriGuard`]; releases to `Idle` on drop.
pub(crate) struct GuardHold<'a> {
    guard: &'a TriGuard,
    retired: bool,
}

impl GuardHold<'_> {
    /// Moves the guard to `Removing` for good.
    pub(crate) fn retire(mut self) {
        self.retired = true;
        self.guard.0.store(REMOVING, Ordering::SeqCst);
    }
}

impl Drop for GuardHold<'_> {
    fn drop(&mut self) {
        if !self.retired {
            let prev = self.guard.0.swap(IDLE, Ordering::SeqCst);
            debug_assert_eq!(prev, LOCKED, "guard released from a state other than Locked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_second_acquire_is_busy_until_release() {
        let g = TriGuard::new();
        let hold = match g.try_acquire() {
            Acquire::Acquired(h) => h,
            _ => panic!("fresh guard must be acquirable"),
        };
        assert!(matches!(g.try_acquire(), Acquire::Busy));
        drop(hold);
        assert!(matches!(g.try_acquire(), Acquire::Acquired(_)));
    }

    #[test]
    fn test_retire_is_permanent() {
        let g = TriGuard::new();
        if let Acquire::Acquired(h) = g.try_acquire() {
            h.retire();
        }
        assert!(g.is_removing());
        assert!(matches!(g.try_acquire(), Acquire::Removed));
        assert!(g.acquire().is_none());
    }

    #[test]
    fn test_acquire_is_mutually_exclusive() {
        let g = Arc::new(TriGuard::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let g = Arc::clone(&g);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let _hold = g.acquire().expect("never retired");
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
