//! # Signals carried by a broadcast channel.
//!
//! [`Notification`] is what a [`Sink`](crate::channel::Sink) receives: either a
//! value or one of the two terminal signals. Internally the channel keeps a
//! `Snapshot` pairing the stored signal with the revision that produced it, so
//! a new subscriber always reads the value and its revision together.

use std::convert::Infallible;

/// A single signal delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<T, E = Infallible> {
    /// A published value.
    Next(T),
    /// Terminal error; nothing follows it.
    Error(E),
    /// Terminal completion; nothing follows it.
    Completed,
}

impl<T, E> Notification<T, E> {
    /// Returns `true` for [`Notification::Error`] and [`Notification::Completed`].
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }

    /// Returns the carried value, if any.
    #[inline]
    pub fn value(&self) -> Option<&T> {
        match self {
            Notification::Next(v) => Some(v),
            _ => None,
        }
    }

    /// Consumes the notification and returns the carried value, if any.
    #[inline]
    pub fn into_value(self) -> Option<T> {
        match self {
            Notification::Next(v) => Some(v),
            _ => None,
        }
    }
}

/// What the channel currently stores.
#[derive(Debug)]
pub(crate) enum Current<T, E> {
    Empty,
    Value(T),
    Error(E),
    Completed,
}

/// Stored signal plus the revision that installed it.
///
/// Revisions start at 0 (`Empty`) and grow by exactly one for every accepted
/// publish or terminal, so slots can detect gaps and duplicates.
#[derive(Debug)]
pub(crate) struct Snapshot<T, E> {
    pub(crate) revision: u64,
    pub(crate) current: Current<T, E>,
}

impl<T: Clone, E: Clone> Snapshot<T, E> {
    pub(crate) fn empty() -> Self {
        Self {
            revision: 0,
            current: Current::Empty,
        }
    }

    pub(crate) fn with_value(value: T) -> Self {
        Self {
            revision: 0,
            current: Current::Value(value),
        }
    }

    /// Next snapshot carrying `notification`, one revision ahead of `self`.
    pub(crate) fn advance(&self, notification: &Notification<T, E>) -> Self {
        let current = match notification {
            Notification::Next(v) => Current::Value(v.clone()),
            Notification::Error(e) => Current::Error(e.clone()),
            Notification::Completed => Current::Completed,
        };
        Self {
            revision: self.revision + 1,
            current,
        }
    }

    #[inline]
    pub(crate) fn is_terminal(&self) -> bool {
        matches!(self.current, Current::Error(_) | Current::Completed)
    }

    /// Stored signal as a deliverable notification (`None` while empty).
    pub(crate) fn notification(&self) -> Option<Notification<T, E>> {
        match &self.current {
            Current::Empty => None,
            Current::Value(v) => Some(Notification::Next(v.clone())),
            Current::Error(e) => Some(Notification::Error(e.clone())),
            Current::Completed => Some(Notification::Completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_increments_revision() {
        let s: Snapshot<u32, ()> = Snapshot::empty();
        let s = s.advance(&Notification::Next(5));
        assert_eq!(s.revision, 1);
        assert_eq!(s.notification(), Some(Notification::Next(5)));

        let s = s.advance(&Notification::Completed);
        assert_eq!(s.revision, 2);
        assert!(s.is_terminal());
    }

    #[test]
    fn test_empty_snapshot_has_nothing_to_replay() {
        let s: Snapshot<u32, ()> = Snapshot::empty();
        assert!(s.notification().is_none());
        assert!(!s.is_terminal());
    }
}
