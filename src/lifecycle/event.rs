//! # Lifecycle events and states.
//!
//! An owner walks through a totally ordered sequence of [`LifecycleEvent`]s,
//! moving between [`LifecycleState`]s:
//!
//! ```text
//!              Create      Start       Resume
//! Initialized ───────► Created ───► Started ───► Resumed
//!                      ▲    │ ◄───── ▲   │ ◄───── │
//!                      │    │  Stop  │   │ Pause  │
//!                      │    └──────────────────── Destroy ──► Destroyed
//! ```
//!
//! `Destroy` is terminal and happens at most once.

use std::fmt;

/// Event emitted by a lifecycle owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Create,
    Start,
    Resume,
    Pause,
    Stop,
    /// Terminal; nothing follows it.
    Destroy,
}

impl LifecycleEvent {
    /// Returns `true` for [`LifecycleEvent::Destroy`].
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleEvent::Destroy)
    }

    /// State the owner is in right after this event.
    pub fn target_state(self) -> LifecycleState {
        match self {
            LifecycleEvent::Create | LifecycleEvent::Stop => LifecycleState::Created,
            LifecycleEvent::Start | LifecycleEvent::Pause => LifecycleState::Started,
            LifecycleEvent::Resume => LifecycleState::Resumed,
            LifecycleEvent::Destroy => LifecycleState::Destroyed,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(self) -> &'static str {
        match self {
            LifecycleEvent::Create => "create",
            LifecycleEvent::Start => "start",
            LifecycleEvent::Resume => "resume",
            LifecycleEvent::Pause => "pause",
            LifecycleEvent::Stop => "stop",
            LifecycleEvent::Destroy => "destroy",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Coarse state of a lifecycle owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Initialized,
    Created,
    Started,
    Resumed,
    Destroyed,
}

impl LifecycleState {
    #[inline]
    pub fn is_destroyed(self) -> bool {
        matches!(self, LifecycleState::Destroyed)
    }

    /// Events that bring a fresh observer from `Initialized` up to `self`.
    ///
    /// Empty for `Initialized` and `Destroyed`.
    pub fn catch_up_events(self) -> &'static [LifecycleEvent] {
        use LifecycleEvent::*;
        match self {
            LifecycleState::Initialized | LifecycleState::Destroyed => &[],
            LifecycleState::Created => &[Create],
            LifecycleState::Started => &[Create, Start],
            LifecycleState::Resumed => &[Create, Start, Resume],
        }
    }

    /// Whether `event` is a legal next step from this state.
    pub fn accepts(self, event: LifecycleEvent) -> bool {
        use LifecycleEvent::*;
        match (self, event) {
            (LifecycleState::Destroyed, _) => false,
            (_, Destroy) => true,
            (LifecycleState::Initialized, Create) => true,
            (LifecycleState::Created, Start) => true,
            (LifecycleState::Started, Resume | Stop) => true,
            (LifecycleState::Resumed, Pause) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Initialized => "initialized",
            LifecycleState::Created => "created",
            LifecycleState::Started => "started",
            LifecycleState::Resumed => "resumed",
            LifecycleState::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}
