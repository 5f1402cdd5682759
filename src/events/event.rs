//! # Diagnostics events emitted by the registry and the tag channel.
//!
//! The [`EventKind`] enum classifies event types across two categories:
//! - **Registry events**: manager creation, owner attach, removal, deferred cleanup, rejected binds
//! - **Tag events**: a tag was sent
//!
//! The [`Event`] struct carries the owner key, tag and reason where relevant.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are collected from several threads.
//!
//! ## Example
//! ```rust
//! use lifebind::{Event, EventKind, OwnerKey};
//!
//! let ev = Event::new(EventKind::BindRejected)
//!     .with_key(OwnerKey::new("screen-1"))
//!     .with_reason("owner destroyed");
//!
//! assert_eq!(ev.kind, EventKind::BindRejected);
//! assert_eq!(ev.key.as_ref().map(|k| k.as_str()), Some("screen-1"));
//! assert_eq!(ev.reason.as_deref(), Some("owner destroyed"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::lifecycle::OwnerKey;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of diagnostics events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Registry events ===
    /// A manager was created and registered for an owner key.
    ///
    /// Sets:
    /// - `key`: owner key
    ManagerCreated,

    /// A manager started observing an owner (first bind or re-attach).
    ///
    /// Sets:
    /// - `key`: owner key
    OwnerAttached,

    /// A manager was detached and removed from the registry.
    ///
    /// Sets:
    /// - `key`: owner key
    /// - `reason`: what triggered the removal ("destroy", "sweep", "retired")
    ManagerRemoved,

    /// Cleanup was attempted but the manager stays registered.
    ///
    /// Sets:
    /// - `key`: owner key
    /// - `reason`: "bind in progress" or "subscribers remain"
    CleanupDeferred,

    /// A bind request was rejected.
    ///
    /// Sets:
    /// - `key`: owner key (when known)
    /// - `tag`: tag (for tag binds)
    /// - `reason`: error label
    BindRejected,

    // === Tag events ===
    /// A tag was published on a tag channel.
    ///
    /// Sets:
    /// - `tag`: the tag
    TagSent,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(self) -> &'static str {
        match self {
            EventKind::ManagerCreated => "manager_created",
            EventKind::OwnerAttached => "owner_attached",
            EventKind::ManagerRemoved => "manager_removed",
            EventKind::CleanupDeferred => "cleanup_deferred",
            EventKind::BindRejected => "bind_rejected",
            EventKind::TagSent => "tag_sent",
        }
    }
}

/// Diagnostics event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Owner key, if applicable.
    pub key: Option<OwnerKey>,
    /// Tag, if applicable.
    pub tag: Option<Arc<str>>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            key: None,
            tag: None,
            reason: None,
        }
    }

    /// Attaches an owner key.
    #[inline]
    pub fn with_key(mut self, key: OwnerKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Attaches a tag.
    #[inline]
    pub fn with_tag(mut self, tag: impl Into<Arc<str>>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn is_registry_event(&self) -> bool {
        !matches!(self.kind, EventKind::TagSent)
    }
}
