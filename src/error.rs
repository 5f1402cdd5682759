//! Error types used by the binding registry and the cancel signals.
//!
//! This module defines two enums:
//!
//! - [`BindError`] a bind request that could not be honored (bad owner, empty tag).
//! - [`Cancelled`] why a [`CancelSignal`](crate::CancelSignal) fired.
//!
//! Nothing in this crate returns `BindError` directly: a rejected bind yields an
//! already-fired signal carrying [`Cancelled::Rejected`], so consumers handle every
//! outcome in one place.

use std::sync::Arc;

use thiserror::Error;

use crate::lifecycle::{LifecycleEvent, OwnerKey};

/// # Errors produced when a bind request is rejected.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// The owner was already dropped when the bind was attempted.
    #[error("lifecycle owner is gone")]
    MissingOwner,

    /// The owner exposes no lifecycle to observe.
    #[error("owner {key} has no lifecycle")]
    UnsupportedOwner {
        /// Key reported by the owner.
        key: OwnerKey,
    },

    /// The owner already reached its terminal state.
    #[error("owner {key} is already destroyed")]
    OwnerDestroyed {
        /// Key reported by the owner.
        key: OwnerKey,
    },

    /// Tags must be non-empty.
    #[error("tag must not be empty")]
    EmptyTag,
}

impl BindError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use lifebind::BindError;
    ///
    /// assert_eq!(BindError::EmptyTag.as_label(), "bind_empty_tag");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BindError::MissingOwner => "bind_missing_owner",
            BindError::UnsupportedOwner { .. } => "bind_unsupported_owner",
            BindError::OwnerDestroyed { .. } => "bind_owner_destroyed",
            BindError::EmptyTag => "bind_empty_tag",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BindError::MissingOwner => "owner dropped before bind".to_string(),
            BindError::UnsupportedOwner { key } => format!("unsupported owner: {key}"),
            BindError::OwnerDestroyed { key } => format!("owner destroyed: {key}"),
            BindError::EmptyTag => "empty tag".to_string(),
        }
    }
}

/// # Reason a cancel signal fired.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Cancelled {
    /// The awaited lifecycle event was observed.
    #[error("lifecycle event {0} observed")]
    Event(LifecycleEvent),

    /// A newer bind (or an explicit send) used the same tag.
    #[error("tag {0:?} re-sent")]
    Tag(Arc<str>),

    /// The source closed before the awaited signal arrived.
    #[error("source closed")]
    Closed,

    /// The bind was rejected; the signal fired immediately.
    #[error("bind rejected: {0}")]
    Rejected(#[from] BindError),
}

impl Cancelled {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use lifebind::{Cancelled, LifecycleEvent};
    ///
    /// assert_eq!(Cancelled::Event(LifecycleEvent::Pause).as_label(), "cancelled_event");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            Cancelled::Event(_) => "cancelled_event",
            Cancelled::Tag(_) => "cancelled_tag",
            Cancelled::Closed => "cancelled_closed",
            Cancelled::Rejected(_) => "cancelled_rejected",
        }
    }

    /// Returns a human-readable message with details about the reason.
    pub fn as_message(&self) -> String {
        match self {
            Cancelled::Event(ev) => format!("event: {ev}"),
            Cancelled::Tag(tag) => format!("tag: {tag}"),
            Cancelled::Closed => "closed".to_string(),
            Cancelled::Rejected(err) => format!("rejected: {}", err.as_message()),
        }
    }

    /// Returns `true` if the signal fired because the bind itself failed.
    ///
    /// # Example
    /// ```
    /// use lifebind::{BindError, Cancelled};
    ///
    /// assert!(Cancelled::from(BindError::MissingOwner).is_rejection());
    /// assert!(!Cancelled::Closed.is_rejection());
    /// ```
    pub fn is_rejection(&self) -> bool {
        matches!(self, Cancelled::Rejected(_))
    }
}
