//! Lifecycle model: events, states and the owner contract.
//!
//! ## Contents
//! - [`LifecycleEvent`], [`LifecycleState`] the ordered event/state machine
//! - [`LifecycleOwner`], [`Lifecycle`], [`LifecycleObserver`] what an owner must provide
//! - [`OwnerKey`] registry identity of an owner
//! - [`OwnerLifecycle`], [`BasicOwner`] reference implementations

mod dispatcher;
mod event;
mod owner;

pub use dispatcher::{BasicOwner, OwnerLifecycle};
pub use event::{LifecycleEvent, LifecycleState};
pub use owner::{Lifecycle, LifecycleObserver, LifecycleOwner, OwnerKey};

pub(crate) use owner::same_object;
