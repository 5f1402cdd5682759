//! # Lifecycle owner contract.
//!
//! The component that emits lifecycle events lives outside this crate. It is
//! seen only through two traits:
//! - [`LifecycleOwner`]: a stable [`OwnerKey`] plus access to its lifecycle;
//! - [`Lifecycle`]: current state and observer registration.
//!
//! Observers are compared by identity (`Arc` data pointer), so the same
//! `Arc<dyn LifecycleObserver>` must be passed to `remove_observer` that was
//! passed to `add_observer`.

use std::fmt;
use std::sync::Arc;

use super::event::{LifecycleEvent, LifecycleState};

/// Stable identity of a lifecycle owner; the registry key.
///
/// Two owners reporting the same key share one registry entry, so the key must
/// stay unique for as long as the owner is alive.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerKey(Arc<str>);

impl OwnerKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// Key derived from the type name and address of `owner`.
    ///
    /// Valid only while `owner` is alive: a later allocation may reuse the
    /// address.
    pub fn of<T: ?Sized>(owner: &Arc<T>) -> Self {
        let addr = Arc::as_ptr(owner) as *const () as usize;
        Self(format!("{}@{addr:x}", std::any::type_name::<T>()).into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerKey({})", self.0)
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OwnerKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Receiver of lifecycle events.
pub trait LifecycleObserver: Send + Sync + 'static {
    fn on_lifecycle_event(&self, event: LifecycleEvent);
}

/// Event source of an owner.
///
/// Implementations deliver events in order and deliver `Destroy` at most once.
pub trait Lifecycle: Send + Sync {
    /// State after the last dispatched event.
    fn current_state(&self) -> LifecycleState;

    /// Starts delivering events to `observer`.
    fn add_observer(&self, observer: Arc<dyn LifecycleObserver>);

    /// Stops delivering events to `observer` (matched by identity).
    fn remove_observer(&self, observer: &Arc<dyn LifecycleObserver>);
}

/// Component whose lifecycle drives cancellation.
pub trait LifecycleOwner: Send + Sync + 'static {
    /// Stable identity used as the registry key.
    fn owner_key(&self) -> OwnerKey;

    /// The owner's lifecycle, or `None` if this kind of owner has none.
    fn lifecycle(&self) -> Option<&dyn Lifecycle>;
}

/// Identity comparison for trait objects (ignores vtable pointers).
#[inline]
pub(crate) fn same_object<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: &Arc<U>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
