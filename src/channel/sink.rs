//! # Downstream contract
//!
//! A [`Sink`] receives the notifications of one subscription. The channel calls
//! it from whichever thread published, but never concurrently and never out of
//! order for the same subscription.
//!
//! Closures taking a [`Notification`] are sinks:
//! ```rust
//! use lifebind::{BroadcastLatest, Notification};
//!
//! let ch: BroadcastLatest<u32> = BroadcastLatest::new();
//! let _sub = ch.subscribe(|n: Notification<u32>| {
//!     if let Notification::Next(v) = n {
//!         println!("got {v}");
//!     }
//! });
//! ch.publish(1);
//! ```

use super::notification::Notification;

/// Receiver of one subscription's notifications.
///
/// Panics raised here are **not** caught by the channel; they unwind into the
/// publishing thread.
pub trait Sink<T, E>: Send + Sync + 'static {
    /// Handles a single notification.
    fn on_notification(&self, notification: Notification<T, E>);
}

impl<T, E, F> Sink<T, E> for F
where
    F: Fn(Notification<T, E>) + Send + Sync + 'static,
{
    #[inline]
    fn on_notification(&self, notification: Notification<T, E>) {
        self(notification)
    }
}

/// Handle that can stop a running subscription.
pub trait Disposable: Send + Sync {
    /// Stops delivery. Idempotent.
    fn dispose(&self);

    /// Returns `true` once disposed or after a terminal was delivered.
    fn is_disposed(&self) -> bool;
}
