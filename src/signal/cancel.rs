//! # Single-shot cancellation signal.
//!
//! A [`CancelSignal`] is what every bind returns. It fires at most once, carrying
//! the [`Cancelled`] reason, and bridges into async code through a
//! [`CancellationToken`].
//!
//! ## Architecture
//! ```text
//! source (lifecycle gate / tag gate)
//!        │ fire(reason)           (first call wins)
//!        ▼
//!   ┌─────────────────────┐
//!   │ reason: OnceLock    │──► token.cancel() ──► run_until / spawn / cancelled()
//!   │ source: Subscription│──► disposed (stop listening)
//!   │ hooks               │──► or()-combined signals
//!   └─────────────────────┘
//! ```
//!
//! ## Rules
//! - The reason is set before the token is cancelled, so any task woken by the
//!   token reads it.
//! - Firing disposes the source subscription; so does dropping the last clone.
//! - [`CancelSignal::unbind`] stops listening without firing.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock, Weak};

use futures::Stream;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::Disposable;
use crate::error::{BindError, Cancelled};

type Hook = Box<dyn FnOnce(&Cancelled) + Send>;

struct Inner {
    reason: OnceLock<Cancelled>,
    token: CancellationToken,
    source: Mutex<Option<Box<dyn Disposable>>>,
    hooks: Mutex<Vec<Hook>>,
    /// Upstream signals kept alive by an `or` combination.
    links: Mutex<Vec<CancelSignal>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            reason: OnceLock::new(),
            token: CancellationToken::new(),
            source: Mutex::new(None),
            hooks: Mutex::new(Vec::new()),
            links: Mutex::new(Vec::new()),
        }
    }

    fn fire(&self, reason: Cancelled) -> bool {
        if self.reason.set(reason).is_err() {
            return false;
        }
        self.token.cancel();

        let source = self.source.lock().take();
        if let Some(source) = source {
            source.dispose();
        }
        let hooks = std::mem::take(&mut *self.hooks.lock());
        if let Some(reason) = self.reason.get() {
            for hook in hooks {
                hook(reason);
            }
        }
        let links = std::mem::take(&mut *self.links.lock());
        drop(links);
        true
    }

    fn attach(&self, source: Box<dyn Disposable>) {
        if self.reason.get().is_some() {
            source.dispose();
            return;
        }
        *self.source.lock() = Some(source);
        // fired between the check and the store
        if self.reason.get().is_some() {
            let source = self.source.lock().take();
            if let Some(source) = source {
                source.dispose();
            }
        }
    }

    fn add_hook(&self, hook: Hook) {
        let mut hooks = self.hooks.lock();
        match self.reason.get() {
            Some(reason) => {
                drop(hooks);
                hook(reason);
            }
            None => hooks.push(hook),
        }
    }
}

/// Weak handle a source uses to fire a signal.
#[derive(Clone)]
pub(crate) struct Trigger {
    inner: Weak<Inner>,
}

impl Trigger {
    /// Fires the signal if it is still alive. Returns `true` on the first call.
    pub(crate) fn fire(&self, reason: Cancelled) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.fire(reason),
            None => false,
        }
    }
}

/// Single-shot cancellation signal.
///
/// Cheap to clone; clones observe the same firing.
///
/// ### Example
/// ```rust
/// use lifebind::{BasicOwner, Cancelled, LifecycleEvent, LifecycleRegistry};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = LifecycleRegistry::new();
/// let owner = BasicOwner::new("screen");
/// owner.advance(&[LifecycleEvent::Create, LifecycleEvent::Start, LifecycleEvent::Resume]);
///
/// let signal = registry.bind_until_event(&owner, LifecycleEvent::Pause);
/// owner.handle_event(LifecycleEvent::Pause);
///
/// let res = signal.run_until(std::future::pending::<()>()).await;
/// assert_eq!(res, Err(Cancelled::Event(LifecycleEvent::Pause)));
/// # }
/// ```
#[derive(Clone)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

impl CancelSignal {
    /// Signal that has not fired and has no source yet.
    pub(crate) fn pending() -> Self {
        Self {
            inner: Arc::new(Inner::new()),
        }
    }

    /// Signal that already fired because the bind was rejected.
    pub(crate) fn rejected(err: BindError) -> Self {
        let signal = Self::pending();
        signal.inner.fire(Cancelled::Rejected(err));
        signal
    }

    pub(crate) fn trigger(&self) -> Trigger {
        Trigger {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Stores the subscription feeding this signal.
    pub(crate) fn attach(&self, source: Box<dyn Disposable>) {
        self.inner.attach(source);
    }

    /// Token cancelled when the signal fires.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Child token: cancelled with the signal, but can also be cancelled alone.
    pub fn child_token(&self) -> CancellationToken {
        self.inner.token.child_token()
    }

    /// Returns `true` once the signal fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner.reason.get().is_some()
    }

    /// Reason the signal fired, if it did.
    pub fn outcome(&self) -> Option<Cancelled> {
        self.inner.reason.get().cloned()
    }

    /// Waits until the signal fires and returns the reason.
    pub async fn cancelled(&self) -> Cancelled {
        self.inner.token.cancelled().await;
        self.outcome().unwrap_or(Cancelled::Closed)
    }

    /// Runs `fut` until it completes or the signal fires, whichever is first.
    ///
    /// An already-fired signal never polls `fut`.
    pub async fn run_until<F>(&self, fut: F) -> Result<F::Output, Cancelled>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(reason),
            out = fut => Ok(out),
        }
    }

    /// Spawns `fut` on the current tokio runtime, stopping it when the signal fires.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<Result<F::Output, Cancelled>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let signal = self.clone();
        tokio::spawn(async move { signal.run_until(fut).await })
    }

    /// Stream yielding the reason once, then ending.
    pub fn into_stream(self) -> impl Stream<Item = Cancelled> + Send + 'static {
        futures::stream::once(async move { self.cancelled().await })
    }

    /// Signal firing as soon as either `self` or `other` fires.
    pub fn or(&self, other: &CancelSignal) -> CancelSignal {
        let combined = CancelSignal::pending();
        for parent in [self, other] {
            if combined.is_cancelled() {
                break;
            }
            combined.inner.links.lock().push(parent.clone());
            let target = combined.trigger();
            parent.inner.add_hook(Box::new(move |reason| {
                target.fire(reason.clone());
            }));
        }
        combined
    }

    /// Stops listening to the source without firing.
    ///
    /// The signal stays pending forever unless it already fired.
    pub fn unbind(&self) {
        let source = self.inner.source.lock().take();
        if let Some(source) = source {
            source.dispose();
        }
        let links = std::mem::take(&mut *self.inner.links.lock());
        drop(links);
    }

    /// Returns `true` if the signal is still attached to a source.
    pub fn is_bound(&self) -> bool {
        self.inner
            .source
            .lock()
            .as_ref()
            .is_some_and(|s| !s.is_disposed())
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("outcome", &self.inner.reason.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct Flag(Arc<AtomicBool>);

    impl Disposable for Flag {
        fn dispose(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
        fn is_disposed(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_fire_is_single_shot_and_disposes_source() {
        let s = CancelSignal::pending();
        let disposed = Arc::new(AtomicBool::new(false));
        s.attach(Box::new(Flag(Arc::clone(&disposed))));
        assert!(s.is_bound());

        let t = s.trigger();
        assert!(t.fire(Cancelled::Closed));
        assert!(!t.fire(Cancelled::Tag("x".into())));

        assert_eq!(s.outcome(), Some(Cancelled::Closed));
        assert!(s.token().is_cancelled());
        assert!(disposed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_attach_after_fire_disposes_immediately() {
        let s = CancelSignal::rejected(BindError::EmptyTag);
        let disposed = Arc::new(AtomicBool::new(false));
        s.attach(Box::new(Flag(Arc::clone(&disposed))));
        assert!(disposed.load(Ordering::SeqCst));
        assert!(!s.is_bound());
    }

    #[test]
    fn test_unbind_keeps_signal_pending() {
        let s = CancelSignal::pending();
        let disposed = Arc::new(AtomicBool::new(false));
        s.attach(Box::new(Flag(Arc::clone(&disposed))));
        s.unbind();
        assert!(disposed.load(Ordering::SeqCst));
        assert!(!s.is_cancelled());
    }

    #[test]
    fn test_dropped_signal_cannot_fire() {
        let s = CancelSignal::pending();
        let t = s.trigger();
        drop(s);
        assert!(!t.fire(Cancelled::Closed));
    }

    #[test]
    fn test_or_fires_with_first_reason() {
        let a = CancelSignal::pending();
        let b = CancelSignal::pending();
        let either = a.or(&b);

        b.trigger().fire(Cancelled::Tag("b".into()));
        a.trigger().fire(Cancelled::Closed);
        assert_eq!(either.outcome(), Some(Cancelled::Tag("b".into())));

        let late = a.or(&CancelSignal::pending());
        assert_eq!(late.outcome(), Some(Cancelled::Closed));
    }

    #[tokio::test]
    async fn test_run_until_completes_when_not_fired() {
        let s = CancelSignal::pending();
        let out = s.run_until(async { 7 }).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_stops_on_fire() {
        let s = CancelSignal::pending();
        let handle = s.spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            "finished"
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        s.trigger().fire(Cancelled::Closed);

        let res = handle.await.expect("task panicked");
        assert_eq!(res, Err(Cancelled::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_token_follows_signal_but_cancels_alone() {
        let s = CancelSignal::pending();
        let own = s.child_token();
        own.cancel();
        assert!(own.is_cancelled());
        assert!(!s.is_cancelled());
        assert!(!s.token().is_cancelled());

        let child = s.child_token();
        let waiter = tokio::spawn(async move {
            child.cancelled().await;
            "child cancelled"
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        s.trigger().fire(Cancelled::Closed);
        assert_eq!(waiter.await.expect("task panicked"), "child cancelled");
    }

    #[tokio::test]
    async fn test_stream_yields_reason_once() {
        use futures::StreamExt;

        let s = CancelSignal::rejected(BindError::MissingOwner);
        let items: Vec<Cancelled> = s.into_stream().collect().await;
        assert_eq!(items, vec![Cancelled::Rejected(BindError::MissingOwner)]);
    }
}
