//! # Tag cancel channel.
//!
//! Process-wide fan-out of string tags. A consumer binds to a tag and is
//! cancelled the next time that tag is sent. With
//! [`TagPolicy::CancelPrevious`], binding sends the tag first, so "the latest
//! call with a tag wins": a repeated request supersedes the one still running.
//!
//! ## Architecture
//! ```text
//! send_filter_tag("load") ──► channel (Replay::Off, never terminates)
//!                                 ├──► TagGate("load")  ──► fire(Cancelled::Tag)
//!                                 ├──► TagGate("load")  ──► fire(Cancelled::Tag)
//!                                 └──► TagGate("other")      (ignored)
//! ```
//!
//! ## Rules
//! - Tags are compared exactly; the empty tag is rejected.
//! - Nothing is replayed: a bind only sees tags sent after it subscribed.
//! - Two binds of the same tag racing on different threads may both survive;
//!   ordering is only guaranteed for binds issued one after the other.

use std::convert::Infallible;
use std::sync::{Arc, LazyLock};

use super::cancel::{CancelSignal, Trigger};
use crate::channel::{BroadcastLatest, Notification, Replay, Sink};
use crate::core::{Config, TagPolicy};
use crate::error::{BindError, Cancelled};
use crate::events::{Bus, Event, EventKind};

static GLOBAL: LazyLock<TagCancelChannel> = LazyLock::new(TagCancelChannel::new);

struct TagGate {
    tag: Arc<str>,
    trigger: Trigger,
}

impl Sink<Arc<str>, Infallible> for TagGate {
    fn on_notification(&self, notification: Notification<Arc<str>, Infallible>) {
        match notification {
            Notification::Next(tag) if tag == self.tag => {
                self.trigger.fire(Cancelled::Tag(tag));
            }
            Notification::Next(_) => {}
            Notification::Completed => {
                self.trigger.fire(Cancelled::Closed);
            }
            Notification::Error(never) => match never {},
        }
    }
}

/// Multicast of cancellation tags.
///
/// Cheap to clone; clones share the same channel.
///
/// ### Example
/// ```rust
/// use lifebind::{Cancelled, TagCancelChannel};
///
/// let tags = TagCancelChannel::new();
/// let first = tags.bind_filter_tag("load");
/// let second = tags.bind_filter_tag("load");
///
/// assert_eq!(first.outcome(), Some(Cancelled::Tag("load".into())));
/// assert!(!second.is_cancelled());
/// ```
#[derive(Clone, Debug)]
pub struct TagCancelChannel {
    channel: BroadcastLatest<Arc<str>>,
    policy: TagPolicy,
    bus: Option<Bus>,
}

impl TagCancelChannel {
    /// Creates a channel with the default [`Config`].
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Creates a channel whose policy and diagnostics follow `cfg`.
    pub fn with_config(cfg: &Config) -> Self {
        Self {
            channel: BroadcastLatest::builder().replay(Replay::Off).build(),
            policy: cfg.tag_policy,
            bus: cfg.diagnostics.then(Bus::new),
        }
    }

    /// Process-wide channel with the default [`Config`].
    pub fn global() -> &'static TagCancelChannel {
        &GLOBAL
    }

    /// Binds to `tag` with the configured [`TagPolicy`].
    pub fn bind_filter_tag(&self, tag: &str) -> CancelSignal {
        self.bind_filter_tag_with(tag, self.policy)
    }

    /// Binds to `tag` with an explicit policy.
    ///
    /// An empty tag yields an already-fired signal carrying
    /// [`BindError::EmptyTag`].
    pub fn bind_filter_tag_with(&self, tag: &str, policy: TagPolicy) -> CancelSignal {
        if tag.is_empty() {
            self.emit(|| {
                Event::new(EventKind::BindRejected).with_reason(BindError::EmptyTag.as_label())
            });
            return CancelSignal::rejected(BindError::EmptyTag);
        }
        let tag: Arc<str> = Arc::from(tag);
        if policy == TagPolicy::CancelPrevious {
            self.send(Arc::clone(&tag));
        }

        let signal = CancelSignal::pending();
        let sub = self.channel.subscribe(TagGate {
            tag,
            trigger: signal.trigger(),
        });
        signal.attach(Box::new(sub));
        signal
    }

    /// Cancels every binding currently waiting on `tag`.
    ///
    /// Returns `false` for the empty tag, which is ignored.
    pub fn send_filter_tag(&self, tag: &str) -> bool {
        if tag.is_empty() {
            return false;
        }
        self.send(Arc::from(tag));
        true
    }

    /// Number of bindings still waiting.
    pub fn pending_count(&self) -> usize {
        self.channel.subscriber_count()
    }

    /// Diagnostics bus, if enabled.
    pub fn bus(&self) -> Option<&Bus> {
        self.bus.as_ref()
    }

    fn send(&self, tag: Arc<str>) {
        tracing::trace!(tag = %tag, "tag sent");
        self.emit(|| Event::new(EventKind::TagSent).with_tag(Arc::clone(&tag)));
        self.channel.publish(tag);
    }

    #[inline]
    fn emit<F: FnOnce() -> Event>(&self, make: F) {
        if let Some(bus) = &self.bus {
            bus.publish_with(make);
        }
    }
}

impl Default for TagCancelChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    #[test]
    fn test_latest_bind_cancels_previous() {
        let tags = TagCancelChannel::new();
        let a = tags.bind_filter_tag("t");
        let b = tags.bind_filter_tag("t");
        let other = tags.bind_filter_tag("u");

        assert_eq!(a.outcome(), Some(Cancelled::Tag("t".into())));
        assert!(!b.is_cancelled());
        assert!(!other.is_cancelled());
        assert_eq!(tags.pending_count(), 2);
    }

    #[test]
    fn test_keep_previous_binds_silently() {
        let tags = TagCancelChannel::new();
        let a = tags.bind_filter_tag_with("t", TagPolicy::KeepPrevious);
        let b = tags.bind_filter_tag_with("t", TagPolicy::KeepPrevious);
        assert!(!a.is_cancelled());

        assert!(tags.send_filter_tag("t"));
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert_eq!(tags.pending_count(), 0);
    }

    #[test]
    fn test_empty_tag_is_rejected() {
        let tags = TagCancelChannel::new();
        let s = tags.bind_filter_tag("");
        assert_eq!(s.outcome(), Some(Cancelled::Rejected(BindError::EmptyTag)));
        assert!(!tags.send_filter_tag(""));
        assert_eq!(tags.pending_count(), 0);
    }

    #[test]
    fn test_config_policy_is_default_for_bind() {
        let cfg = Config {
            tag_policy: TagPolicy::KeepPrevious,
            ..Config::default()
        };
        let tags = TagCancelChannel::with_config(&cfg);
        let a = tags.bind_filter_tag("t");
        let _b = tags.bind_filter_tag("t");
        assert!(!a.is_cancelled());
    }

    #[test]
    fn test_tag_sent_reaches_bus() {
        use crate::channel::Notification;
        use parking_lot::Mutex;

        let tags = TagCancelChannel::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = tags.bus().map(|bus| {
            bus.subscribe(move |n: Notification<Event>| {
                if let Notification::Next(ev) = n {
                    s.lock().push((ev.kind, ev.tag));
                }
            })
        });

        tags.send_filter_tag("x");
        assert_eq!(*seen.lock(), vec![(EventKind::TagSent, Some(Arc::<str>::from("x")))]);
    }

    /// A producer needing 1000 ms is superseded 10 ms in by a second request
    /// with the same tag; only the second one finishes.
    #[tokio::test(start_paused = true)]
    async fn test_second_request_supersedes_first() {
        let tags = TagCancelChannel::new();
        let start = Instant::now();

        let produce = |signal: CancelSignal| {
            signal.spawn(async {
                sleep(Duration::from_millis(1000)).await;
                Instant::now()
            })
        };

        let first = produce(tags.bind_filter_tag("getData"));
        sleep(Duration::from_millis(10)).await;
        let second = produce(tags.bind_filter_tag("getData"));

        let first = first.await.expect("first task panicked");
        let second = second.await.expect("second task panicked");

        assert_eq!(first, Err(Cancelled::Tag("getData".into())));
        let done = second.expect("second request must complete");
        let elapsed = done - start;
        assert!(elapsed >= Duration::from_millis(1010), "finished after {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1020), "finished after {elapsed:?}");
    }
}
