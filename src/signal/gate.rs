//! # Lifecycle event gate.
//!
//! Sink over a manager's lifecycle channel that fires a [`CancelSignal`] on the
//! first occurrence of one target event. Binding after the event already
//! happened fires at once through the channel's replay.
//!
//! If the channel closes first (owner destroyed while waiting for, say,
//! `Pause`), the gate fires [`Cancelled::Closed`] instead of leaving the
//! consumer waiting. A gate waiting for `Destroy` that only sees the closed
//! channel fires `Destroy`.

use std::convert::Infallible;

use super::cancel::{CancelSignal, Trigger};
use crate::channel::{BroadcastLatest, Notification, Sink};
use crate::error::Cancelled;
use crate::lifecycle::LifecycleEvent;

pub(crate) struct EventGate {
    target: LifecycleEvent,
    trigger: Trigger,
}

impl Sink<LifecycleEvent, Infallible> for EventGate {
    fn on_notification(&self, notification: Notification<LifecycleEvent, Infallible>) {
        match notification {
            Notification::Next(ev) if ev == self.target => {
                self.trigger.fire(Cancelled::Event(ev));
            }
            Notification::Next(_) => {}
            // the channel only completes right after `Destroy` (or once the
            // owner is gone), so a destroy gate that missed it still fires
            Notification::Completed if self.target.is_terminal() => {
                self.trigger.fire(Cancelled::Event(LifecycleEvent::Destroy));
            }
            Notification::Completed => {
                self.trigger.fire(Cancelled::Closed);
            }
            Notification::Error(never) => match never {},
        }
    }
}

/// Subscribes a gate for `target` and returns the signal it drives.
pub(crate) fn bind_gate(
    channel: &BroadcastLatest<LifecycleEvent>,
    target: LifecycleEvent,
) -> CancelSignal {
    let signal = CancelSignal::pending();
    let sub = channel.subscribe(EventGate {
        target,
        trigger: signal.trigger(),
    });
    signal.attach(Box::new(sub));
    signal
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent::*;

    #[test]
    fn test_gate_fires_once_on_target() {
        let ch: BroadcastLatest<LifecycleEvent> = BroadcastLatest::new();
        let signal = bind_gate(&ch, Pause);
        ch.publish(Resume);
        assert!(!signal.is_cancelled());

        ch.publish(Pause);
        assert_eq!(signal.outcome(), Some(Cancelled::Event(Pause)));
        assert_eq!(ch.subscriber_count(), 0);
    }

    #[test]
    fn test_gate_fires_on_replayed_target() {
        let ch = BroadcastLatest::with_value(Pause);
        let signal = bind_gate(&ch, Pause);
        assert_eq!(signal.outcome(), Some(Cancelled::Event(Pause)));
        assert!(!signal.is_bound());
    }

    #[test]
    fn test_gate_fires_closed_when_channel_completes() {
        let ch: BroadcastLatest<LifecycleEvent> = BroadcastLatest::new();
        let signal = bind_gate(&ch, Pause);
        ch.publish(Destroy);
        ch.complete();
        assert_eq!(signal.outcome(), Some(Cancelled::Closed));

        let late = bind_gate(&ch, Pause);
        assert_eq!(late.outcome(), Some(Cancelled::Closed));
    }

    #[test]
    fn test_destroy_gate_after_close_reports_destroy() {
        let ch: BroadcastLatest<LifecycleEvent> = BroadcastLatest::new();
        ch.publish(Destroy);
        ch.complete();
        let late = bind_gate(&ch, Destroy);
        assert_eq!(late.outcome(), Some(Cancelled::Event(Destroy)));
    }

    #[test]
    fn test_dropping_signal_unsubscribes_gate() {
        let ch: BroadcastLatest<LifecycleEvent> = BroadcastLatest::new();
        let signal = bind_gate(&ch, Stop);
        assert_eq!(ch.subscriber_count(), 1);
        drop(signal);
        assert_eq!(ch.subscriber_count(), 0);
    }
}
