//! Broadcast channel: replay-latest multicast with one-shot terminal.
//!
//! ## Contents
//! - [`BroadcastLatest`], [`ChannelBuilder`], [`Subscription`] the channel and its handles
//! - [`Notification`] value / error / completion signal
//! - [`Sink`], [`Disposable`] downstream and cancellation contracts
//! - [`Replay`] what a new subscriber receives first
//!
//! The lifecycle registry, the tag channel and the diagnostics bus are all
//! built on this primitive.

mod broadcast;
mod notification;
mod sink;
mod slot;

pub use broadcast::{BroadcastLatest, ChannelBuilder, Subscription};
pub use notification::Notification;
pub use sink::{Disposable, Sink};

/// What a new subscriber receives before live values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Replay {
    /// The most recently published value, if any (default).
    #[default]
    Latest,
    /// Nothing: pure fan-out of values published after subscribing.
    ///
    /// A terminated channel still delivers its terminal.
    Off,
}
