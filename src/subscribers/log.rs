//! # LogWriter - diagnostics event printer
//!
//! A minimal sink that renders incoming [`Event`]s as `tracing` records.
//! Use it for tests or demos.
//!
//! ## Example output (with a fmt subscriber)
//! ```text
//! DEBUG lifebind: [manager-created] key=screen-1
//! DEBUG lifebind: [owner-attached] key=screen-1
//! DEBUG lifebind: [tag-sent] tag=getData
//!  INFO lifebind: [bind-rejected] key=None reason=bind_missing_owner
//! DEBUG lifebind: [manager-removed] key=screen-1 reason=destroy
//! ```

use crate::channel::{Notification, Sink};
use crate::events::{Event, EventKind};

/// Event writer sink.
#[derive(Default, Clone, Copy, Debug)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn write(&self, e: &Event) {
        let key = e.key.as_ref().map(|k| k.as_str());
        match e.kind {
            EventKind::ManagerCreated => {
                tracing::debug!(target: "lifebind", seq = e.seq, "[manager-created] key={}", key.unwrap_or("?"));
            }
            EventKind::OwnerAttached => {
                tracing::debug!(target: "lifebind", seq = e.seq, "[owner-attached] key={}", key.unwrap_or("?"));
            }
            EventKind::ManagerRemoved => {
                tracing::debug!(
                    target: "lifebind",
                    seq = e.seq,
                    "[manager-removed] key={} reason={}",
                    key.unwrap_or("?"),
                    e.reason.as_deref().unwrap_or("unknown"),
                );
            }
            EventKind::CleanupDeferred => {
                tracing::trace!(
                    target: "lifebind",
                    seq = e.seq,
                    "[cleanup-deferred] key={} reason={}",
                    key.unwrap_or("?"),
                    e.reason.as_deref().unwrap_or("unknown"),
                );
            }
            EventKind::BindRejected => {
                tracing::info!(
                    target: "lifebind",
                    seq = e.seq,
                    "[bind-rejected] key={:?} tag={:?} reason={}",
                    key,
                    e.tag.as_deref(),
                    e.reason.as_deref().unwrap_or("unknown"),
                );
            }
            EventKind::TagSent => {
                tracing::debug!(target: "lifebind", seq = e.seq, "[tag-sent] tag={}", e.tag.as_deref().unwrap_or(""));
            }
        }
    }
}

impl Sink<Event, std::convert::Infallible> for LogWriter {
    fn on_notification(&self, notification: Notification<Event>) {
        if let Notification::Next(e) = notification {
            self.write(&e);
        }
    }
}
