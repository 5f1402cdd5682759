//! Cancellation signals and the sources that fire them.
//!
//! ## Contents
//! - [`CancelSignal`] single-shot signal handed to consumers
//! - [`TagCancelChannel`] tag fan-out where the latest bind of a tag wins
//! - `gate` lifecycle event filter feeding a signal from a manager's channel

mod cancel;
mod gate;
mod tags;

pub use cancel::CancelSignal;
pub use tags::TagCancelChannel;

pub(crate) use gate::bind_gate;
