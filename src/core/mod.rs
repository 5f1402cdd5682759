//! Binding core: keyed registry of lifecycle managers.
//!
//! The public API from this module is [`LifecycleRegistry`] and its
//! [`Config`]. Everything else is the machinery that keeps exactly one manager
//! per owner key alive.
//!
//! Internal modules:
//! - [`registry`]: key → manager map and the bind algorithm;
//! - [`manager`]: observes one owner and republishes its events;
//! - [`guard`]: tri-state CAS guard arbitrating bind vs. removal;
//! - [`config`]: registry and tag channel settings.

mod config;
mod guard;
mod manager;
mod registry;

pub use config::{Config, TagPolicy};
pub use registry::LifecycleRegistry;
