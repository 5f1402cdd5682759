//! # Registry and tag channel configuration.
//!
//! Provides [`Config`], the settings shared by
//! [`LifecycleRegistry`](crate::LifecycleRegistry) and
//! [`TagCancelChannel`](crate::TagCancelChannel).
//!
//! ## Sentinel values
//! - `registry_shards = 0` → dashmap's own default shard count
//! - `diagnostics = false` → no [`Bus`](crate::Bus) is created; nothing is emitted
//!
//! # Example
//! ```
//! use lifebind::{Config, TagPolicy};
//!
//! let mut cfg = Config::default();
//! cfg.tag_policy = TagPolicy::KeepPrevious;
//! cfg.registry_shards = 6;
//!
//! assert_eq!(cfg.shard_amount(), Some(8));
//! ```

/// What a new tag binding does to earlier bindings with the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagPolicy {
    /// Send the tag on bind, cancelling earlier bindings (default).
    #[default]
    CancelPrevious,
    /// Bind silently; earlier bindings keep running until the tag is sent.
    KeepPrevious,
}

/// Configuration for the registry and the tag channel.
///
/// ## Field semantics
/// - `tag_policy`: default policy of `bind_filter_tag`
/// - `registry_shards`: shard count of the registry map (`0` = default)
/// - `diagnostics`: create a diagnostics bus
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over checking the `0`
/// sentinel by hand.
#[derive(Clone, Debug)]
pub struct Config {
    /// Default policy for tag bindings.
    pub tag_policy: TagPolicy,

    /// Number of registry shards.
    ///
    /// - `0` = dashmap default
    /// - `n > 0` = rounded up to a power of two, at least 2
    pub registry_shards: usize,

    /// Emit diagnostics [`Event`](crate::Event)s on a bus.
    pub diagnostics: bool,
}

impl Config {
    /// Returns the registry shard count as an `Option`.
    ///
    /// - `None` → dashmap default
    /// - `Some(n)` → `n` is a power of two ≥ 2
    #[inline]
    pub fn shard_amount(&self) -> Option<usize> {
        if self.registry_shards == 0 {
            None
        } else {
            Some(self.registry_shards.max(2).next_power_of_two())
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `tag_policy = CancelPrevious` (latest call with a tag wins)
    /// - `registry_shards = 0` (dashmap default)
    /// - `diagnostics = true`
    fn default() -> Self {
        Self {
            tag_policy: TagPolicy::default(),
            registry_shards: 0,
            diagnostics: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_amount_sentinel_and_rounding() {
        let mut cfg = Config::default();
        assert_eq!(cfg.shard_amount(), None);

        cfg.registry_shards = 1;
        assert_eq!(cfg.shard_amount(), Some(2));
        cfg.registry_shards = 16;
        assert_eq!(cfg.shard_amount(), Some(16));
        cfg.registry_shards = 17;
        assert_eq!(cfg.shard_amount(), Some(32));
    }
}
