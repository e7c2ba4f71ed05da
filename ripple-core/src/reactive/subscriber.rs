//! Identifiers for the two ends of a dependency edge.
//!
//! An edge connects a *target* (a reactive object, a ref, a computed) and one
//! of its keys to a *subscriber* (an effect). Both ends are addressed by
//! plain integer ids so that the dependency graph never has to hold a strong
//! reference to either of them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for an effect.
///
/// Every effect (plain, computed, watcher, component render) gets a fresh ID
/// when it is created. The dependency map stores these IDs rather than the
/// effects themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for an observable target.
///
/// Raw objects, refs and computed values each own one. It outlives nothing:
/// when the owner is dropped, its entries are reaped from the dependency map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// The key half of a dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    /// A named property of a reactive object.
    Prop(Arc<str>),

    /// Structural dependency: key enumeration, length, additions and deletions.
    Iterate,

    /// The single slot of a ref or computed.
    Value,
}

impl TrackKey {
    /// Key for a named property.
    pub fn prop(name: &str) -> Self {
        TrackKey::Prop(Arc::from(name))
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKey::Prop(name) => write!(f, "{name}"),
            TrackKey::Iterate => f.write_str("<iterate>"),
            TrackKey::Value => f.write_str("value"),
        }
    }
}

/// A (target, key) pair: one dependency set in the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DepKey {
    pub target: TargetId,
    pub key: TrackKey,
}

impl DepKey {
    pub fn new(target: TargetId, key: TrackKey) -> Self {
        Self { target, key }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_ids_are_unique() {
        let id1 = EffectId::new();
        let id2 = EffectId::new();
        let id3 = EffectId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn target_ids_are_monotonic() {
        let a = TargetId::new();
        let b = TargetId::new();
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn dep_keys_compare_by_target_and_key() {
        let target = TargetId::new();
        assert_eq!(
            DepKey::new(target, TrackKey::prop("a")),
            DepKey::new(target, TrackKey::prop("a"))
        );
        assert_ne!(
            DepKey::new(target, TrackKey::prop("a")),
            DepKey::new(target, TrackKey::Iterate)
        );
        assert_eq!(TrackKey::Iterate.to_string(), "<iterate>");
    }
}
