//! Observed Objects
//!
//! A [`RawObject`] is a plain, insertion-ordered key-value container. A
//! [`Reactive`] is the observed view of one: every accessor reports to the
//! dependency tracker, so effects that read through it re-run when it
//! changes.
//!
//! | accessor        | tracks                  | triggers                      |
//! |-----------------|-------------------------|-------------------------------|
//! | `get`, `has`    | the key                 |                               |
//! | `keys`, `len`   | iteration               |                               |
//! | `set` (new key) |                         | the key and iteration         |
//! | `set` (changed) |                         | the key                       |
//! | `delete`        |                         | the key and iteration         |
//!
//! Nested objects are wrapped lazily, when read. Each raw object has at most
//! one live reactive view: wrapping twice returns the same handle.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;

use super::runtime::Runtime;
use super::subscriber::{TargetId, TrackKey};
use super::value::{same_value, Value};

// target -> live proxy. The reverse direction is the proxy's own field.
static PROXIES: OnceLock<DashMap<TargetId, Weak<ProxyInner>>> = OnceLock::new();

fn proxies() -> &'static DashMap<TargetId, Weak<ProxyInner>> {
    PROXIES.get_or_init(DashMap::new)
}

struct ObjectData {
    id: TargetId,
    entries: RwLock<IndexMap<Arc<str>, Value>>,
    /// Set by [`mark_raw`].
    skip: AtomicBool,
}

impl Drop for ObjectData {
    fn drop(&mut self) {
        Runtime::reap_target(self.id);
    }
}

/// A plain key-value container.
///
/// Cloning yields another handle to the same object. Reads and writes on a
/// raw object are never tracked.
#[derive(Clone)]
pub struct RawObject {
    data: Arc<ObjectData>,
}

impl RawObject {
    pub fn new() -> Self {
        Self {
            data: Arc::new(ObjectData {
                id: TargetId::new(),
                entries: RwLock::new(IndexMap::new()),
                skip: AtomicBool::new(false),
            }),
        }
    }

    /// Builder-style insert.
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn id(&self) -> TargetId {
        self.data.id
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.entries.read().get(key).cloned()
    }

    /// Store a value, unwrapping reactive objects to their raw form.
    pub fn insert(&self, key: &str, value: impl Into<Value>) -> Option<Value> {
        let raw = value.into().to_raw();
        self.data.entries.write().insert(Arc::from(key), raw)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.data.entries.write().shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.entries.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<Arc<str>> {
        self.data.entries.read().keys().cloned().collect()
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<(Arc<str>, Value)> {
        self.data
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_marked_raw(&self) -> bool {
        self.data.skip.load(Ordering::SeqCst)
    }

    pub fn ptr_eq(&self, other: &RawObject) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Default for RawObject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.data.entries.read();
        f.debug_map()
            .entries(entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

struct ProxyInner {
    target: RawObject,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        proxies().remove_if(&self.target.id(), |_, weak| weak.strong_count() == 0);
    }
}

/// The observed view of a [`RawObject`].
#[derive(Clone)]
pub struct Reactive {
    inner: Arc<ProxyInner>,
}

impl Reactive {
    fn target(&self) -> &RawObject {
        &self.inner.target
    }

    pub fn id(&self) -> TargetId {
        self.target().id()
    }

    /// Read a property. Nested objects come back wrapped.
    pub fn get(&self, key: &str) -> Value {
        Runtime::track(self.id(), TrackKey::prop(key));
        self.target()
            .get(key)
            .map(|value| value.to_reactive())
            .unwrap_or_default()
    }

    /// Write a property, triggering only on an actual change.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let raw = value.into().to_raw();
        let previous = self.target().insert(key, raw.clone());

        match previous {
            None => Runtime::trigger_keys(self.id(), &[TrackKey::prop(key), TrackKey::Iterate]),
            Some(old) if !same_value(&old, &raw) => Runtime::trigger(self.id(), TrackKey::prop(key)),
            Some(_) => {}
        }
    }

    /// Remove a property. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        let existed = self.target().remove(key).is_some();
        if existed {
            Runtime::trigger_keys(self.id(), &[TrackKey::prop(key), TrackKey::Iterate]);
        }
        existed
    }

    pub fn has(&self, key: &str) -> bool {
        Runtime::track(self.id(), TrackKey::prop(key));
        self.target().contains_key(key)
    }

    pub fn keys(&self) -> Vec<Arc<str>> {
        Runtime::track(self.id(), TrackKey::Iterate);
        self.target().keys()
    }

    pub fn len(&self) -> usize {
        Runtime::track(self.id(), TrackKey::Iterate);
        self.target().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw object behind this view.
    pub fn to_raw(&self) -> RawObject {
        self.target().clone()
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reactive").field(self.target()).finish()
    }
}

/// Get the reactive view of an object.
///
/// Returns the cached view if one is alive, and `None` for objects marked
/// with [`mark_raw`].
pub fn reactive(target: &RawObject) -> Option<Reactive> {
    if target.is_marked_raw() {
        return None;
    }

    let mut slot = proxies().entry(target.id()).or_insert_with(Weak::new);
    if let Some(existing) = slot.upgrade() {
        return Some(Reactive { inner: existing });
    }

    let inner = Arc::new(ProxyInner {
        target: target.clone(),
    });
    *slot = Arc::downgrade(&inner);
    Some(Reactive { inner })
}

/// Exclude an object from reactivity. It will never be wrapped.
pub fn mark_raw(target: RawObject) -> RawObject {
    target.data.skip.store(true, Ordering::SeqCst);
    target
}

/// Strip reactivity from a value.
pub fn to_raw(value: &Value) -> Value {
    value.to_raw()
}

pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}
