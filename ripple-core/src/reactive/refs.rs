//! Ref Implementation
//!
//! A Ref is a single-slot reactive container. Reading it inside an effect
//! subscribes the effect; writing a different value re-runs subscribers.
//!
//! # How Refs Work
//!
//! 1. `get` tracks the ref's `value` slot and returns a clone.
//!
//! 2. `set` compares the raw form of the new value with the stored raw form
//!    (`Object.is` semantics). Equal values are a no-op.
//!
//! 3. Deep refs wrap object payloads in their reactive view on construction
//!    and on every write; shallow refs store the payload as given.
//!
//! Besides owned refs, [`to_ref`] builds a [`PropertyRef`] that forwards to a
//! property of an existing object instead of storing anything itself.

use std::fmt::{self, Debug};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::computed::Computed;
use super::proxy::{RawObject, Reactive};
use super::runtime::Runtime;
use super::subscriber::{TargetId, TrackKey};
use super::value::{same_f64, Value};

/// Values that can live in a [`Ref`].
///
/// The defaults describe a value with no nested reactivity.
pub trait RefValue: Clone + Send + Sync + 'static {
    /// Convert to the form stored by a deep ref.
    fn deep_wrap(self) -> Self {
        self
    }

    /// Strip any reactivity before comparison or raw storage.
    fn to_raw(&self) -> Self {
        self.clone()
    }

    /// `Object.is` equality.
    fn same_value(&self, other: &Self) -> bool;
}

macro_rules! ref_value_by_eq {
    ($($t:ty),* $(,)?) => {
        $(impl RefValue for $t {
            fn same_value(&self, other: &Self) -> bool {
                self == other
            }
        })*
    };
}

ref_value_by_eq!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,
    String, &'static str, Arc<str>,
);

impl RefValue for f64 {
    fn same_value(&self, other: &Self) -> bool {
        same_f64(*self, *other)
    }
}

impl RefValue for f32 {
    fn same_value(&self, other: &Self) -> bool {
        same_f64(f64::from(*self), f64::from(*other))
    }
}

impl RefValue for Value {
    fn deep_wrap(self) -> Self {
        self.to_reactive()
    }

    fn to_raw(&self) -> Self {
        Value::to_raw(self)
    }

    fn same_value(&self, other: &Self) -> bool {
        super::value::same_value(self, other)
    }
}

impl<T: RefValue> RefValue for Option<T> {
    fn deep_wrap(self) -> Self {
        self.map(RefValue::deep_wrap)
    }

    fn to_raw(&self) -> Self {
        self.as_ref().map(RefValue::to_raw)
    }

    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: RefValue> RefValue for Vec<T> {
    fn deep_wrap(self) -> Self {
        self.into_iter().map(RefValue::deep_wrap).collect()
    }

    fn to_raw(&self) -> Self {
        self.iter().map(RefValue::to_raw).collect()
    }

    fn same_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}

struct Slot<T> {
    raw: T,
    value: T,
}

struct RefInner<T> {
    id: TargetId,
    slot: RwLock<Slot<T>>,
    shallow: bool,
}

impl<T> Drop for RefInner<T> {
    fn drop(&mut self) {
        Runtime::reap_target(self.id);
    }
}

/// A reactive single-value container.
///
/// Clones share the slot.
///
/// # Example
///
/// ```rust,ignore
/// let count = new_ref(0);
/// let value = count.get();
/// count.set(5);  // re-runs effects that read `count`
/// ```
pub struct Ref<T: RefValue> {
    inner: Arc<RefInner<T>>,
}

impl<T: RefValue> Ref<T> {
    /// Create a deep ref.
    pub fn new(value: T) -> Self {
        Self::build(value, false)
    }

    /// Create a ref that stores its payload without wrapping.
    pub fn shallow(value: T) -> Self {
        Self::build(value, true)
    }

    fn build(value: T, shallow: bool) -> Self {
        let raw = value.to_raw();
        let value = if shallow { value } else { value.deep_wrap() };
        Self {
            inner: Arc::new(RefInner {
                id: TargetId::new(),
                slot: RwLock::new(Slot { raw, value }),
                shallow,
            }),
        }
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    /// Get the current value.
    ///
    /// If called within an effect, this also registers the effect as a
    /// dependent.
    pub fn get(&self) -> T {
        Runtime::track(self.id(), TrackKey::Value);
        self.get_untracked()
    }

    /// Get the current value without establishing a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.slot.read().value.clone()
    }

    /// Set a new value and notify dependents if it differs.
    pub fn set(&self, value: T) {
        let raw = value.to_raw();
        {
            let mut slot = self.inner.slot.write();
            if slot.raw.same_value(&raw) {
                return;
            }
            slot.raw = raw;
            slot.value = if self.inner.shallow {
                value
            } else {
                value.deep_wrap()
            };
        }
        Runtime::trigger(self.id(), TrackKey::Value);
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let slot = self.inner.slot.read();
            f(&slot.value)
        };
        self.set(next);
    }

    /// Re-run dependents without changing the value.
    ///
    /// For shallow refs whose payload was mutated in place.
    pub fn notify(&self) {
        Runtime::trigger(self.id(), TrackKey::Value);
    }

    /// Number of effects currently reading this ref.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.id(), &TrackKey::Value)
    }

    pub fn ptr_eq(&self, other: &Ref<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: RefValue> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: RefValue + Debug> Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.id().raw())
            .field("value", &self.get_untracked())
            .field("shallow", &self.is_shallow())
            .finish()
    }
}

/// Conversion into a ref. An existing ref converts to itself.
pub trait IntoRef<T: RefValue> {
    fn into_ref(self) -> Ref<T>;
}

impl<T: RefValue> IntoRef<T> for Ref<T> {
    fn into_ref(self) -> Ref<T> {
        self
    }
}

impl<T: RefValue> IntoRef<T> for &Ref<T> {
    fn into_ref(self) -> Ref<T> {
        self.clone()
    }
}

macro_rules! into_ref_by_value {
    ($($t:ty),* $(,)?) => {
        $(impl IntoRef<$t> for $t {
            fn into_ref(self) -> Ref<$t> {
                Ref::new(self)
            }
        })*
    };
}

into_ref_by_value!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32,
    f64, String, &'static str, Arc<str>, Value,
);

impl<T: RefValue> IntoRef<Vec<T>> for Vec<T> {
    fn into_ref(self) -> Ref<Vec<T>> {
        Ref::new(self)
    }
}

/// Create a deep ref, or return the given ref unchanged.
pub fn new_ref<T: RefValue>(value: impl IntoRef<T>) -> Ref<T> {
    value.into_ref()
}

/// Create a ref that only triggers on whole-value replacement.
pub fn shallow_ref<T: RefValue>(value: T) -> Ref<T> {
    Ref::shallow(value)
}

/// The object a [`PropertyRef`] forwards to.
#[derive(Clone, Debug)]
pub enum PropertySource {
    Reactive(Reactive),
    Raw(RawObject),
}

impl From<Reactive> for PropertySource {
    fn from(r: Reactive) -> Self {
        PropertySource::Reactive(r)
    }
}

impl From<&Reactive> for PropertySource {
    fn from(r: &Reactive) -> Self {
        PropertySource::Reactive(r.clone())
    }
}

impl From<RawObject> for PropertySource {
    fn from(obj: RawObject) -> Self {
        PropertySource::Raw(obj)
    }
}

impl From<&RawObject> for PropertySource {
    fn from(obj: &RawObject) -> Self {
        PropertySource::Raw(obj.clone())
    }
}

/// A ref bound to one property of an object.
///
/// Stores nothing: reads and writes go straight to the source, so it is
/// exactly as reactive as the source is.
#[derive(Clone, Debug)]
pub struct PropertyRef {
    source: PropertySource,
    key: Arc<str>,
}

impl PropertyRef {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> Value {
        match &self.source {
            PropertySource::Reactive(r) => r.get(&self.key),
            PropertySource::Raw(obj) => obj.get(&self.key).unwrap_or_default(),
        }
    }

    pub fn set(&self, value: impl Into<Value>) {
        match &self.source {
            PropertySource::Reactive(r) => r.set(&self.key, value),
            PropertySource::Raw(obj) => {
                obj.insert(&self.key, value);
            }
        }
    }
}

/// Bind a ref to `source[key]`.
pub fn to_ref(source: impl Into<PropertySource>, key: &str) -> PropertyRef {
    PropertyRef {
        source: source.into(),
        key: Arc::from(key),
    }
}

/// Bind a ref to every key the object currently has.
pub fn to_refs(source: impl Into<PropertySource>) -> IndexMap<Arc<str>, PropertyRef> {
    let source = source.into();
    let keys = match &source {
        PropertySource::Reactive(r) => r.keys(),
        PropertySource::Raw(obj) => obj.keys(),
    };
    keys.into_iter()
        .map(|key| {
            let property = PropertyRef {
                source: source.clone(),
                key: key.clone(),
            };
            (key, property)
        })
        .collect()
}

/// Either a plain value or something that reads like a ref.
#[derive(Clone)]
pub enum MaybeRef<T: RefValue> {
    Plain(T),
    Ref(Ref<T>),
    Computed(Computed<T>),
}

impl<T: RefValue> MaybeRef<T> {
    pub fn is_ref(&self) -> bool {
        !matches!(self, MaybeRef::Plain(_))
    }

    /// Read through a ref (tracked), or return the plain value.
    pub fn unref(&self) -> T {
        match self {
            MaybeRef::Plain(value) => value.clone(),
            MaybeRef::Ref(r) => r.get(),
            MaybeRef::Computed(c) => c.get(),
        }
    }
}

impl<T: RefValue> From<T> for MaybeRef<T> {
    fn from(value: T) -> Self {
        MaybeRef::Plain(value)
    }
}

impl<T: RefValue> From<Ref<T>> for MaybeRef<T> {
    fn from(r: Ref<T>) -> Self {
        MaybeRef::Ref(r)
    }
}

impl<T: RefValue> From<&Ref<T>> for MaybeRef<T> {
    fn from(r: &Ref<T>) -> Self {
        MaybeRef::Ref(r.clone())
    }
}

impl<T: RefValue> From<Computed<T>> for MaybeRef<T> {
    fn from(c: Computed<T>) -> Self {
        MaybeRef::Computed(c)
    }
}

pub fn is_ref<T: RefValue>(value: &MaybeRef<T>) -> bool {
    value.is_ref()
}

pub fn unref<T: RefValue>(value: &MaybeRef<T>) -> T {
    value.unref()
}
