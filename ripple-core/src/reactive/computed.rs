//! Computed Implementation
//!
//! A Computed is a cached derived value backed by a lazy effect.
//!
//! # How Computed Values Work
//!
//! 1. Nothing runs on creation. The value starts dirty.
//!
//! 2. On read, a dirty computed runs its inner effect (tracking the getter's
//!    reads) and caches the result. A clean computed returns the cache.
//!
//! 3. When an upstream dependency changes, the inner effect's scheduler
//!    flips the dirty flag instead of recomputing. Only the clean -> dirty
//!    transition notifies the computed's own dependents.
//!
//! # Why This Matters
//!
//! Given `b = a + 1`, `c = a * 2` and `d = b + c`, one write to `a` marks `b`
//! and `c` dirty and notifies `d` twice, but `d` was already dirty after the
//! first notification. Reading `d` then recomputes it exactly once.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::untracked;
use super::effect::Effect;
use super::runtime::Runtime;
use super::subscriber::{TargetId, TrackKey};

/// Cache state of a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed since the last evaluation.
    Dirty,
}

type Getter<T> = Arc<dyn Fn() -> T + Send + Sync>;
type Setter<T> = Arc<dyn Fn(T) + Send + Sync>;

struct ComputedInner<T> {
    id: TargetId,
    getter: Getter<T>,
    setter: Option<Setter<T>>,
    effect: Effect,
    value: Arc<Mutex<Option<T>>>,
    dirty: Arc<AtomicBool>,
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        Runtime::reap_target(self.id);
    }
}

/// A lazily evaluated, cached derived value.
///
/// # Example
///
/// ```rust,ignore
/// let count = new_ref(2);
/// let doubled = Computed::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);              // marks `doubled` dirty, computes nothing
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a read-only computed value.
    ///
    /// The getter is not run until the first read.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::build(Arc::new(getter), None)
    }

    /// Create a computed value whose writes are forwarded to `setter`.
    pub fn with_setter<F, S>(getter: F, setter: S) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
    {
        Self::build(Arc::new(getter), Some(Arc::new(setter)))
    }

    fn build(getter: Getter<T>, setter: Option<Setter<T>>) -> Self {
        let id = TargetId::new();
        let value = Arc::new(Mutex::new(None));
        let dirty = Arc::new(AtomicBool::new(true));

        let effect = {
            let getter = getter.clone();
            let value = value.clone();
            let dirty = dirty.clone();
            Effect::derived(
                move || {
                    let next = getter();
                    *value.lock() = Some(next);
                },
                move |_| {
                    if !dirty.swap(true, Ordering::SeqCst) {
                        Runtime::trigger(id, TrackKey::Value);
                    }
                },
            )
        };

        Self {
            inner: Arc::new(ComputedInner {
                id,
                getter,
                setter,
                effect,
                value,
                dirty,
            }),
        }
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Get the value, recomputing first if dirty.
    ///
    /// Registers the computed as a dependency of the running effect.
    ///
    /// # Panics
    ///
    /// Panics if the getter reads the computed it belongs to before it has
    /// ever produced a value.
    pub fn get(&self) -> T {
        if self.inner.dirty.load(Ordering::SeqCst) {
            self.evaluate();
        }
        Runtime::track(self.id(), TrackKey::Value);

        match self.inner.value.lock().clone() {
            Some(value) => value,
            None => panic!("computed value read during its own first evaluation"),
        }
    }

    fn evaluate(&self) {
        if self.inner.effect.is_active() {
            self.inner.effect.run();
        } else {
            let next = untracked(|| (self.inner.getter)());
            *self.inner.value.lock() = Some(next);
        }
        self.inner.dirty.store(false, Ordering::SeqCst);
    }

    /// Forward a write to the setter.
    ///
    /// Read-only computed values ignore writes with a warning.
    pub fn set(&self, value: T) {
        match &self.inner.setter {
            Some(setter) => setter(value),
            None => tracing::warn!(computed = self.id().raw(), "write to a read-only computed ignored"),
        }
    }

    /// Get the current cache state.
    pub fn state(&self) -> ComputedState {
        if self.inner.dirty.load(Ordering::SeqCst) {
            ComputedState::Dirty
        } else {
            ComputedState::Clean
        }
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.lock().is_some()
    }

    /// Number of times the getter ran under tracking.
    pub fn evaluation_count(&self) -> usize {
        self.inner.effect.run_count()
    }

    /// Detach from upstream dependencies. Later reads evaluate untracked.
    pub fn stop(&self) {
        self.inner.effect.stop();
        self.inner.dirty.store(true, Ordering::SeqCst);
    }

    pub fn ptr_eq(&self, other: &Computed<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id().raw())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .finish()
    }
}

/// Create a read-only computed value.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Computed::new(getter)
}
