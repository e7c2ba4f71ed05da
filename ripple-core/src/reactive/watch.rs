//! Watchers
//!
//! [`watch`] separates *what* is observed (a source) from *what happens*
//! (a callback receiving the new and previous values). [`watch_effect`] is a
//! plain auto-tracking effect with a disposer.
//!
//! A watcher's callback runs synchronously, once per trigger of its source.
//! To coalesce bursts, route the work through [`queue_job`] from inside the
//! callback.
//!
//! [`queue_job`]: crate::scheduler::queue_job

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::computed::Computed;
use super::context::untracked;
use super::effect::{Effect, EffectOptions};
use super::refs::{Ref, RefValue};

type Getter<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// What a watcher observes.
pub enum WatchSource<T: RefValue> {
    Ref(Ref<T>),
    Computed(Computed<T>),
    Getter(Getter<T>),
    /// A fixed value. The watcher never re-fires.
    Constant(T),
}

impl<T: RefValue> WatchSource<T> {
    /// Watch whatever `getter` reads.
    pub fn getter<F>(getter: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        WatchSource::Getter(Arc::new(getter))
    }

    fn into_getter(self) -> Getter<T> {
        match self {
            WatchSource::Ref(r) => Arc::new(move || r.get()),
            WatchSource::Computed(c) => Arc::new(move || c.get()),
            WatchSource::Getter(g) => g,
            WatchSource::Constant(value) => Arc::new(move || value.clone()),
        }
    }
}

impl<T: RefValue> From<Ref<T>> for WatchSource<T> {
    fn from(r: Ref<T>) -> Self {
        WatchSource::Ref(r)
    }
}

impl<T: RefValue> From<&Ref<T>> for WatchSource<T> {
    fn from(r: &Ref<T>) -> Self {
        WatchSource::Ref(r.clone())
    }
}

impl<T: RefValue> From<Computed<T>> for WatchSource<T> {
    fn from(c: Computed<T>) -> Self {
        WatchSource::Computed(c)
    }
}

impl<T: RefValue> From<&Computed<T>> for WatchSource<T> {
    fn from(c: &Computed<T>) -> Self {
        WatchSource::Computed(c.clone())
    }
}

/// Options for [`watch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Call back once at setup, with no previous value.
    pub immediate: bool,
}

impl WatchOptions {
    pub fn immediate() -> Self {
        Self { immediate: true }
    }
}

/// Disposer returned by [`watch`] and [`watch_effect`].
///
/// The watcher lives as long as this handle. `stop` is idempotent.
#[must_use = "dropping the handle stops the watcher"]
pub struct StopHandle {
    effect: Effect,
}

impl StopHandle {
    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle").field("effect", &self.effect).finish()
    }
}

/// Watch a source and call `callback(new, previous)` on every change.
pub fn watch<T, F>(source: impl Into<WatchSource<T>>, callback: F, options: WatchOptions) -> StopHandle
where
    T: RefValue,
    F: Fn(&T, Option<&T>) + Send + Sync + 'static,
{
    let getter = source.into().into_getter();
    let latest: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
    let previous: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
    let callback = Arc::new(callback);

    let effect = {
        let latest = latest.clone();
        let previous = previous.clone();
        let callback = callback.clone();
        Effect::with_options(
            {
                let latest = latest.clone();
                move || {
                    let value = getter();
                    *latest.lock() = Some(value);
                }
            },
            EffectOptions::lazy().scheduler(move |effect| {
                effect.run();
                let Some(next) = latest.lock().take() else {
                    return;
                };
                let old = previous.lock().replace(next.clone());
                untracked(|| callback(&next, old.as_ref()));
            }),
        )
    };

    effect.run();
    let initial = latest.lock().take();
    if let Some(initial) = initial {
        if options.immediate {
            untracked(|| callback(&initial, None));
        }
        *previous.lock() = Some(initial);
    }

    StopHandle { effect }
}

/// Run `f` now and again whenever anything it read changes.
pub fn watch_effect<F>(f: F) -> StopHandle
where
    F: Fn() + Send + Sync + 'static,
{
    StopHandle {
        effect: Effect::new(f),
    }
}
