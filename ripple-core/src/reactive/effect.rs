//! Effect Implementation
//!
//! An Effect is a re-runnable computation whose reads are recorded as
//! dependencies.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately (unless lazy)
//!    to establish initial dependencies.
//!
//! 2. When any dependency changes, the tracker hands the effect to its
//!    scheduler, or re-runs it inline when it has none.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution. Branches no longer taken stop triggering.
//!
//! # Schedulers
//!
//! Computed values, watchers and batched updates are all plain effects with
//! a scheduler: the scheduler receives the effect when a dependency changes
//! and decides what "re-run" means (flip a dirty flag, call a watcher
//! callback, queue a job).
//!
//! # Lifetime
//!
//! The returned [`Effect`] handle owns the computation. Dropping the last
//! handle unregisters it from the runtime, so keep it alive for as long as
//! the effect should react.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::subscriber::{DepKey, EffectId};
use crate::scheduler::{queue_job, Job};

/// Custom scheduler invoked instead of running the effect inline.
pub type SchedulerFn = Arc<dyn Fn(&Effect) + Send + Sync>;

/// Options for [`effect`] and [`Effect::with_options`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,

    /// Receives the effect on trigger instead of it running inline.
    pub scheduler: Option<SchedulerFn>,
}

impl EffectOptions {
    /// Options for an effect that waits for its first manual run.
    pub fn lazy() -> Self {
        Self {
            lazy: true,
            scheduler: None,
        }
    }

    /// Options for an effect whose re-runs are batched through the job queue.
    pub fn queued() -> Self {
        Self::default().scheduler(|effect| {
            queue_job(Job::from(effect));
        })
    }

    /// Set the scheduler.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(&Effect) + Send + Sync + 'static,
    {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

struct EffectInner {
    id: EffectId,

    /// The effect function.
    run: Box<dyn Fn() + Send + Sync>,

    scheduler: Option<SchedulerFn>,

    /// Scheduler only invalidates a cached value; it runs as soon as a
    /// dependency changes instead of after the trigger settles.
    derived: bool,

    /// Edges recorded during the latest run.
    dependencies: Mutex<SmallVec<[DepKey; 4]>>,

    /// Cleared by [`Effect::stop`].
    active: AtomicBool,

    run_count: AtomicUsize,
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        let deps = std::mem::take(self.dependencies.get_mut());
        Runtime::unregister(self.id, &deps);
    }
}

/// A re-runnable computation that tracks what it reads.
///
/// # Example
///
/// ```rust,ignore
/// let count = new_ref(0);
///
/// let _log = Effect::new({
///     let count = count.clone();
///     move || println!("Count is: {}", count.get())
/// });
///
/// count.set(5);  // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
#[must_use = "dropping the last handle unregisters the effect"]
pub struct Effect {
    inner: Arc<EffectInner>,
}

/// Non-owning handle held by the runtime registry.
#[derive(Clone)]
pub(crate) struct WeakEffect {
    inner: Weak<EffectInner>,
}

impl WeakEffect {
    pub(crate) fn upgrade(&self) -> Option<Effect> {
        self.inner.upgrade().map(|inner| Effect { inner })
    }
}

impl Effect {
    /// Create an effect and run it immediately.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_options(run, EffectOptions::default())
    }

    /// Create an effect with explicit options.
    pub fn with_options<F>(run: F, options: EffectOptions) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(run, options, false)
    }

    /// Lazy effect behind a derived value. `invalidate` must only mark the
    /// value stale and notify its dependents.
    pub(crate) fn derived<F, S>(run: F, invalidate: S) -> Self
    where
        F: Fn() + Send + Sync + 'static,
        S: Fn(&Effect) + Send + Sync + 'static,
    {
        Self::build(run, EffectOptions::lazy().scheduler(invalidate), true)
    }

    fn build<F>(run: F, options: EffectOptions, derived: bool) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self {
            inner: Arc::new(EffectInner {
                id: EffectId::new(),
                run: Box::new(run),
                scheduler: options.scheduler,
                derived,
                dependencies: Mutex::new(SmallVec::new()),
                active: AtomicBool::new(true),
                run_count: AtomicUsize::new(0),
            }),
        };
        Runtime::register(&effect);

        if !options.lazy {
            effect.run();
        }

        effect
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Run the effect function, recording fresh dependencies.
    ///
    /// Does nothing once the effect is stopped, or when the effect is
    /// already running further up the stack.
    pub fn run(&self) {
        if !self.is_active() || ReactiveContext::contains(self.id()) {
            return;
        }

        Runtime::cleanup(self);

        let _ctx = ReactiveContext::enter(self.clone());
        (self.inner.run)();
        self.inner.run_count.fetch_add(1, Ordering::SeqCst);
    }

    /// React to a dependency change: hand off to the scheduler, or run.
    pub(crate) fn schedule(&self) {
        if !self.is_active() {
            return;
        }
        match &self.inner.scheduler {
            Some(scheduler) => scheduler(self),
            None => self.run(),
        }
    }

    /// Like [`Effect::schedule`], unless the effect already ran again since
    /// its run count was `seen_runs`.
    pub(crate) fn schedule_if_stale(&self, seen_runs: usize) {
        if self.run_count() == seen_runs {
            self.schedule();
        }
    }

    pub(crate) fn is_derived(&self) -> bool {
        self.inner.derived
    }

    /// Detach from all dependencies and never run again.
    ///
    /// Safe to call any number of times.
    pub fn stop(&self) {
        if self.inner.active.swap(false, Ordering::SeqCst) {
            Runtime::cleanup(self);
        }
    }

    /// Whether the effect has not been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of dependencies recorded by the latest run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    pub fn ptr_eq(&self, other: &Effect) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns false if the edge was already recorded.
    pub(crate) fn record_dependency(&self, dep: DepKey) -> bool {
        let mut deps = self.inner.dependencies.lock();
        if deps.contains(&dep) {
            false
        } else {
            deps.push(dep);
            true
        }
    }

    pub(crate) fn take_dependencies(&self) -> SmallVec<[DepKey; 4]> {
        std::mem::take(&mut *self.inner.dependencies.lock())
    }

    pub(crate) fn downgrade(&self) -> WeakEffect {
        WeakEffect {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Create an effect. Runs once immediately unless `options.lazy`.
pub fn effect<F>(run: F, options: EffectOptions) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::with_options(run, options)
}
