//! Reactive Runtime
//!
//! The runtime is the dependency tracker that connects reactive values to the
//! effects that read them.
//!
//! # How It Works
//!
//! 1. When an effect is created, it registers with the runtime.
//!
//! 2. When a reactive value is read inside a running effect, [`Runtime::track`]
//!    records an edge from `(target, key)` to that effect.
//!
//! 3. When a reactive value changes, [`Runtime::trigger`]:
//!    a. Collects every effect subscribed to `(target, key)`
//!    b. Skips the effect that is currently running
//!    c. Invalidates derived values right away
//!    d. Defers every other effect until the outermost trigger returns, then
//!       hands each to its scheduler or runs it inline
//!
//!    Deferral means no effect observes a computed value that is about to
//!    be marked dirty by the same write. Effects that already re-ran since
//!    they were deferred (a child component patched by its parent) are
//!    skipped.
//!
//! 4. Before an effect re-runs, [`Runtime::cleanup`] removes all of its edges,
//!    so only what the latest run read can trigger it again.
//!
//! # Lifetimes
//!
//! The dependency map never owns anything. Effects are held through weak
//! references in the registry and targets are addressed by ID. Dropping the
//! last handle to an effect unregisters it; dropping a target reaps its
//! dependency sets.
//!
//! # Thread Safety
//!
//! The maps are process-wide and sharded (`DashMap`), while the effect stack
//! is thread-local. No lock is held while an effect or scheduler runs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::OnceLock;

use dashmap::DashMap;
use indexmap::{IndexMap, IndexSet};

use super::context::ReactiveContext;
use super::effect::{Effect, WeakEffect};
use super::subscriber::{DepKey, EffectId, TargetId, TrackKey};

/// The global dependency tracker.
///
/// A zero-sized namespace over process-wide state.
pub struct Runtime;

type DepsMap = HashMap<TrackKey, IndexSet<EffectId>>;

// target -> key -> subscribed effects
static TARGETS: OnceLock<DashMap<TargetId, DepsMap>> = OnceLock::new();

// Weak references so the graph does not keep effects alive.
static REGISTRY: OnceLock<DashMap<EffectId, WeakEffect>> = OnceLock::new();

fn targets() -> &'static DashMap<TargetId, DepsMap> {
    TARGETS.get_or_init(DashMap::new)
}

fn registry() -> &'static DashMap<EffectId, WeakEffect> {
    REGISTRY.get_or_init(DashMap::new)
}

/// Effects waiting for the outermost trigger, with the run count each had
/// when it was deferred.
#[derive(Default)]
struct Batch {
    depth: usize,
    pending: IndexMap<EffectId, (Effect, usize)>,
}

thread_local! {
    static BATCH: RefCell<Batch> = RefCell::new(Batch::default());
}

/// One level of trigger nesting.
struct BatchScope;

impl BatchScope {
    fn enter() -> Self {
        BATCH.with(|batch| batch.borrow_mut().depth += 1);
        BatchScope
    }

    fn defer(&self, effect: Effect) {
        let id = effect.id();
        let runs = effect.run_count();
        BATCH.with(|batch| {
            batch.borrow_mut().pending.entry(id).or_insert((effect, runs));
        });
    }

    /// Leave the scope. The outermost scope takes the deferred effects in
    /// creation order, so a parent component runs before its children.
    fn finish(self) -> Vec<(Effect, usize)> {
        drop(self);
        let mut deferred: Vec<(Effect, usize)> = BATCH.with(|batch| {
            let mut batch = batch.borrow_mut();
            if batch.depth == 0 {
                std::mem::take(&mut batch.pending).into_values().collect()
            } else {
                Vec::new()
            }
        });
        deferred.sort_by_key(|(effect, _)| effect.id());
        deferred
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        let discarded = BATCH.with(|batch| {
            let mut batch = batch.borrow_mut();
            batch.depth -= 1;
            if batch.depth == 0 && std::thread::panicking() {
                std::mem::take(&mut batch.pending)
            } else {
                IndexMap::new()
            }
        });
        drop(discarded);
    }
}

impl Runtime {
    /// Register an effect so that triggers can find it by ID.
    pub(crate) fn register(effect: &Effect) {
        registry().insert(effect.id(), effect.downgrade());
    }

    /// Forget an effect and drop the edges it still holds.
    ///
    /// Called from the effect's destructor.
    pub(crate) fn unregister(id: EffectId, deps: &[DepKey]) {
        registry().remove(&id);
        Self::detach(id, deps);
    }

    /// Record that the active effect read `(target, key)`.
    ///
    /// No-op when no effect is running.
    pub fn track(target: TargetId, key: TrackKey) {
        let Some(effect) = ReactiveContext::active_effect() else {
            return;
        };

        let dep = DepKey::new(target, key);
        if effect.record_dependency(dep.clone()) {
            targets()
                .entry(dep.target)
                .or_default()
                .entry(dep.key)
                .or_default()
                .insert(effect.id());
        }
    }

    /// Notify every effect subscribed to `(target, key)`.
    pub fn trigger(target: TargetId, key: TrackKey) {
        Self::trigger_keys(target, &[key]);
    }

    /// Notify the union of the subscribers of several keys.
    ///
    /// An effect subscribed to more than one of the keys runs once.
    pub fn trigger_keys(target: TargetId, keys: &[TrackKey]) {
        let subscribers: IndexSet<EffectId> = match targets().get(&target) {
            Some(deps) => keys
                .iter()
                .filter_map(|key| deps.get(key))
                .flat_map(|set| set.iter().copied())
                .collect(),
            None => return,
        };

        if subscribers.is_empty() {
            return;
        }

        let running = ReactiveContext::active_effect_id();
        let effects: Vec<Effect> = subscribers
            .into_iter()
            .filter(|id| Some(*id) != running)
            .filter_map(|id| registry().get(&id).and_then(|weak| weak.upgrade()))
            .collect();

        tracing::trace!(
            target_id = target.raw(),
            keys = ?keys,
            effects = effects.len(),
            "trigger"
        );

        let scope = BatchScope::enter();
        for effect in effects {
            if effect.is_derived() {
                effect.schedule();
            } else {
                scope.defer(effect);
            }
        }

        for (effect, runs) in scope.finish() {
            effect.schedule_if_stale(runs);
        }
    }

    /// Remove the effect from every dependency set it joined.
    ///
    /// Idempotent: an effect without edges is left untouched.
    pub fn cleanup(effect: &Effect) {
        let deps = effect.take_dependencies();
        Self::detach(effect.id(), &deps);
    }

    fn detach(id: EffectId, deps: &[DepKey]) {
        for dep in deps {
            let emptied = match targets().get_mut(&dep.target) {
                Some(mut map) => {
                    if let Some(set) = map.get_mut(&dep.key) {
                        set.swap_remove(&id);
                        if set.is_empty() {
                            map.remove(&dep.key);
                        }
                    }
                    map.is_empty()
                }
                None => false,
            };
            if emptied {
                targets().remove_if(&dep.target, |_, map| map.is_empty());
            }
        }
    }

    /// Drop all dependency sets of a target that is being destroyed.
    pub(crate) fn reap_target(target: TargetId) {
        targets().remove(&target);
    }

    /// Number of effects currently subscribed to `(target, key)`.
    pub fn subscriber_count(target: TargetId, key: &TrackKey) -> usize {
        targets()
            .get(&target)
            .and_then(|deps| deps.get(key).map(IndexSet::len))
            .unwrap_or(0)
    }

    /// Check if we're inside a tracking context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

/// Detach an effect from all of its dependencies.
///
/// After cleanup the effect holds no edges until it runs again.
pub fn cleanup(effect: &Effect) {
    Runtime::cleanup(effect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::EffectOptions;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    fn counting_effect(target: TargetId, key: TrackKey) -> (Effect, Arc<AtomicI32>) {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let effect = Effect::new(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Runtime::track(target, key.clone());
        });
        (effect, runs)
    }

    #[test]
    fn track_outside_effect_is_ignored() {
        let target = TargetId::new();
        Runtime::track(target, TrackKey::Value);
        assert_eq!(Runtime::subscriber_count(target, &TrackKey::Value), 0);
    }

    #[test]
    fn trigger_reruns_subscribers() {
        let target = TargetId::new();
        let (_effect, runs) = counting_effect(target, TrackKey::prop("a"));

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(Runtime::subscriber_count(target, &TrackKey::prop("a")), 1);

        Runtime::trigger(target, TrackKey::prop("a"));
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // Other keys are not subscribed.
        Runtime::trigger(target, TrackKey::prop("b"));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn trigger_keys_runs_each_effect_once() {
        let target = TargetId::new();
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let _effect = Effect::new(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Runtime::track(target, TrackKey::prop("a"));
            Runtime::track(target, TrackKey::Iterate);
        });

        Runtime::trigger_keys(target, &[TrackKey::prop("a"), TrackKey::Iterate]);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cleanup_detaches_effect() {
        let target = TargetId::new();
        let (effect, runs) = counting_effect(target, TrackKey::Value);

        cleanup(&effect);
        assert_eq!(effect.dependency_count(), 0);
        assert_eq!(Runtime::subscriber_count(target, &TrackKey::Value), 0);

        Runtime::trigger(target, TrackKey::Value);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // Second cleanup is a no-op.
        cleanup(&effect);
    }

    #[test]
    fn dropped_effect_is_unregistered() {
        let target = TargetId::new();
        let (effect, runs) = counting_effect(target, TrackKey::Value);
        let id = effect.id();

        drop(effect);
        assert!(!registry().contains_key(&id));
        assert_eq!(Runtime::subscriber_count(target, &TrackKey::Value), 0);

        Runtime::trigger(target, TrackKey::Value);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scheduler_receives_effect_instead_of_running() {
        let target = TargetId::new();
        let scheduled = Arc::new(AtomicI32::new(0));
        let scheduled_clone = scheduled.clone();

        let effect = Effect::with_options(
            move || Runtime::track(target, TrackKey::Value),
            EffectOptions::default().scheduler(move |_| {
                scheduled_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        Runtime::trigger(target, TrackKey::Value);
        assert_eq!(scheduled.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn reap_target_drops_dependency_sets() {
        let target = TargetId::new();
        let (_effect, _runs) = counting_effect(target, TrackKey::Value);

        Runtime::reap_target(target);
        assert_eq!(Runtime::subscriber_count(target, &TrackKey::Value), 0);
    }

    #[test]
    fn effect_rerun_by_an_earlier_effect_is_skipped() {
        let target = TargetId::new();
        let child_slot: Arc<Mutex<Option<Effect>>> = Arc::new(Mutex::new(None));
        let slot = child_slot.clone();

        let _parent = Effect::new(move || {
            Runtime::track(target, TrackKey::Value);
            let child = slot.lock().clone();
            if let Some(child) = child {
                child.run();
            }
        });
        let (child, child_runs) = counting_effect(target, TrackKey::Value);
        *child_slot.lock() = Some(child);

        Runtime::trigger(target, TrackKey::Value);
        assert_eq!(child_runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn inline_effects_wait_for_nested_invalidations() {
        let source = TargetId::new();
        let first = TargetId::new();
        let second = TargetId::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let invalidator = |own: TargetId, log: Arc<Mutex<Vec<&'static str>>>, name: &'static str| {
            let effect = Effect::derived(
                move || Runtime::track(source, TrackKey::Value),
                move |_| {
                    log.lock().push(name);
                    Runtime::trigger(own, TrackKey::Value);
                },
            );
            effect.run();
            effect
        };
        let _first = invalidator(first, log.clone(), "invalidate first");
        let _second = invalidator(second, log.clone(), "invalidate second");

        let log2 = log.clone();
        let _reader = Effect::new(move || {
            Runtime::track(first, TrackKey::Value);
            Runtime::track(second, TrackKey::Value);
            log2.lock().push("read");
        });
        log.lock().clear();

        Runtime::trigger(source, TrackKey::Value);
        assert_eq!(*log.lock(), vec!["invalidate first", "invalidate second", "read"]);
    }
}
