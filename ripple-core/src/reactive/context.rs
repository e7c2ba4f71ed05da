//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This
//! enables automatic dependency tracking: when a reactive value is read, the
//! tracker registers the current effect as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack of effects. Running an effect pushes it and
//! makes it active; when the run completes (or unwinds), the guard pops it
//! and the previous entry becomes active again.
//!
//! This supports nested execution: a component rendering inside its parent's
//! render effect, or a computed evaluated while a render is in progress.
//!
//! An entry may also be empty. [`untracked`] pushes an empty entry so that
//! reads inside it are invisible to whatever effect is running outside.

use std::cell::RefCell;

use super::effect::Effect;
use super::subscriber::EffectId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<Effect>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if the
/// computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<EffectId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given effect.
    ///
    /// While this context is active, any reactive value that is read will
    /// register the effect as a dependent.
    pub fn enter(effect: Effect) -> Self {
        let subscriber_id = Some(effect.id());
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Some(effect)));
        Self { subscriber_id }
    }

    /// Enter a context in which nothing is tracked.
    pub fn pause() -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(None));
        Self { subscriber_id: None }
    }

    /// Check if there is an active tracking effect.
    pub fn is_active() -> bool {
        Self::active_effect_id().is_some()
    }

    /// The effect reads are currently attributed to, if any.
    pub fn active_effect() -> Option<Effect> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }

    /// ID of the active effect, without cloning the handle.
    pub fn active_effect_id() -> Option<EffectId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.as_ref().map(Effect::id))
        })
    }

    /// Whether the given effect is anywhere on the stack.
    ///
    /// An effect found here is already mid-run; running it again would recurse.
    pub fn contains(id: EffectId) -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|entry| entry.as_ref().map(Effect::id) == Some(id))
        })
    }

    /// Current nesting depth.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // Take the entry out before dropping it: the popped effect may be the
        // last handle, and its destructor touches the tracker.
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.as_ref().map(Effect::id),
                self.subscriber_id,
                "ReactiveContext mismatch"
            );
        }
    }
}

/// Run `f` without tracking any reads it performs.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::pause();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::EffectOptions;

    fn lazy_effect() -> Effect {
        Effect::with_options(|| {}, EffectOptions::lazy())
    }

    #[test]
    fn context_tracks_effect() {
        let effect = lazy_effect();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::active_effect_id().is_none());

        {
            let _ctx = ReactiveContext::enter(effect.clone());

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::active_effect_id(), Some(effect.id()));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn nested_contexts_restore_previous() {
        let outer = lazy_effect();
        let inner = lazy_effect();

        {
            let _ctx1 = ReactiveContext::enter(outer.clone());
            assert_eq!(ReactiveContext::active_effect_id(), Some(outer.id()));

            {
                let _ctx2 = ReactiveContext::enter(inner.clone());
                assert_eq!(ReactiveContext::active_effect_id(), Some(inner.id()));
                assert!(ReactiveContext::contains(outer.id()));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::active_effect_id(), Some(outer.id()));
        }

        assert!(ReactiveContext::active_effect_id().is_none());
    }

    #[test]
    fn untracked_hides_the_active_effect() {
        let effect = lazy_effect();
        let _ctx = ReactiveContext::enter(effect.clone());

        let seen = untracked(ReactiveContext::active_effect_id);
        assert!(seen.is_none());
        assert_eq!(ReactiveContext::active_effect_id(), Some(effect.id()));
    }

    #[test]
    fn context_pops_on_panic() {
        let effect = lazy_effect();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = ReactiveContext::enter(effect.clone());
            panic!("render failed");
        }));

        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
    }
}
