//! Hooks
//!
//! Per-instance persistent state, addressed by call order. The n-th hook
//! call of a render gets the n-th slot of the rendering instance, so a
//! component must call its hooks in the same order on every render.
//!
//! A slot whose stored type does not match the hook reading it (the usual
//! symptom of a conditional hook call) is reset with a warning. Hooks called
//! outside a render work, but nothing persists.

use super::component::current_instance;
use crate::reactive::{Callback, Ref, RefValue, Value};

/// Run `f` against the current slot, creating or replacing it as `f` sees
/// fit. `S` is the type stored in the slot.
fn with_slot<S, R>(hook: &'static str, f: impl FnOnce(&mut Option<S>) -> R) -> R
where
    S: Send + Sync + 'static,
{
    let Some(instance) = current_instance() else {
        tracing::warn!(hook, "hook called outside of a component render; state will not persist");
        return f(&mut None);
    };

    let (index, previous) = instance.take_hook();
    let mut slot = previous.and_then(|boxed| match boxed.downcast::<S>() {
        Ok(state) => Some(*state),
        Err(_) => {
            tracing::warn!(
                hook,
                index,
                component = instance.name(),
                "hook slot holds a different type than on the previous render; resetting"
            );
            None
        }
    });

    let result = f(&mut slot);
    if let Some(state) = slot {
        instance.store_hook(index, Box::new(state));
    }
    result
}

/// Setter half of [`use_state`].
#[derive(Clone)]
pub struct StateSetter<T: RefValue> {
    state: Ref<T>,
}

impl<T: RefValue> StateSetter<T> {
    /// Replace the state. Re-renders the owner unless the value is equal.
    pub fn set(&self, value: T) {
        self.state.set(value);
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        self.state.update(f);
    }

    /// The latest value, without subscribing.
    pub fn get(&self) -> T {
        self.state.get_untracked()
    }
}

/// A piece of state that survives re-renders.
///
/// Returns the current value and a setter. Setting a different value
/// re-renders the component.
pub fn use_state<T: RefValue>(initial: T) -> (T, StateSetter<T>) {
    let state = with_slot("use_state", |slot: &mut Option<Ref<T>>| {
        slot.get_or_insert_with(|| Ref::new(initial)).clone()
    });
    (state.get(), StateSetter { state })
}

/// A ref that survives re-renders. Created shallow on the first render.
pub fn use_ref<T: RefValue>(initial: T) -> Ref<T> {
    with_slot("use_ref", |slot: &mut Option<Ref<T>>| {
        slot.get_or_insert_with(|| Ref::shallow(initial)).clone()
    })
}

#[derive(Clone)]
struct Memo<D, T> {
    deps: D,
    value: T,
}

/// Recompute `f` only when `deps` differ from the previous render's.
pub fn use_memo<D, T, F>(deps: D, f: F) -> T
where
    D: PartialEq + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> T,
{
    with_slot("use_memo", |slot: &mut Option<Memo<D, T>>| match slot {
        Some(memo) if memo.deps == deps => memo.value.clone(),
        _ => {
            let value = f();
            *slot = Some(Memo {
                deps,
                value: value.clone(),
            });
            value
        }
    })
}

/// Keep the same [`Callback`] identity while `deps` are unchanged, so
/// child components receiving it skip their re-render.
pub fn use_callback<D, F>(deps: D, f: F) -> Callback
where
    D: PartialEq + Send + Sync + 'static,
    F: Fn(&Value) + Send + Sync + 'static,
{
    use_memo(deps, || Callback::new(f))
}
