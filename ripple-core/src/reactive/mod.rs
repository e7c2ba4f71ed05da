//! Reactive Primitives
//!
//! This module implements the reactive system: observed objects, refs,
//! computed values, effects and watchers. These primitives form the
//! foundation of Ripple's rendering: every component render is an effect.
//!
//! # Concepts
//!
//! ## Dependency Tracking
//!
//! The runtime keeps a map from (target, key) to the effects that read it
//! during their latest run. Reads call `track`, writes call `trigger`.
//! Effects clear their edges before every run, so a branch no longer taken
//! stops triggering.
//!
//! ## Reactive Objects
//!
//! A [`Reactive`] is the observed view of a [`RawObject`]. Its accessors
//! track and trigger per key; enumeration and structural changes use a
//! separate iteration key.
//!
//! ## Refs and Computed Values
//!
//! A [`Ref`] is a single-slot container. A [`Computed`] is a cached derived
//! value that recomputes lazily, on the first read after a dependency
//! changed.
//!
//! ## Effects and Watchers
//!
//! An [`Effect`] re-runs when anything it read changes, inline or through
//! its scheduler. [`watch`] calls back with new and previous values of an
//! explicit source.
//!
//! # Implementation Notes
//!
//! The active-effect stack is thread-local. The dependency map is shared
//! process-wide and holds effects weakly: dropping the last handle of an
//! effect (or of a target) removes it from the graph.

mod computed;
mod context;
mod effect;
mod proxy;
mod refs;
mod runtime;
mod subscriber;
mod value;
mod watch;

pub use computed::{computed, Computed, ComputedState};
pub use context::{untracked, ReactiveContext};
pub use effect::{effect, Effect, EffectOptions, SchedulerFn};
pub use proxy::{is_reactive, mark_raw, reactive, to_raw, RawObject, Reactive};
pub use refs::{
    is_ref, new_ref, shallow_ref, to_ref, to_refs, unref, IntoRef, MaybeRef, PropertyRef, PropertySource, Ref,
    RefValue,
};
pub use runtime::{cleanup, Runtime};
pub use subscriber::{DepKey, EffectId, TargetId, TrackKey};
pub use value::{format_number, same_f64, same_value, Callback, Value};
pub use watch::{watch, watch_effect, StopHandle, WatchOptions, WatchSource};
