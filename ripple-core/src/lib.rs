//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple UI framework.
//! It implements:
//!
//! - Reactive state (refs, observed objects, computed values, effects)
//! - Batched scheduling on a per-thread microtask queue
//! - Virtual DOM reconciliation with component lifecycle and hooks
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: dependency tracking and the reactive containers built on it
//! - `scheduler`: the job queue and microtask queue
//! - `render`: virtual nodes, the reconciler, components and the host
//!   document they render into
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::reactive::new_ref;
//! use ripple_core::render::{create_app, h, Component, HostNode, Props};
//!
//! let count = new_ref(0);
//!
//! let counter = Component::new("Counter", {
//!     let count = count.clone();
//!     move |_, _| Some(h("p", Props::new(), [count.get().to_string()]))
//! });
//!
//! let root = HostNode::element("div");
//! create_app(counter).mount(&root)?;
//! assert_eq!(root.text_content(), "0");
//!
//! count.set(1);
//! // The component re-rendered and patched its text node in place.
//! assert_eq!(root.text_content(), "1");
//! ```

pub mod reactive;
pub mod render;
pub mod scheduler;

mod error;

pub use error::{Result, RippleError};
