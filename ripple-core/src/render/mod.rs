//! Virtual-DOM Renderer
//!
//! This module turns virtual trees into host output and keeps the two in
//! sync:
//!
//! - **VNode**: the description of intended output.
//! - **Renderer**: mount, patch and unmount, including keyed child
//!   reconciliation.
//! - **Component**: render functions whose re-render is a reactive effect,
//!   with lifecycle callbacks and call-order hooks.
//! - **Host**: the in-memory document the renderer draws into.
//!
//! # Data Flow
//!
//! A component reads reactive state while rendering, which subscribes its
//! render effect. A write to that state re-runs the effect, the component
//! returns a new tree, and the reconciler patches the host nodes the old
//! tree produced.

mod app;
mod component;
mod hooks;
mod host;
mod props;
mod renderer;
mod vnode;

pub use app::{create_app, App, AppConfig, MountTarget};
pub use component::{current_instance, on_mounted, on_unmounted, on_updated, Component, ComponentInstance};
pub use hooks::{use_callback, use_memo, use_ref, use_state, StateSetter};
pub use host::{Document, HostKind, HostNode, HostSnapshot, Namespace};
pub use props::{hyphenate, is_event_prop, patch_prop, patch_props};
pub use renderer::render;
pub use vnode::{h, normalize_children, Child, Key, Props, VNode, VNodeType};
