//! Components
//!
//! A [`Component`] is a named render function. Every occurrence of one in a
//! mounted tree gets a [`ComponentInstance`] holding its props, its last
//! rendered subtree, hook slots and lifecycle callbacks.
//!
//! # How Component Updates Work
//!
//! 1. Mounting an occurrence creates the instance and an effect whose body
//!    is "render, then commit". Everything the render function reads
//!    subscribes the whole component.
//!
//! 2. The first run mounts the returned subtree. Later runs patch the new
//!    subtree against the previous one.
//!
//! 3. A parent patching the occurrence re-runs the effect only when the
//!    props or children changed (shallow comparison).
//!
//! 4. Unmounting runs the unmount callbacks, then unmounts the subtree, then
//!    stops the effect.
//!
//! Component effects have no scheduler: a write re-renders the affected
//! components synchronously, depth-first, before the write returns.
//!
//! # Lifecycle Callbacks
//!
//! [`on_mounted`], [`on_updated`] and [`on_unmounted`] register callbacks
//! for the instance currently rendering. The lists are rebuilt by every
//! render. Mount and update callbacks run in a microtask after the commit.
//! A panicking callback is logged and does not stop its siblings.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use super::host::HostNode;
use super::renderer;
use super::vnode::{Props, VNode, VNodeType};
use crate::reactive::{Effect, EffectOptions};
use crate::scheduler::queue_microtask;

type RenderFn = dyn Fn(&Props, &[VNode]) -> Option<VNode> + Send + Sync;

struct ComponentDef {
    name: Arc<str>,
    render: Box<RenderFn>,
}

/// A component definition.
///
/// Identity is the definition itself: clones are the same component, two
/// separately created components never are, even with equal names.
#[derive(Clone)]
pub struct Component {
    def: Arc<ComponentDef>,
}

impl Component {
    /// Define a component. `render` receives the props and children of each
    /// occurrence and returns its subtree, or `None` to render nothing.
    pub fn new<F>(name: &str, render: F) -> Self
    where
        F: Fn(&Props, &[VNode]) -> Option<VNode> + Send + Sync + 'static,
    {
        Self {
            def: Arc::new(ComponentDef {
                name: Arc::from(name),
                render: Box::new(render),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Arc::ptr_eq(&self.def, &other.def)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.def.name).finish()
    }
}

// -----------------------------------------------------------------------------
// Lifecycle
// -----------------------------------------------------------------------------

type LifecycleHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleKind {
    Mounted,
    Updated,
    Unmounted,
}

impl LifecycleKind {
    fn name(self) -> &'static str {
        match self {
            LifecycleKind::Mounted => "mounted",
            LifecycleKind::Updated => "updated",
            LifecycleKind::Unmounted => "unmounted",
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    mounted: Vec<LifecycleHook>,
    updated: Vec<LifecycleHook>,
    unmounted: Vec<LifecycleHook>,
}

impl Lifecycle {
    fn list(&mut self, kind: LifecycleKind) -> &mut Vec<LifecycleHook> {
        match kind {
            LifecycleKind::Mounted => &mut self.mounted,
            LifecycleKind::Updated => &mut self.updated,
            LifecycleKind::Unmounted => &mut self.unmounted,
        }
    }
}

// -----------------------------------------------------------------------------
// Instances
// -----------------------------------------------------------------------------

pub(crate) type HookSlot = Box<dyn Any + Send + Sync>;

#[derive(Default)]
struct InstanceState {
    props: Props,
    children: Vec<VNode>,
    subtree: Option<VNode>,
    /// Stands in for an empty render so the position stays known.
    placeholder: Option<HostNode>,
    /// Where the first render goes. Taken by that render.
    mount_target: Option<(HostNode, Option<HostNode>)>,
    is_mounted: bool,
    is_unmounted: bool,
    hooks: Vec<HookSlot>,
    hook_cursor: usize,
    lifecycle: Lifecycle,
}

struct InstanceInner {
    id: u64,
    component: Component,
    state: Mutex<InstanceState>,
    effect: OnceLock<Effect>,
}

/// Runtime state of one mounted component occurrence.
#[derive(Clone)]
pub struct ComponentInstance {
    inner: Arc<InstanceInner>,
}

thread_local! {
    static CURRENT_INSTANCE: RefCell<Vec<ComponentInstance>> = const { RefCell::new(Vec::new()) };
}

/// Marks an instance as rendering for the guard's lifetime.
struct RenderScope;

impl RenderScope {
    fn enter(instance: &ComponentInstance) -> Self {
        CURRENT_INSTANCE.with(|stack| stack.borrow_mut().push(instance.clone()));
        RenderScope
    }
}

impl Drop for RenderScope {
    fn drop(&mut self) {
        CURRENT_INSTANCE.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// The instance whose render function is running, if any.
pub fn current_instance() -> Option<ComponentInstance> {
    CURRENT_INSTANCE.with(|stack| stack.borrow().last().cloned())
}

impl ComponentInstance {
    fn new(component: Component, props: Props, children: Vec<VNode>) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self {
            inner: Arc::new(InstanceInner {
                id: COUNTER.fetch_add(1, Ordering::Relaxed),
                component,
                state: Mutex::new(InstanceState {
                    props,
                    children,
                    ..InstanceState::default()
                }),
                effect: OnceLock::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn component(&self) -> &Component {
        &self.inner.component
    }

    pub fn name(&self) -> &str {
        self.inner.component.name()
    }

    pub fn props(&self) -> Props {
        self.inner.state.lock().props.clone()
    }

    /// The subtree returned by the latest committed render.
    pub fn subtree(&self) -> Option<VNode> {
        self.inner.state.lock().subtree.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.state.lock().is_mounted
    }

    pub fn is_unmounted(&self) -> bool {
        self.inner.state.lock().is_unmounted
    }

    /// Number of completed renders.
    pub fn render_count(&self) -> usize {
        self.inner.effect.get().map_or(0, Effect::run_count)
    }

    pub fn ptr_eq(&self, other: &ComponentInstance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn downgrade(&self) -> Weak<InstanceInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn host_nodes(&self) -> Vec<HostNode> {
        let (subtree, placeholder) = {
            let state = self.inner.state.lock();
            (state.subtree.clone(), state.placeholder.clone())
        };
        match subtree {
            Some(subtree) => renderer::host_nodes(&subtree),
            None => placeholder.into_iter().collect(),
        }
    }

    /// Claim the next hook slot. The slot's previous content, if any, is
    /// moved out and must be handed back with [`Self::store_hook`].
    pub(crate) fn take_hook(&self) -> (usize, Option<HookSlot>) {
        let mut state = self.inner.state.lock();
        let index = state.hook_cursor;
        state.hook_cursor += 1;
        let slot = state
            .hooks
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, Box::new(())));
        (index, slot)
    }

    pub(crate) fn store_hook(&self, index: usize, slot: HookSlot) {
        let mut state = self.inner.state.lock();
        while state.hooks.len() <= index {
            state.hooks.push(Box::new(()));
        }
        state.hooks[index] = slot;
    }

    fn register(&self, kind: LifecycleKind, hook: LifecycleHook) {
        self.inner.state.lock().lifecycle.list(kind).push(hook);
    }

    /// Render and commit. Body of the instance's effect.
    fn update(&self) {
        let (props, children) = {
            let mut state = self.inner.state.lock();
            if state.is_unmounted {
                return;
            }
            state.hook_cursor = 0;
            state.lifecycle = Lifecycle::default();
            (state.props.clone(), state.children.clone())
        };

        let next = {
            let _scope = RenderScope::enter(self);
            (self.inner.component.def.render)(&props, &children)
        };

        if self.is_mounted() {
            self.commit_update(next);
        } else {
            self.commit_mount(next);
        }
    }

    fn commit_mount(&self, next: Option<VNode>) {
        let Some((container, anchor)) = self.inner.state.lock().mount_target.take() else {
            tracing::warn!(component = self.name(), "component rendered without a mount target");
            return;
        };
        tracing::debug!(component = self.name(), instance = self.id(), "mounting component");

        let placeholder = match &next {
            Some(subtree) => {
                renderer::mount(subtree, &container, anchor.as_ref());
                None
            }
            None => {
                let placeholder = HostNode::comment("");
                container.insert_before(&placeholder, anchor.as_ref());
                Some(placeholder)
            }
        };

        {
            let mut state = self.inner.state.lock();
            state.subtree = next;
            state.placeholder = placeholder;
            state.is_mounted = true;
        }
        self.queue_lifecycle(LifecycleKind::Mounted);
    }

    fn commit_update(&self, next: Option<VNode>) {
        let (previous, placeholder) = {
            let state = self.inner.state.lock();
            (state.subtree.clone(), state.placeholder.clone())
        };
        tracing::trace!(component = self.name(), instance = self.id(), "patching component");

        let first = self.host_nodes().into_iter().next();
        let Some(container) = first.and_then(|node| node.parent()) else {
            tracing::warn!(component = self.name(), "component output is detached; skipping update");
            return;
        };

        let placeholder = match (&previous, &next) {
            (Some(previous), Some(next)) => {
                renderer::patch(previous, next, &container, None);
                None
            }
            (Some(previous), None) => {
                let after = renderer::next_host_sibling(previous);
                renderer::unmount(previous, true);
                let placeholder = HostNode::comment("");
                container.insert_before(&placeholder, after.as_ref());
                Some(placeholder)
            }
            (None, Some(next)) => {
                if let Some(placeholder) = &placeholder {
                    renderer::mount(next, &container, Some(placeholder));
                    placeholder.remove();
                }
                None
            }
            (None, None) => placeholder,
        };

        {
            let mut state = self.inner.state.lock();
            state.subtree = next;
            state.placeholder = placeholder;
        }
        self.queue_lifecycle(LifecycleKind::Updated);
    }

    fn queue_lifecycle(&self, kind: LifecycleKind) {
        let hooks = self.inner.state.lock().lifecycle.list(kind).clone();
        if hooks.is_empty() {
            return;
        }
        let weak = self.downgrade();
        queue_microtask(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let instance = ComponentInstance { inner };
            if !instance.is_unmounted() {
                instance.call_hooks(kind, &hooks);
            }
        });
    }

    fn call_hooks(&self, kind: LifecycleKind, hooks: &[LifecycleHook]) {
        for hook in hooks {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| hook())) {
                tracing::error!(
                    component = self.name(),
                    hook = kind.name(),
                    message = panic_message(payload.as_ref()),
                    "lifecycle callback panicked"
                );
            }
        }
    }

    /// Store new props and children from a parent patch. Re-renders only if
    /// either changed.
    fn receive(&self, props: &Props, children: &[VNode]) {
        let changed = {
            let mut state = self.inner.state.lock();
            let same_children = state.children.len() == children.len()
                && state.children.iter().zip(children).all(|(a, b)| a.ptr_eq(b));
            let changed = !same_children || !state.props.shallow_eq(props);
            if changed {
                state.props = props.clone();
                state.children = children.to_vec();
            }
            changed
        };

        if changed {
            if let Some(effect) = self.inner.effect.get() {
                effect.run();
            }
        }
    }

    /// Run unmount callbacks, unmount the subtree, then stop the effect.
    pub(crate) fn unmount(&self, remove: bool) {
        let hooks = {
            let mut state = self.inner.state.lock();
            if state.is_unmounted {
                return;
            }
            state.is_unmounted = true;
            state.lifecycle.unmounted.clone()
        };
        tracing::debug!(component = self.name(), instance = self.id(), "unmounting component");

        self.call_hooks(LifecycleKind::Unmounted, &hooks);

        let (subtree, placeholder) = {
            let mut state = self.inner.state.lock();
            (state.subtree.take(), state.placeholder.take())
        };
        if let Some(subtree) = subtree {
            renderer::unmount(&subtree, remove);
        }
        if let (Some(placeholder), true) = (placeholder, remove) {
            placeholder.remove();
        }

        if let Some(effect) = self.inner.effect.get() {
            effect.stop();
        }
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.id())
            .field("component", &self.name())
            .field("render_count", &self.render_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Mount a component vnode: create its instance and run the first render.
pub(crate) fn mount_component(vnode: &VNode, container: &HostNode, anchor: Option<&HostNode>) {
    let VNodeType::Component(component) = vnode.kind() else {
        return;
    };

    let instance = ComponentInstance::new(component.clone(), vnode.props().clone(), vnode.children().to_vec());
    instance.inner.state.lock().mount_target = Some((container.clone(), anchor.cloned()));
    vnode.set_component_instance(instance.clone());

    let weak = instance.downgrade();
    let effect = Effect::with_options(
        move || {
            if let Some(inner) = weak.upgrade() {
                ComponentInstance { inner }.update();
            }
        },
        EffectOptions::lazy(),
    );
    let _ = instance.inner.effect.set(effect.clone());
    effect.run();
}

/// Patch a component vnode: hand the live instance to `new`, and re-render
/// it if its inputs changed.
pub(crate) fn patch_component(old: &VNode, new: &VNode) {
    let Some(instance) = old.component_instance() else {
        return;
    };
    new.set_component_instance(instance.clone());
    instance.receive(new.props(), new.children());
}

fn register(kind: LifecycleKind, hook: LifecycleHook) {
    match current_instance() {
        Some(instance) => instance.register(kind, hook),
        None => tracing::warn!(
            hook = kind.name(),
            "lifecycle callback registered outside of a component render; ignored"
        ),
    }
}

/// Run `f` after the component's first commit.
pub fn on_mounted<F>(f: F)
where
    F: Fn() + Send + Sync + 'static,
{
    register(LifecycleKind::Mounted, Arc::new(f));
}

/// Run `f` after each re-render commit.
pub fn on_updated<F>(f: F)
where
    F: Fn() + Send + Sync + 'static,
{
    register(LifecycleKind::Updated, Arc::new(f));
}

/// Run `f` when the component is unmounted, before its subtree is.
pub fn on_unmounted<F>(f: F)
where
    F: Fn() + Send + Sync + 'static,
{
    register(LifecycleKind::Unmounted, Arc::new(f));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::new_ref;
    use crate::render::renderer::render;
    use crate::render::vnode::h;
    use crate::scheduler::flush_microtasks;
    use std::sync::atomic::AtomicI32;

    fn counter() -> (Arc<AtomicI32>, Arc<AtomicI32>) {
        let count = Arc::new(AtomicI32::new(0));
        (count.clone(), count)
    }

    #[test]
    fn component_rerenders_when_its_reads_change() {
        let count = new_ref(0_i32);
        let count_clone = count.clone();
        let view = Component::new("Counter", move |_, _| {
            Some(h("span", Props::new(), [count_clone.get().to_string()]))
        });

        let root = HostNode::element("div");
        render(Some(&VNode::component(&view, Props::new(), Vec::<VNode>::new())), &root);
        assert_eq!(root.text_content(), "0");

        count.set(1);
        assert_eq!(root.text_content(), "1");
    }

    #[test]
    fn mounted_and_updated_callbacks_run_after_commit() {
        let (mounted, mounted_clone) = counter();
        let (updated, updated_clone) = counter();
        let count = new_ref(0_i32);
        let count_clone = count.clone();

        let view = Component::new("Hooks", move |_, _| {
            let (m, u) = (mounted_clone.clone(), updated_clone.clone());
            on_mounted(move || {
                m.fetch_add(1, Ordering::SeqCst);
            });
            on_updated(move || {
                u.fetch_add(1, Ordering::SeqCst);
            });
            Some(VNode::text(count_clone.get().to_string()))
        });

        let root = HostNode::element("div");
        render(Some(&VNode::component(&view, Props::new(), Vec::<VNode>::new())), &root);
        assert_eq!(mounted.load(Ordering::SeqCst), 0);

        flush_microtasks();
        assert_eq!(mounted.load(Ordering::SeqCst), 1);

        count.set(5);
        flush_microtasks();
        assert_eq!(mounted.load(Ordering::SeqCst), 1);
        assert_eq!(updated.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_callback_does_not_block_siblings() {
        let (ran, ran_clone) = counter();
        let view = Component::new("Faulty", move |_, _| {
            on_mounted(|| panic!("boom"));
            let ran = ran_clone.clone();
            on_mounted(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
            None
        });

        let root = HostNode::element("div");
        render(Some(&VNode::component(&view, Props::new(), Vec::<VNode>::new())), &root);
        flush_microtasks();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lifecycle_registration_outside_render_is_ignored() {
        on_mounted(|| panic!("never runs"));
        assert!(current_instance().is_none());
        flush_microtasks();
    }

    #[test]
    fn unchanged_props_skip_rerender() {
        let (renders, renders_clone) = counter();
        let child = Component::new("Child", move |props, _| {
            renders_clone.fetch_add(1, Ordering::SeqCst);
            Some(VNode::text(props.get("label").map(|v| v.display_string()).unwrap_or_default()))
        });

        let tree = |label: &str| {
            h(
                "div",
                Props::new(),
                [VNode::component(&child, Props::new().with("label", label), Vec::<VNode>::new())],
            )
        };
        let root = HostNode::element("div");

        render(Some(&tree("a")), &root);
        render(Some(&tree("a")), &root);
        assert_eq!(renders.load(Ordering::SeqCst), 1);

        render(Some(&tree("b")), &root);
        assert_eq!(renders.load(Ordering::SeqCst), 2);
        assert_eq!(root.text_content(), "b");
    }

    #[test]
    fn empty_render_keeps_position() {
        let show = new_ref(false);
        let show_clone = show.clone();
        let maybe = Component::new("Maybe", move |_, _| {
            show_clone.get().then(|| h("b", Props::new(), ["shown"]))
        });

        let root = HostNode::element("div");
        let tree = h(
            "div",
            Props::new(),
            vec![
                h("i", Props::new(), ["1"]),
                VNode::component(&maybe, Props::new(), Vec::<VNode>::new()),
                h("i", Props::new(), ["2"]),
            ],
        );
        render(Some(&tree), &root);
        assert_eq!(root.to_html(), "<div><div><i>1</i><!----><i>2</i></div></div>");

        show.set(true);
        assert_eq!(root.to_html(), "<div><div><i>1</i><b>shown</b><i>2</i></div></div>");

        show.set(false);
        assert_eq!(root.to_html(), "<div><div><i>1</i><!----><i>2</i></div></div>");
    }
}
