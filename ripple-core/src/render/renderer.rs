//! Renderer / Reconciler
//!
//! Mounts virtual trees into host containers and patches them in place.
//!
//! # How Rendering Works
//!
//! 1. Each container remembers the tree last rendered into it. [`render`]
//!    compares against that tree: nothing before means mount, nothing after
//!    means unmount, both means patch.
//!
//! 2. `patch` keeps the host output of the old node when the types match
//!    and rewrites only what changed. Different types at the same position
//!    are never diffed: the old node is unmounted and the new one mounted in
//!    its place.
//!
//! 3. Children are reconciled in a single left-to-right pass. Keyed children
//!    match by key, unkeyed children match positionally, leftovers are
//!    unmounted, and a final pass moves host nodes that are out of order.
//!
//! Fragments have no wrapper element: their children sit directly in the
//! parent, followed by an empty comment that marks where the fragment ends.

use std::collections::VecDeque;

use indexmap::IndexMap;

use super::component;
use super::host::{HostNode, Namespace};
use super::props::{patch_prop, patch_props};
use super::vnode::{Key, VNode, VNodeType};

/// Render `vnode` into `container`, or clear it when `vnode` is `None`.
pub fn render(vnode: Option<&VNode>, container: &HostNode) {
    let previous = container.rendered_tree();

    match (previous, vnode) {
        (None, None) => {}
        (Some(prev), None) => {
            tracing::debug!(container = container.id(), "unmounting root");
            unmount(&prev, true);
        }
        (None, Some(next)) => {
            tracing::debug!(container = container.id(), "mounting root");
            mount(next, container, None);
        }
        (Some(prev), Some(next)) => patch(&prev, next, container, None),
    }

    container.set_rendered_tree(vnode.cloned());
}

/// Mount `vnode` into `container` before `anchor` (or at the end).
pub(crate) fn mount(vnode: &VNode, container: &HostNode, anchor: Option<&HostNode>) {
    match vnode.kind() {
        VNodeType::Element(tag) => mount_element(vnode, tag, container, anchor),
        VNodeType::Text => {
            let el = HostNode::text(vnode.as_text().unwrap_or_default());
            container.insert_before(&el, anchor);
            vnode.set_el(el);
        }
        VNodeType::Fragment => {
            let end = HostNode::comment("");
            container.insert_before(&end, anchor);
            for child in vnode.children() {
                mount(child, container, Some(&end));
            }
            vnode.set_anchor(end);
        }
        VNodeType::Component(_) => component::mount_component(vnode, container, anchor),
    }
}

fn element_namespace(tag: &str, container: &HostNode) -> Namespace {
    if tag == "svg" {
        return Namespace::Svg;
    }
    match container.namespace() {
        Some(Namespace::Svg) if container.tag() != Some("foreignObject") => Namespace::Svg,
        _ => Namespace::Html,
    }
}

fn mount_element(vnode: &VNode, tag: &str, container: &HostNode, anchor: Option<&HostNode>) {
    let el = HostNode::element_ns(tag, element_namespace(tag, container));
    for (key, value) in vnode.props().iter() {
        patch_prop(&el, key, None, Some(value));
    }
    for child in vnode.children() {
        mount(child, &el, None);
    }
    container.insert_before(&el, anchor);
    vnode.set_el(el);
}

/// Patch `old` (currently mounted) into `new`.
///
/// `anchor` is where a replacement goes if `old` has no host output left to
/// position against.
pub(crate) fn patch(old: &VNode, new: &VNode, container: &HostNode, anchor: Option<&HostNode>) {
    if old.ptr_eq(new) {
        return;
    }

    if !old.same_type(new) {
        tracing::trace!(old = ?old.kind(), new = ?new.kind(), "type changed; replacing node");
        let next = next_host_sibling(old).or_else(|| anchor.cloned());
        unmount(old, true);
        mount(new, container, next.as_ref());
        return;
    }

    match new.kind() {
        VNodeType::Element(_) => {
            let Some(el) = old.el() else {
                mount(new, container, anchor);
                return;
            };
            patch_props(&el, old.props(), new.props());
            patch_children(old.children(), new.children(), &el, None);
            new.set_el(el);
        }
        VNodeType::Text => {
            let Some(el) = old.el() else {
                mount(new, container, anchor);
                return;
            };
            let text = new.as_text().unwrap_or_default();
            if old.as_text() != Some(text) {
                el.set_node_value(text);
            }
            new.set_el(el);
        }
        VNodeType::Fragment => {
            let Some(end) = old.anchor() else {
                mount(new, container, anchor);
                return;
            };
            let parent = end.parent().unwrap_or_else(|| container.clone());
            patch_children(old.children(), new.children(), &parent, Some(&end));
            new.set_anchor(end);
        }
        VNodeType::Component(_) => component::patch_component(old, new),
    }
}

/// Tear down `vnode`. With `remove`, its host nodes are also detached;
/// without, they leave together with an ancestor that is being removed.
pub(crate) fn unmount(vnode: &VNode, remove: bool) {
    match vnode.kind() {
        VNodeType::Element(_) => {
            for child in vnode.children() {
                unmount(child, false);
            }
            if remove {
                if let Some(el) = vnode.el() {
                    el.remove();
                }
            }
        }
        VNodeType::Text => {
            if remove {
                if let Some(el) = vnode.el() {
                    el.remove();
                }
            }
        }
        VNodeType::Fragment => {
            for child in vnode.children() {
                unmount(child, remove);
            }
            if remove {
                if let Some(end) = vnode.anchor() {
                    end.remove();
                }
            }
        }
        VNodeType::Component(_) => {
            if let Some(instance) = vnode.component_instance() {
                instance.unmount(remove);
            }
        }
    }
}

/// The top-level host nodes `vnode` occupies in its container, in order.
pub(crate) fn host_nodes(vnode: &VNode) -> Vec<HostNode> {
    match vnode.kind() {
        VNodeType::Element(_) | VNodeType::Text => vnode.el().into_iter().collect(),
        VNodeType::Fragment => {
            let mut nodes: Vec<HostNode> = vnode.children().iter().flat_map(host_nodes).collect();
            nodes.extend(vnode.anchor());
            nodes
        }
        VNodeType::Component(_) => vnode
            .component_instance()
            .map(|instance| instance.host_nodes())
            .unwrap_or_default(),
    }
}

/// The host node right after everything `vnode` occupies.
pub(crate) fn next_host_sibling(vnode: &VNode) -> Option<HostNode> {
    host_nodes(vnode).last().and_then(HostNode::next_sibling)
}

/// How text-like entries are spread over a child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Empty,
    Text,
    Nodes,
    Mixed,
}

fn shape(children: &[VNode]) -> Shape {
    let text = children.iter().filter(|c| c.is_text()).count();
    match (children.len(), text) {
        (0, _) => Shape::Empty,
        (n, t) if n == t => Shape::Text,
        (_, 0) => Shape::Nodes,
        _ => Shape::Mixed,
    }
}

fn needs_remount(old: Shape, new: Shape) -> bool {
    matches!(
        (old, new),
        (Shape::Mixed, _) | (_, Shape::Mixed) | (Shape::Text, Shape::Nodes) | (Shape::Nodes, Shape::Text)
    )
}

/// Reconcile two child lists inside `container`, before `anchor`.
pub(crate) fn patch_children(old: &[VNode], new: &[VNode], container: &HostNode, anchor: Option<&HostNode>) {
    // A lone text child is patched in place.
    if let ([old_text], [new_text]) = (old, new) {
        if old_text.is_text() && new_text.is_text() {
            patch(old_text, new_text, container, anchor);
            return;
        }
    }

    if needs_remount(shape(old), shape(new)) {
        tracing::trace!(old = old.len(), new = new.len(), "mixed children; remounting");
        for child in old {
            unmount(child, true);
        }
        for child in new {
            mount(child, container, anchor);
        }
        return;
    }

    let mut keyed: IndexMap<Key, VNode> = IndexMap::new();
    let mut unkeyed: VecDeque<VNode> = VecDeque::new();
    let mut stale: Vec<VNode> = Vec::new();

    for child in old {
        match child.key() {
            Some(key) if keyed.contains_key(key) => stale.push(child.clone()),
            Some(key) => {
                keyed.insert(key.clone(), child.clone());
            }
            None => unkeyed.push_back(child.clone()),
        }
    }

    for child in new {
        let matched = match child.key() {
            Some(key) => keyed.shift_remove(key),
            None => unkeyed.pop_front(),
        };
        match matched {
            Some(previous) => patch(&previous, child, container, anchor),
            None => mount(child, container, anchor),
        }
    }

    for leftover in keyed.into_values().chain(unkeyed).chain(stale) {
        unmount(&leftover, true);
    }

    // Right-to-left: each node belongs immediately before the one placed
    // after it. Only nodes that are out of place are moved.
    let mut next = anchor.cloned();
    for child in new.iter().rev() {
        for node in host_nodes(child).iter().rev() {
            let in_place = node.parent().is_some_and(|p| p.ptr_eq(container))
                && match (node.next_sibling(), &next) {
                    (Some(sibling), Some(expected)) => sibling.ptr_eq(expected),
                    (None, None) => true,
                    _ => false,
                };
            if !in_place {
                container.insert_before(node, next.as_ref());
            }
            next = Some(node.clone());
        }
    }
}
