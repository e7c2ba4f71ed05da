//! Virtual Nodes
//!
//! A [`VNode`] describes intended output: an element, a component
//! occurrence, a fragment or a text run, with props, normalized children
//! and an optional identity key.
//!
//! # Normalization
//!
//! Children are given as [`Child`] values and normalized once, at
//! construction:
//!
//! 1. Nested lists are flattened, however deep.
//! 2. `Null`, booleans and empty strings are dropped, so `cond.then(..)`
//!    and friends can be used inline.
//! 3. Strings and numbers become text nodes.
//!
//! After mounting, a vnode also records what it produced (host node,
//! fragment anchor, component instance). The renderer reads those fields
//! back when the vnode is later patched or unmounted.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::component::{Component, ComponentInstance};
use super::host::HostNode;
use crate::reactive::{format_number, same_value, Value};

/// Identity key used for keyed reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Arc<str>),
    Int(i64),
}

impl Key {
    /// Read a key out of a prop value. Objects and callbacks have no key form.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Str(s) => Some(Key::Str(s.clone())),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Some(Key::Int(*n as i64)),
            Value::Number(n) => Some(Key::Str(Arc::from(format_number(*n)))),
            Value::Bool(b) => Some(Key::Str(Arc::from(b.to_string()))),
            _ => None,
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(Arc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(Arc::from(s))
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Int(i64::from(n))
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Str(s) => Value::Str(s),
            Key::Int(n) => Value::Number(n as f64),
        }
    }
}

/// What a vnode describes.
#[derive(Clone)]
pub enum VNodeType {
    Element(Arc<str>),
    Component(Component),
    Fragment,
    Text,
}

impl VNodeType {
    /// Two types are the same if a patch can turn one into the other.
    pub fn same_type(&self, other: &VNodeType) -> bool {
        match (self, other) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Component(a), VNodeType::Component(b)) => a.ptr_eq(b),
            (VNodeType::Fragment, VNodeType::Fragment) => true,
            (VNodeType::Text, VNodeType::Text) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for VNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "Element({tag})"),
            VNodeType::Component(c) => write!(f, "Component({})", c.name()),
            VNodeType::Fragment => f.write_str("Fragment"),
            VNodeType::Text => f.write_str("Text"),
        }
    }
}

impl From<&str> for VNodeType {
    fn from(tag: &str) -> Self {
        VNodeType::Element(Arc::from(tag))
    }
}

impl From<Component> for VNodeType {
    fn from(component: Component) -> Self {
        VNodeType::Component(component)
    }
}

impl From<&Component> for VNodeType {
    fn from(component: &Component) -> Self {
        VNodeType::Component(component.clone())
    }
}

/// Ordered props of a vnode.
#[derive(Clone, Debug, Default)]
pub struct Props(IndexMap<Arc<str>, Value>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(Arc::from(key), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The `key` prop, if it has a key form.
    pub fn key(&self) -> Option<Key> {
        self.get("key").and_then(Key::from_value)
    }

    /// Same keys, and every value `Object.is`-equal.
    pub fn shallow_eq(&self, other: &Props) -> bool {
        self.len() == other.len()
            && self
                .0
                .iter()
                .all(|(k, v)| other.0.get(k).is_some_and(|o| same_value(v, o)))
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (Arc::from(k.as_ref()), v.into()))
                .collect(),
        )
    }
}

/// A child as written at the call site, before normalization.
#[derive(Clone, Debug)]
pub enum Child {
    Node(VNode),
    Text(Arc<str>),
    Number(f64),
    Bool(bool),
    Null,
    List(Vec<Child>),
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl From<&VNode> for Child {
    fn from(node: &VNode) -> Self {
        Child::Node(node.clone())
    }
}

impl From<&str> for Child {
    fn from(s: &str) -> Self {
        Child::Text(Arc::from(s))
    }
}

impl From<String> for Child {
    fn from(s: String) -> Self {
        Child::Text(Arc::from(s))
    }
}

impl From<bool> for Child {
    fn from(b: bool) -> Self {
        Child::Bool(b)
    }
}

macro_rules! child_from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for Child {
            fn from(n: $t) -> Self {
                Child::Number(n as f64)
            }
        })*
    };
}

child_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(child: Option<T>) -> Self {
        child.map(Into::into).unwrap_or(Child::Null)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(children: Vec<T>) -> Self {
        Child::List(children.into_iter().map(Into::into).collect())
    }
}

fn normalize_into(child: Child, out: &mut Vec<VNode>) {
    match child {
        Child::Node(node) => out.push(node),
        Child::Text(text) if text.is_empty() => {}
        Child::Text(text) => out.push(VNode::text(text)),
        Child::Number(n) => out.push(VNode::text(format_number(n))),
        Child::Bool(_) | Child::Null => {}
        Child::List(list) => {
            for child in list {
                normalize_into(child, out);
            }
        }
    }
}

/// Flatten and filter call-site children into vnodes.
pub fn normalize_children<I, C>(children: I) -> Vec<VNode>
where
    I: IntoIterator<Item = C>,
    C: Into<Child>,
{
    let mut out = Vec::new();
    for child in children {
        normalize_into(child.into(), &mut out);
    }
    out
}

/// Output recorded by the renderer.
#[derive(Default)]
struct MountState {
    el: Option<HostNode>,
    /// End marker of a mounted fragment.
    anchor: Option<HostNode>,
    component: Option<ComponentInstance>,
}

struct VNodeInner {
    kind: VNodeType,
    props: Props,
    children: Vec<VNode>,
    key: Option<Key>,
    text: Option<Arc<str>>,
    mount: Mutex<MountState>,
}

/// A node of a virtual tree.
///
/// Cheap to clone; clones are the same node.
#[derive(Clone)]
pub struct VNode {
    inner: Arc<VNodeInner>,
}

impl VNode {
    fn build(kind: VNodeType, props: Props, children: Vec<VNode>, text: Option<Arc<str>>) -> Self {
        let key = props.key();
        Self {
            inner: Arc::new(VNodeInner {
                kind,
                props,
                children,
                key,
                text,
                mount: Mutex::new(MountState::default()),
            }),
        }
    }

    /// Create a node of any type with already-built props and children.
    pub fn new<I, C>(kind: impl Into<VNodeType>, props: Props, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        let kind = kind.into();
        if matches!(kind, VNodeType::Text) {
            let text: String = normalize_children(children)
                .iter()
                .filter_map(|c| c.as_text())
                .map(|t| t.to_string())
                .collect();
            return Self::text(text);
        }
        Self::build(kind, props, normalize_children(children), None)
    }

    pub fn element<I, C>(tag: &str, props: Props, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        Self::new(tag, props, children)
    }

    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::build(VNodeType::Text, Props::default(), Vec::new(), Some(text.into()))
    }

    pub fn fragment<I, C>(children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        Self::new(VNodeType::Fragment, Props::default(), children)
    }

    /// A keyed fragment.
    pub fn fragment_with_props<I, C>(props: Props, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        Self::new(VNodeType::Fragment, props, children)
    }

    /// An occurrence of `component`. `children` reach the render function
    /// as its second argument.
    pub fn component<I, C>(component: &Component, props: Props, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        Self::new(component, props, children)
    }

    pub fn kind(&self) -> &VNodeType {
        &self.inner.kind
    }

    pub fn props(&self) -> &Props {
        &self.inner.props
    }

    pub fn children(&self) -> &[VNode] {
        &self.inner.children
    }

    pub fn key(&self) -> Option<&Key> {
        self.inner.key.as_ref()
    }

    /// Payload of a text node.
    pub fn as_text(&self) -> Option<&str> {
        self.inner.text.as_deref()
    }

    pub fn is_text(&self) -> bool {
        matches!(self.inner.kind, VNodeType::Text)
    }

    pub fn same_type(&self, other: &VNode) -> bool {
        self.inner.kind.same_type(&other.inner.kind)
    }

    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The host node produced for an element or text node.
    pub fn el(&self) -> Option<HostNode> {
        self.inner.mount.lock().el.clone()
    }

    /// The live instance of a mounted component node.
    pub fn component_instance(&self) -> Option<ComponentInstance> {
        self.inner.mount.lock().component.clone()
    }

    pub(crate) fn set_el(&self, el: HostNode) {
        self.inner.mount.lock().el = Some(el);
    }

    pub(crate) fn anchor(&self) -> Option<HostNode> {
        self.inner.mount.lock().anchor.clone()
    }

    pub(crate) fn set_anchor(&self, anchor: HostNode) {
        self.inner.mount.lock().anchor = Some(anchor);
    }

    pub(crate) fn set_component_instance(&self, instance: ComponentInstance) {
        self.inner.mount.lock().component = Some(instance);
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => write!(f, "VNode(Text {text:?})"),
            None => f
                .debug_struct("VNode")
                .field("kind", &self.inner.kind)
                .field("key", &self.inner.key)
                .field("props", &self.inner.props)
                .field("children", &self.inner.children)
                .finish(),
        }
    }
}

/// Create a vnode: `h("div", props, ["hello"])`.
pub fn h<I, C>(kind: impl Into<VNodeType>, props: Props, children: I) -> VNode
where
    I: IntoIterator<Item = C>,
    C: Into<Child>,
{
    VNode::new(kind, props, children)
}
