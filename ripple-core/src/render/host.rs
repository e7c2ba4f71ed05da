//! Host Output Surface
//!
//! The renderer draws into an in-memory document of [`HostNode`]s: elements,
//! text nodes and comments linked into a tree. It plays the role a browser
//! DOM plays for a web renderer, and is what tests and embedders inspect.
//!
//! # Locking
//!
//! Every node guards its state with its own mutex. Tree operations never
//! hold two node locks at once: linking a child into a parent locks the
//! parent, releases it, then locks the child.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

use super::vnode::VNode;
use crate::error::{Result, RippleError};
use crate::reactive::{Callback, Value};

/// Markup namespace of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Html,
    Svg,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKind {
    Element { tag: Arc<str>, namespace: Namespace },
    Text,
    Comment,
}

#[derive(Default)]
struct HostState {
    /// Payload of text and comment nodes.
    data: String,
    attributes: IndexMap<String, String>,
    style: IndexMap<String, String>,
    listeners: IndexMap<String, Callback>,
    children: Vec<HostNode>,
    parent: Weak<HostNodeInner>,
    /// The tree last rendered into this node as a container.
    rendered: Option<VNode>,
}

struct HostNodeInner {
    id: u64,
    kind: HostKind,
    state: Mutex<HostState>,
}

/// A node of the output document.
///
/// Cloning yields another handle to the same node; compare handles with
/// [`HostNode::ptr_eq`].
#[derive(Clone)]
pub struct HostNode {
    inner: Arc<HostNodeInner>,
}

// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

impl HostNode {
    fn with_kind(kind: HostKind, data: &str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self {
            inner: Arc::new(HostNodeInner {
                id: COUNTER.fetch_add(1, Ordering::Relaxed),
                kind,
                state: Mutex::new(HostState {
                    data: data.to_string(),
                    ..HostState::default()
                }),
            }),
        }
    }

    /// Create an HTML element.
    pub fn element(tag: &str) -> Self {
        Self::element_ns(tag, Namespace::Html)
    }

    pub fn element_ns(tag: &str, namespace: Namespace) -> Self {
        Self::with_kind(
            HostKind::Element {
                tag: Arc::from(tag),
                namespace,
            },
            "",
        )
    }

    pub fn text(data: &str) -> Self {
        Self::with_kind(HostKind::Text, data)
    }

    pub fn comment(data: &str) -> Self {
        Self::with_kind(HostKind::Comment, data)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn kind(&self) -> &HostKind {
        &self.inner.kind
    }

    /// Tag name, for elements.
    pub fn tag(&self) -> Option<&str> {
        match &self.inner.kind {
            HostKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn namespace(&self) -> Option<Namespace> {
        match &self.inner.kind {
            HostKind::Element { namespace, .. } => Some(*namespace),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.inner.kind, HostKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.inner.kind, HostKind::Text)
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.inner.kind, HostKind::Comment)
    }

    pub fn ptr_eq(&self, other: &HostNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // -------------------------------------------------------------------------
    // Tree structure
    // -------------------------------------------------------------------------

    pub fn parent(&self) -> Option<HostNode> {
        self.inner
            .state
            .lock()
            .parent
            .upgrade()
            .map(|inner| HostNode { inner })
    }

    pub fn children(&self) -> Vec<HostNode> {
        self.inner.state.lock().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.inner.state.lock().children.len()
    }

    pub fn first_child(&self) -> Option<HostNode> {
        self.inner.state.lock().children.first().cloned()
    }

    pub fn next_sibling(&self) -> Option<HostNode> {
        let parent = self.parent()?;
        let siblings = parent.inner.state.lock();
        let index = siblings.children.iter().position(|c| c.ptr_eq(self))?;
        siblings.children.get(index + 1).cloned()
    }

    /// Insert `child` before `anchor`, or append when `anchor` is `None` or
    /// not a child of this node. A child attached elsewhere is moved.
    pub fn insert_before(&self, child: &HostNode, anchor: Option<&HostNode>) {
        if child.ptr_eq(self) {
            return;
        }
        child.remove();

        {
            let mut state = self.inner.state.lock();
            let index = anchor
                .and_then(|a| state.children.iter().position(|c| c.ptr_eq(a)))
                .unwrap_or(state.children.len());
            state.children.insert(index, child.clone());
        }

        child.inner.state.lock().parent = Arc::downgrade(&self.inner);
    }

    pub fn append_child(&self, child: &HostNode) {
        self.insert_before(child, None);
    }

    /// Detach from the parent, if any.
    pub fn remove(&self) {
        let parent = std::mem::take(&mut self.inner.state.lock().parent);
        if let Some(parent) = parent.upgrade() {
            parent.state.lock().children.retain(|c| !c.ptr_eq(self));
        }
    }

    pub fn clear_children(&self) {
        let children = std::mem::take(&mut self.inner.state.lock().children);
        for child in children {
            child.inner.state.lock().parent = Weak::new();
        }
    }

    // -------------------------------------------------------------------------
    // Content
    // -------------------------------------------------------------------------

    /// Payload of a text or comment node. Empty for elements.
    pub fn node_value(&self) -> String {
        self.inner.state.lock().data.clone()
    }

    pub fn set_node_value(&self, data: &str) {
        let mut state = self.inner.state.lock();
        if state.data != data {
            state.data = data.to_string();
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        match self.inner.kind {
            HostKind::Text => self.node_value(),
            HostKind::Comment => String::new(),
            HostKind::Element { .. } => self.children().iter().map(HostNode::text_content).collect(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.state.lock().attributes.get(name).cloned()
    }

    pub fn attributes(&self) -> IndexMap<String, String> {
        self.inner.state.lock().attributes.clone()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.inner
            .state
            .lock()
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove_attribute(&self, name: &str) {
        self.inner.state.lock().attributes.shift_remove(name);
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.inner.state.lock().attributes.contains_key(name)
    }

    pub fn style(&self, property: &str) -> Option<String> {
        self.inner.state.lock().style.get(property).cloned()
    }

    pub fn styles(&self) -> IndexMap<String, String> {
        self.inner.state.lock().style.clone()
    }

    pub fn set_style(&self, property: &str, value: &str) {
        self.inner
            .state
            .lock()
            .style
            .insert(property.to_string(), value.to_string());
    }

    pub fn remove_style(&self, property: &str) {
        self.inner.state.lock().style.shift_remove(property);
    }

    /// Replace the whole style map with declarations parsed from
    /// `"color: red; margin: 0"`.
    pub fn set_style_text(&self, css: &str) {
        let parsed: IndexMap<String, String> = css
            .split(';')
            .filter_map(|decl| {
                let (name, value) = decl.split_once(':')?;
                let (name, value) = (name.trim(), value.trim());
                (!name.is_empty()).then(|| (name.to_string(), value.to_string()))
            })
            .collect();
        self.inner.state.lock().style = parsed;
    }

    pub fn clear_style(&self) {
        self.inner.state.lock().style.clear();
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Bind the listener for `event`, replacing any previous one.
    pub fn add_event_listener(&self, event: &str, listener: Callback) {
        self.inner
            .state
            .lock()
            .listeners
            .insert(event.to_string(), listener);
    }

    pub fn remove_event_listener(&self, event: &str) {
        self.inner.state.lock().listeners.shift_remove(event);
    }

    pub fn has_listener(&self, event: &str) -> bool {
        self.inner.state.lock().listeners.contains_key(event)
    }

    /// Invoke the listener for `event`. Returns false if none is bound.
    pub fn dispatch(&self, event: &str, payload: &Value) -> bool {
        let listener = self.inner.state.lock().listeners.get(event).cloned();
        match listener {
            Some(listener) => {
                tracing::trace!(node = self.id(), event, "dispatching event");
                listener.call(payload);
                true
            }
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Container bookkeeping
    // -------------------------------------------------------------------------

    pub(crate) fn rendered_tree(&self) -> Option<VNode> {
        self.inner.state.lock().rendered.clone()
    }

    pub(crate) fn set_rendered_tree(&self, tree: Option<VNode>) {
        self.inner.state.lock().rendered = tree;
    }

    // -------------------------------------------------------------------------
    // Serialization
    // -------------------------------------------------------------------------

    /// Serialize the subtree as markup.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        let state = self.inner.state.lock();
        match &self.inner.kind {
            HostKind::Text => out.push_str(&escape_text(&state.data)),
            HostKind::Comment => {
                out.push_str("<!--");
                out.push_str(&state.data);
                out.push_str("-->");
            }
            HostKind::Element { tag, .. } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &state.attributes {
                    push_attribute(out, name, value);
                }
                if !state.style.is_empty() {
                    let css = state
                        .style
                        .iter()
                        .map(|(name, value)| format!("{name}: {value}"))
                        .collect::<Vec<_>>()
                        .join("; ");
                    push_attribute(out, "style", &css);
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&tag.as_ref()) {
                    return;
                }
                let children = state.children.clone();
                drop(state);
                for child in &children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// Capture the subtree as a serializable value.
    pub fn snapshot(&self) -> HostSnapshot {
        let state = self.inner.state.lock();
        match &self.inner.kind {
            HostKind::Text => HostSnapshot::Text {
                data: state.data.clone(),
            },
            HostKind::Comment => HostSnapshot::Comment {
                data: state.data.clone(),
            },
            HostKind::Element { tag, namespace } => {
                let children = state.children.clone();
                let attributes = state.attributes.clone();
                let style = state.style.clone();
                let listeners = state.listeners.keys().cloned().collect();
                drop(state);
                HostSnapshot::Element {
                    tag: tag.to_string(),
                    namespace: *namespace,
                    attributes,
                    style,
                    listeners,
                    children: children.iter().map(HostNode::snapshot).collect(),
                }
            }
        }
    }

    /// The snapshot as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    fn matches(&self, selector: &Selector<'_>) -> bool {
        match selector {
            Selector::Id(id) => self.attribute("id").as_deref() == Some(*id),
            Selector::Class(class) => self
                .attribute("class")
                .is_some_and(|classes| classes.split_whitespace().any(|c| c == *class)),
            Selector::Tag(tag) => self.tag().is_some_and(|t| t.eq_ignore_ascii_case(tag)),
        }
    }

    /// First element in pre-order (self included) matching `selector`.
    fn find(&self, selector: &Selector<'_>) -> Option<HostNode> {
        if !self.is_element() {
            return None;
        }
        if self.matches(selector) {
            return Some(self.clone());
        }
        self.children().iter().find_map(|child| child.find(selector))
    }
}

impl fmt::Debug for HostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            HostKind::Element { tag, .. } => write!(f, "HostNode(#{} <{}>)", self.id(), tag),
            HostKind::Text => write!(f, "HostNode(#{} {:?})", self.id(), self.node_value()),
            HostKind::Comment => write!(f, "HostNode(#{} <!---->)", self.id()),
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn push_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_text(value).replace('"', "&quot;"));
    out.push('"');
}

/// Serializable capture of a host subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HostSnapshot {
    Element {
        tag: String,
        namespace: Namespace,
        attributes: IndexMap<String, String>,
        style: IndexMap<String, String>,
        /// Names of events with a bound listener.
        listeners: Vec<String>,
        children: Vec<HostSnapshot>,
    },
    Text {
        data: String,
    },
    Comment {
        data: String,
    },
}

enum Selector<'a> {
    Id(&'a str),
    Class(&'a str),
    Tag(&'a str),
}

fn is_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn parse_selector(selector: &str) -> Result<Selector<'_>> {
    let invalid = |reason| RippleError::InvalidSelector {
        selector: selector.to_string(),
        reason,
    };

    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(invalid("selector is empty"));
    }

    let (parsed, name) = if let Some(id) = trimmed.strip_prefix('#') {
        (Selector::Id(id), id)
    } else if let Some(class) = trimmed.strip_prefix('.') {
        (Selector::Class(class), class)
    } else {
        (Selector::Tag(trimmed), trimmed)
    };

    if !is_name(name) {
        return Err(invalid("only `#id`, `.class` and tag selectors are supported"));
    }
    Ok(parsed)
}

/// An output document rooted at a `<body>` element.
#[derive(Clone, Debug)]
pub struct Document {
    body: HostNode,
}

impl Document {
    pub fn new() -> Self {
        Self {
            body: HostNode::element("body"),
        }
    }

    pub fn body(&self) -> &HostNode {
        &self.body
    }

    pub fn create_element(&self, tag: &str) -> HostNode {
        HostNode::element(tag)
    }

    pub fn create_text_node(&self, data: &str) -> HostNode {
        HostNode::text(data)
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<HostNode> {
        self.body.find(&Selector::Id(id))
    }

    /// Find the first element matching `#id`, `.class` or a tag name.
    pub fn query_selector(&self, selector: &str) -> Result<Option<HostNode>> {
        let parsed = parse_selector(selector)?;
        Ok(self.body.find(&parsed))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn insert_before_orders_children() {
        let parent = HostNode::element("ul");
        let a = HostNode::element("li");
        let b = HostNode::element("li");
        let c = HostNode::element("li");

        parent.append_child(&a);
        parent.append_child(&c);
        parent.insert_before(&b, Some(&c));

        let children = parent.children();
        assert!(children[0].ptr_eq(&a));
        assert!(children[1].ptr_eq(&b));
        assert!(children[2].ptr_eq(&c));
        assert!(a.next_sibling().is_some_and(|n| n.ptr_eq(&b)));
        assert!(c.next_sibling().is_none());
        assert!(b.parent().is_some_and(|p| p.ptr_eq(&parent)));
    }

    #[test]
    fn inserting_attached_node_moves_it() {
        let first = HostNode::element("div");
        let second = HostNode::element("div");
        let child = HostNode::text("x");

        first.append_child(&child);
        second.append_child(&child);

        assert_eq!(first.child_count(), 0);
        assert_eq!(second.child_count(), 1);
        assert!(child.parent().is_some_and(|p| p.ptr_eq(&second)));

        child.remove();
        assert!(child.parent().is_none());
        assert_eq!(second.child_count(), 0);
    }

    #[test]
    fn html_serialization_escapes_and_skips_void_children() {
        let div = HostNode::element("div");
        div.set_attribute("title", "a \"quote\"");
        div.set_style("color", "red");
        div.append_child(&HostNode::text("1 < 2"));
        div.append_child(&HostNode::element("br"));
        div.append_child(&HostNode::comment(""));

        assert_eq!(
            div.to_html(),
            "<div title=\"a &quot;quote&quot;\" style=\"color: red\">1 &lt; 2<br><!----></div>"
        );
        assert_eq!(div.text_content(), "1 < 2");
    }

    #[test]
    fn style_text_replaces_declarations() {
        let el = HostNode::element("p");
        el.set_style("margin", "0");
        el.set_style_text("color: red; font-size : 12px;;");

        assert_eq!(el.style("margin"), None);
        assert_eq!(el.style("color").as_deref(), Some("red"));
        assert_eq!(el.style("font-size").as_deref(), Some("12px"));
    }

    #[test]
    fn dispatch_calls_bound_listener() {
        let el = HostNode::element("button");
        let clicks = Arc::new(AtomicI32::new(0));
        let clicks_clone = clicks.clone();
        el.add_event_listener(
            "click",
            Callback::new(move |_| {
                clicks_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(el.dispatch("click", &Value::Null));
        assert!(!el.dispatch("keydown", &Value::Null));
        assert_eq!(clicks.load(Ordering::SeqCst), 1);

        el.remove_event_listener("click");
        assert!(!el.dispatch("click", &Value::Null));
    }

    #[test]
    fn query_selector_supports_id_class_and_tag() {
        let doc = Document::new();
        let app = doc.create_element("section");
        app.set_attribute("id", "app");
        app.set_attribute("class", "main wide");
        doc.body().append_child(&app);

        assert!(doc.query_selector("#app").unwrap().is_some_and(|n| n.ptr_eq(&app)));
        assert!(doc.query_selector(".wide").unwrap().is_some());
        assert!(doc.query_selector("section").unwrap().is_some());
        assert!(doc.query_selector("#missing").unwrap().is_none());
        assert!(doc.get_element_by_id("app").is_some());

        assert!(matches!(
            doc.query_selector("div > p"),
            Err(RippleError::InvalidSelector { .. })
        ));
        assert!(matches!(doc.query_selector("  "), Err(RippleError::InvalidSelector { .. })));
    }

    #[test]
    fn snapshot_serializes_to_tagged_json() {
        let el = HostNode::element("span");
        el.set_attribute("id", "x");
        el.append_child(&HostNode::text("hi"));

        let json = el.to_json().unwrap();
        assert!(json.contains("\"type\":\"element\""));
        assert!(json.contains("\"tag\":\"span\""));
        assert!(json.contains("{\"type\":\"text\",\"data\":\"hi\"}"));
    }
}
