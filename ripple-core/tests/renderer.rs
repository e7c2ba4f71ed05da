//! Integration Tests for the Renderer
//!
//! These tests mount components into host documents and check the output,
//! host node identity across updates, and lifecycle ordering.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use ripple_core::reactive::{new_ref, reactive, Callback, RawObject, Value};
use ripple_core::render::{
    create_app, current_instance, h, on_mounted, on_unmounted, on_updated, render, use_state, Child, Component,
    ComponentInstance, Document, HostNode, Props, StateSetter, VNode,
};
use ripple_core::scheduler::flush_microtasks;
use ripple_core::RippleError;

fn empty() -> Vec<Child> {
    Vec::new()
}

fn item(key: &str) -> VNode {
    h("li", Props::new().with("key", key), [key])
}

/// Counter scenario: a ref read by a component drives a text node that is
/// patched in place.
#[test]
fn counter_text_is_patched_in_place() {
    let count = new_ref(0_i32);
    let count_clone = count.clone();
    let counter = Component::new("Counter", move |_, _| {
        Some(h("p", Props::new(), [count_clone.get().to_string()]))
    });

    let root = HostNode::element("div");
    create_app(counter).mount(&root).unwrap();

    let p = root.first_child().unwrap();
    let text = p.first_child().unwrap();
    assert_eq!(text.node_value(), "0");

    count.set(1);
    flush_microtasks();

    let text_after = root.first_child().unwrap().first_child().unwrap();
    assert_eq!(text_after.node_value(), "1");
    assert!(text_after.ptr_eq(&text));
    assert!(root.first_child().unwrap().ptr_eq(&p));
}

/// Reordering keyed children keeps each surviving host node.
#[test]
fn keyed_list_reorder_preserves_identity() {
    let order = new_ref(vec!["a", "b", "c"]);
    let order_clone = order.clone();
    let list = Component::new("List", move |_, _| {
        let items: Vec<VNode> = order_clone.get().into_iter().map(item).collect();
        Some(h("ul", Props::new(), items))
    });

    let root = HostNode::element("div");
    create_app(list).mount(&root).unwrap();
    let ul = root.first_child().unwrap();
    let before = ul.children();

    order.set(vec!["c", "a", "b"]);

    let after = ul.children();
    assert_eq!(ul.text_content(), "cab");
    assert!(after[0].ptr_eq(&before[2]));
    assert!(after[1].ptr_eq(&before[0]));
    assert!(after[2].ptr_eq(&before[1]));
}

/// Unkeyed children are matched by position only.
#[test]
fn unkeyed_list_patches_positionally() {
    let labels = new_ref(vec!["x", "y", "z"]);
    let labels_clone = labels.clone();
    let list = Component::new("Plain", move |_, _| {
        let items: Vec<VNode> = labels_clone
            .get()
            .into_iter()
            .map(|label| h("li", Props::new(), [label]))
            .collect();
        Some(h("ul", Props::new(), items))
    });

    let root = HostNode::element("div");
    create_app(list).mount(&root).unwrap();
    let ul = root.first_child().unwrap();
    let before = ul.children();

    // Dropping the first label keeps the first two nodes and retexts them.
    labels.set(vec!["y", "z"]);
    let after = ul.children();
    assert_eq!(after.len(), 2);
    assert!(after[0].ptr_eq(&before[0]));
    assert!(after[1].ptr_eq(&before[1]));
    assert_eq!(ul.text_content(), "yz");

    labels.set(vec!["y", "z", "w", "v"]);
    assert_eq!(ul.child_count(), 4);
    assert!(ul.children()[0].ptr_eq(&before[0]));
}

/// Unmount callbacks see the subtree still mounted and the effect alive.
#[test]
fn unmount_callbacks_run_before_subtree_teardown() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let count = new_ref(0_i32);

    let log_child = log.clone();
    let child = Component::new("Child", move |_, _| {
        let log = log_child.clone();
        on_unmounted(move || log.lock().push("child unmounted".to_string()));
        Some(h("span", Props::new(), ["child"]))
    });

    let log_parent = log.clone();
    let parent_out: Arc<Mutex<Option<HostNode>>> = Arc::new(Mutex::new(None));
    let parent_instance: Arc<Mutex<Option<ComponentInstance>>> = Arc::new(Mutex::new(None));
    let (out_clone, instance_clone, count_clone) = (parent_out.clone(), parent_instance.clone(), count.clone());
    let parent = Component::new("Parent", move |_, _| {
        *instance_clone.lock() = current_instance();
        let n = count_clone.get();

        let (log, out, instance, count) =
            (log_parent.clone(), out_clone.clone(), instance_clone.clone(), count_clone.clone());
        on_unmounted(move || {
            let attached = out.lock().as_ref().is_some_and(|el| el.parent().is_some());
            let renders = instance.lock().take().map_or(0, |i| i.render_count());
            log.lock().push(format!(
                "parent unmounted: attached={attached} renders={renders} subscribers={}",
                count.subscriber_count()
            ));
        });
        Some(h(
            "section",
            Props::new(),
            vec![h("b", Props::new(), [n]), VNode::component(&child, Props::new(), empty())],
        ))
    });

    let root = HostNode::element("div");
    let app = create_app(parent);
    app.mount(&root).unwrap();
    *parent_out.lock() = root.first_child();
    count.set(1);

    app.unmount();
    assert_eq!(
        *log.lock(),
        vec![
            "parent unmounted: attached=true renders=2 subscribers=1".to_string(),
            "child unmounted".to_string(),
        ]
    );
    assert_eq!(root.child_count(), 0);
    assert_eq!(count.subscriber_count(), 0);
}

/// A ref read by both a parent and the child it passes it to renders the
/// child once per write.
#[test]
fn shared_dependency_renders_child_once() {
    let count = new_ref(0_i32);
    let child_renders = Arc::new(AtomicI32::new(0));
    let updated = Arc::new(AtomicI32::new(0));

    let (count_child, renders_clone, updated_clone) = (count.clone(), child_renders.clone(), updated.clone());
    let child = Component::new("Child", move |props, _| {
        renders_clone.fetch_add(1, Ordering::SeqCst);
        let updated = updated_clone.clone();
        on_updated(move || {
            updated.fetch_add(1, Ordering::SeqCst);
        });
        let from_parent = props.get("n").map(Value::display_string).unwrap_or_default();
        Some(h("span", Props::new(), [format!("{from_parent}/{}", count_child.get())]))
    });

    let count_parent = count.clone();
    let parent = Component::new("Parent", move |_, _| {
        Some(VNode::component(
            &child,
            Props::new().with("n", count_parent.get()),
            empty(),
        ))
    });

    let root = HostNode::element("div");
    create_app(parent).mount(&root).unwrap();
    flush_microtasks();
    assert_eq!(child_renders.load(Ordering::SeqCst), 1);

    count.set(1);
    flush_microtasks();
    assert_eq!(child_renders.load(Ordering::SeqCst), 2);
    assert_eq!(updated.load(Ordering::SeqCst), 1);
    assert_eq!(root.text_content(), "1/1");
}

/// After unmount, the component no longer reacts.
#[test]
fn unmounted_component_stops_rendering() {
    let count = new_ref(0_i32);
    let renders = Arc::new(AtomicI32::new(0));

    let (count_clone, renders_clone) = (count.clone(), renders.clone());
    let view = Component::new("View", move |_, _| {
        renders_clone.fetch_add(1, Ordering::SeqCst);
        Some(VNode::text(count_clone.get().to_string()))
    });

    let root = HostNode::element("div");
    let app = create_app(view);
    app.mount(&root).unwrap();
    app.unmount();

    count.set(1);
    assert_eq!(renders.load(Ordering::SeqCst), 1);
    assert_eq!(count.subscriber_count(), 0);
}

/// Mounted callbacks wait for the microtask checkpoint and see attached
/// output; updated callbacks follow each re-render.
#[test]
fn lifecycle_callbacks_are_deferred() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let count = new_ref(0_i32);

    let (log_clone, count_clone) = (log.clone(), count.clone());
    let view = Component::new("Deferred", move |_, _| {
        let (mounted_log, updated_log) = (log_clone.clone(), log_clone.clone());
        on_mounted(move || mounted_log.lock().push("mounted".to_string()));
        on_updated(move || updated_log.lock().push("updated".to_string()));
        Some(VNode::text(count_clone.get().to_string()))
    });

    let root = HostNode::element("div");
    create_app(view).mount(&root).unwrap();
    assert!(log.lock().is_empty());

    flush_microtasks();
    assert_eq!(*log.lock(), vec!["mounted"]);

    count.set(1);
    count.set(2);
    flush_microtasks();
    assert_eq!(*log.lock(), vec!["mounted", "updated", "updated"]);
}

/// One panicking lifecycle callback does not affect its siblings or the
/// commit.
#[test]
fn lifecycle_panics_are_isolated() {
    let ran = Arc::new(AtomicI32::new(0));
    let ran_clone = ran.clone();
    let view = Component::new("Faulty", move |_, _| {
        on_mounted(|| panic!("mount callback failed"));
        let ran = ran_clone.clone();
        on_mounted(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        });
        Some(h("div", Props::new(), ["ok"]))
    });

    let root = HostNode::element("div");
    create_app(view).mount(&root).unwrap();
    flush_microtasks();

    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(root.text_content(), "ok");
}

/// A panicking render propagates to whoever triggered it.
#[test]
fn render_panics_propagate_to_the_writer() {
    let fail = new_ref(false);
    let fail_clone = fail.clone();
    let view = Component::new("Fragile", move |_, _| {
        if fail_clone.get() {
            panic!("render failed");
        }
        Some(VNode::text("fine"))
    });

    let root = HostNode::element("div");
    create_app(view).mount(&root).unwrap();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| fail.set(true)));
    assert!(result.is_err());
    assert_eq!(root.text_content(), "fine");
}

/// Mounting by selector, idempotence and missing targets.
#[test]
fn app_mount_contract() {
    let doc = Document::new();
    let target = doc.create_element("main");
    target.set_attribute("id", "app");
    doc.body().append_child(&target);

    let hello = Component::new("Hello", |_, _| Some(h("h1", Props::new(), ["hi"])));

    let app = create_app(hello.clone());
    app.mount((&doc, "#app")).unwrap();
    app.mount((&doc, "#app")).unwrap();
    assert_eq!(target.to_html(), "<main id=\"app\"><h1>hi</h1></main>");

    let other = create_app(hello);
    let err = other.mount((&doc, "#missing")).unwrap_err();
    assert!(matches!(err, RippleError::MountTargetNotFound { .. }));
}

/// Event props bind listeners that can drive state.
#[test]
fn events_update_state() {
    let setter: Arc<Mutex<Option<StateSetter<i32>>>> = Arc::new(Mutex::new(None));
    let setter_clone = setter.clone();

    let button = Component::new("Clicker", move |_, _| {
        let (clicks, set_clicks) = use_state(0);
        *setter_clone.lock() = Some(set_clicks.clone());
        let on_click = Callback::new(move |_| set_clicks.update(|n| n + 1));
        Some(h(
            "button",
            Props::new().with("onClick", on_click),
            [format!("clicked {clicks}")],
        ))
    });

    let root = HostNode::element("div");
    create_app(button).mount(&root).unwrap();
    let el = root.first_child().unwrap();

    assert!(el.dispatch("click", &Value::Null));
    assert!(el.dispatch("click", &Value::Null));
    assert_eq!(el.text_content(), "clicked 2");
    assert!(setter.lock().is_some());
}

/// Styles given as reactive objects are applied from their raw form.
#[test]
fn style_objects_are_diffed() {
    let style = reactive(&RawObject::new().with("color", "red").with("fontWeight", "bold")).unwrap();
    let bold = new_ref(true);

    let (style_clone, bold_clone) = (style.clone(), bold.clone());
    let view = Component::new("Styled", move |_, _| {
        let style = if bold_clone.get() {
            Value::from(style_clone.clone())
        } else {
            Value::from(RawObject::new().with("color", "red"))
        };
        Some(h("p", Props::new().with("style", style), ["styled"]))
    });

    let root = HostNode::element("div");
    create_app(view).mount(&root).unwrap();
    let p = root.first_child().unwrap();
    assert_eq!(p.style("font-weight").as_deref(), Some("bold"));

    bold.set(false);
    assert_eq!(p.style("font-weight"), None);
    assert_eq!(p.style("color").as_deref(), Some("red"));
}

/// Fragments render without a wrapper and keep their siblings in order.
#[test]
fn fragment_component_between_siblings() {
    let show_extra = new_ref(false);
    let show_clone = show_extra.clone();
    let pair = Component::new("Pair", move |_, _| {
        let mut children = vec![h("b", Props::new(), ["1"]), h("b", Props::new(), ["2"])];
        if show_clone.get() {
            children.push(h("b", Props::new(), ["3"]));
        }
        Some(VNode::fragment(children))
    });

    let root = HostNode::element("div");
    render(
        Some(&h(
            "div",
            Props::new(),
            vec![
                h("i", Props::new(), ["start"]),
                VNode::component(&pair, Props::new(), empty()),
                h("i", Props::new(), ["end"]),
            ],
        )),
        &root,
    );
    let outer = root.first_child().unwrap();
    assert_eq!(outer.text_content(), "start12end");

    show_extra.set(true);
    assert_eq!(outer.text_content(), "start123end");
    assert_eq!(
        outer.to_html(),
        "<div><i>start</i><b>1</b><b>2</b><b>3</b><!----><i>end</i></div>"
    );
}

/// Props flow from parent state into children; unchanged props skip the
/// child render.
#[test]
fn parent_props_drive_child_renders() {
    let child_renders = Arc::new(AtomicI32::new(0));
    let renders_clone = child_renders.clone();
    let label = Component::new("Label", move |props, _| {
        renders_clone.fetch_add(1, Ordering::SeqCst);
        let text = props.get("text").map(Value::display_string).unwrap_or_default();
        Some(h("span", Props::new(), [text]))
    });

    let text = new_ref("one".to_string());
    let unrelated = new_ref(0);
    let (text_clone, unrelated_clone) = (text.clone(), unrelated.clone());
    let parent = Component::new("Parent", move |_, _| {
        let _ = unrelated_clone.get();
        Some(VNode::component(
            &label,
            Props::new().with("text", text_clone.get()),
            empty(),
        ))
    });

    let root = HostNode::element("div");
    create_app(parent).mount(&root).unwrap();
    assert_eq!(child_renders.load(Ordering::SeqCst), 1);

    unrelated.set(1);
    assert_eq!(child_renders.load(Ordering::SeqCst), 1);

    text.set("two".to_string());
    assert_eq!(child_renders.load(Ordering::SeqCst), 2);
    assert_eq!(root.text_content(), "two");
}
