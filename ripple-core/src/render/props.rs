//! Prop setter: applies one vnode prop to a host element.
//!
//! | prop                         | effect on the element                    |
//! |------------------------------|------------------------------------------|
//! | `onClick`, `onInput`, ...    | binds the listener for `click`, `input`  |
//! | `style` (string)             | replaces all declarations                |
//! | `style` (object)             | sets each entry, drops keys now absent   |
//! | `true`                       | presence attribute (`""`)                |
//! | `false`, `Null`, removed     | attribute cleared                        |
//! | anything else                | attribute set to its string form         |
//!
//! `key` is never rendered. `className` and `htmlFor` map to `class` and
//! `for`. Inside SVG, camelCase names become kebab-case except those SVG
//! itself spells in camelCase.

use super::host::{HostNode, Namespace};
use super::vnode::Props;
use crate::reactive::{same_value, Value};

// SVG attributes whose canonical spelling is camelCase.
const SVG_CAMEL_CASE: &[&str] = &[
    "viewBox",
    "preserveAspectRatio",
    "gradientTransform",
    "gradientUnits",
    "patternTransform",
    "patternUnits",
    "patternContentUnits",
    "clipPathUnits",
    "markerWidth",
    "markerHeight",
    "markerUnits",
    "refX",
    "refY",
    "pathLength",
    "textLength",
    "lengthAdjust",
    "spreadMethod",
    "stdDeviation",
    "baseFrequency",
    "numOctaves",
    "kernelMatrix",
    "tableValues",
    "filterUnits",
    "primitiveUnits",
    "maskUnits",
    "maskContentUnits",
];

/// `onClick` and friends. The third character must be uppercase so that
/// attributes like `one` or `online` stay attributes.
pub fn is_event_prop(key: &str) -> bool {
    key.len() > 2 && key.starts_with("on") && key.as_bytes()[2].is_ascii_uppercase()
}

fn event_name(key: &str) -> String {
    key[2..].to_ascii_lowercase()
}

/// `fontSize` -> `font-size`.
pub fn hyphenate(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn attribute_name(key: &str, namespace: Option<Namespace>) -> String {
    match key {
        "className" => "class".to_string(),
        "htmlFor" => "for".to_string(),
        _ if namespace == Some(Namespace::Svg) && !SVG_CAMEL_CASE.contains(&key) => hyphenate(key),
        _ => key.to_string(),
    }
}

fn style_property(key: &str) -> String {
    if key.starts_with("--") {
        key.to_string()
    } else {
        hyphenate(key)
    }
}

fn style_entries(value: &Value) -> Vec<(String, Value)> {
    // Raw access: applying a style must not subscribe the render effect.
    value
        .as_raw_object()
        .map(|obj| {
            obj.entries()
                .into_iter()
                .map(|(k, v)| (style_property(&k), v))
                .collect()
        })
        .unwrap_or_default()
}

fn patch_style(el: &HostNode, prev: Option<&Value>, next: Option<&Value>) {
    match next {
        Some(Value::Str(css)) => el.set_style_text(css),
        Some(next) if next.is_object() => {
            let entries = style_entries(next);
            match prev {
                Some(prev) if prev.is_object() => {
                    for (name, _) in style_entries(prev) {
                        if !entries.iter().any(|(n, _)| *n == name) {
                            el.remove_style(&name);
                        }
                    }
                }
                Some(_) => el.clear_style(),
                None => {}
            }
            for (name, value) in entries {
                if value.is_null() {
                    el.remove_style(&name);
                } else {
                    el.set_style(&name, &value.display_string());
                }
            }
        }
        _ => el.clear_style(),
    }
}

/// Apply the change of one prop from `prev` to `next`. `None` means absent.
pub fn patch_prop(el: &HostNode, key: &str, prev: Option<&Value>, next: Option<&Value>) {
    if key == "key" {
        return;
    }

    if is_event_prop(key) {
        let event = event_name(key);
        match next.and_then(Value::as_callback) {
            Some(listener) => el.add_event_listener(&event, listener.clone()),
            None => el.remove_event_listener(&event),
        }
        return;
    }

    if key == "style" {
        patch_style(el, prev, next);
        return;
    }

    let name = attribute_name(key, el.namespace());
    match next {
        None | Some(Value::Null) | Some(Value::Bool(false)) => el.remove_attribute(&name),
        Some(Value::Bool(true)) => el.set_attribute(&name, ""),
        Some(value) => el.set_attribute(&name, &value.display_string()),
    }
}

/// Apply every prop that differs between `old` and `new`.
pub fn patch_props(el: &HostNode, old: &Props, new: &Props) {
    for (key, next) in new.iter() {
        let prev = old.get(key);
        if prev.map_or(true, |prev| !same_value(prev, next)) {
            patch_prop(el, key, prev, Some(next));
        }
    }
    for (key, prev) in old.iter() {
        if !new.contains_key(key) {
            patch_prop(el, key, Some(prev), None);
        }
    }
}
