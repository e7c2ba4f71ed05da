//! Dynamic values stored in observed objects and passed as props.

use std::fmt;
use std::sync::Arc;

use super::proxy::{RawObject, Reactive};

/// A shareable callback, used for event handlers.
///
/// Compared by identity: two callbacks are the same only if they are clones
/// of one another.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(&Value) + Send + Sync>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, arg: &Value) {
        (self.0)(arg)
    }

    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Arc::as_ptr(&self.0))
    }
}

/// A dynamically typed value.
///
/// `Object` holds a plain container; `Reactive` holds the observed view of
/// one. Writes through a reactive object always store the raw form.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    Object(RawObject),
    Reactive(Reactive),
    Callback(Callback),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for plain and reactive objects.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Value::Callback(cb) => Some(cb),
            _ => None,
        }
    }

    /// The raw object behind either object variant.
    pub fn as_raw_object(&self) -> Option<RawObject> {
        match self {
            Value::Object(obj) => Some(obj.clone()),
            Value::Reactive(r) => Some(r.to_raw()),
            _ => None,
        }
    }

    /// Strip reactivity: a reactive object becomes its raw target.
    pub fn to_raw(&self) -> Value {
        match self {
            Value::Reactive(r) => Value::Object(r.to_raw()),
            other => other.clone(),
        }
    }

    /// Wrap a plain object in its (cached) reactive view.
    ///
    /// Objects marked raw and non-object values come back unchanged.
    pub fn to_reactive(&self) -> Value {
        match self {
            Value::Object(obj) => match super::proxy::reactive(obj) {
                Some(proxy) => Value::Reactive(proxy),
                None => self.clone(),
            },
            other => other.clone(),
        }
    }

    /// `Object.is` comparison on raw forms.
    pub fn same_value(&self, other: &Value) -> bool {
        same_value(self, other)
    }

    /// String form used for text content and attribute values.
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Object(_) | Value::Reactive(_) => "[object Object]".to_string(),
            Value::Callback(_) => "[function]".to_string(),
        }
    }
}

/// Render a number the way script engines print them: integral values
/// without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// `Object.is` for floats: NaN equals itself, `+0` and `-0` differ.
pub fn same_f64(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    a == b && a.is_sign_negative() == b.is_sign_negative()
}

/// `Object.is` over values, after unwrapping reactivity on both sides.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a.to_raw(), b.to_raw()) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => same_f64(x, y),
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(&y),
        (Value::Callback(x), Value::Callback(y)) => x.ptr_eq(&y),
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        same_value(self, other)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32);

impl From<RawObject> for Value {
    fn from(obj: RawObject) -> Self {
        Value::Object(obj)
    }
}

impl From<Reactive> for Value {
    fn from(r: Reactive) -> Self {
        Value::Reactive(r)
    }
}

impl From<Callback> for Value {
    fn from(cb: Callback) -> Self {
        Value::Callback(cb)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
