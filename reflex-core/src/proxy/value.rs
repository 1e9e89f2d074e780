//! Dynamic values stored in and read from targets.
//!
//! Targets hold arbitrary data, so everything flowing through the
//! instrumentation layer is a [`Value`]. Primitive variants compare by
//! content; [`Value::Object`] and [`Value::Reactive`] compare by identity.
//!
//! # Equality
//!
//! Three notions of equality are in play:
//!
//! - `PartialEq` is SameValueZero: `NaN == NaN` and `+0 == -0`. This is what
//!   set and map membership use, so `Value` is `Eq + Hash`.
//! - [`Value::same_value`] additionally distinguishes `+0` from `-0`. Writes
//!   use it to decide whether anything changed.
//! - [`Value::strict_equals`] never matches `NaN`, which is what index
//!   searches use.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use super::object::{BoxSlot, Object, ObjectData};
use super::wrapper::Reactive;

/// A value that can live inside a target.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    /// A raw, unwrapped target.
    Object(Object),
    /// A wrapper around a target.
    Reactive(Reactive),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// True for raw objects and wrappers alike.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
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

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    /// The raw object behind this value, whether it is wrapped or not.
    pub fn raw_object(&self) -> Option<Object> {
        match self {
            Value::Object(o) => Some(o.clone()),
            Value::Reactive(r) => Some(r.raw()),
            _ => None,
        }
    }

    /// Strip a wrapper, leaving every other value untouched.
    pub fn to_raw(&self) -> Value {
        match self {
            Value::Reactive(r) => Value::Object(r.raw()),
            other => other.clone(),
        }
    }

    /// Identity comparison used for change detection.
    ///
    /// Like `==` except that `+0` and `-0` differ.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b && a.is_sign_negative() == b.is_sign_negative()
                }
            }
            _ => self == other,
        }
    }

    /// Strict equality: like `==` but `NaN` never matches.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// Build a value from JSON. Objects become records and arrays become
    /// sequences; nested containers are separate targets.
    pub fn from_json(json: serde_json::Value) -> Value {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => {
                Value::Object(Object::sequence(items.into_iter().map(Value::from_json)))
            }
            Json::Object(fields) => Value::Object(Object::record(
                fields.into_iter().map(|(k, v)| (k, Value::from_json(v))),
            )),
        }
    }

    /// Snapshot this value as JSON without tracking anything.
    ///
    /// Sets become arrays, maps with string keys become objects and other
    /// maps become arrays of `[key, value]` pairs. Cycles and non-finite
    /// numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_inner(&mut HashSet::new())
    }

    fn to_json_inner(&self, seen: &mut HashSet<usize>) -> serde_json::Value {
        use serde_json::Value as Json;

        let object = match self {
            Value::Undefined | Value::Null => return Json::Null,
            Value::Bool(b) => return Json::Bool(*b),
            Value::Number(n) => {
                return serde_json::Number::from_f64(*n)
                    .map(Json::Number)
                    .unwrap_or(Json::Null)
            }
            Value::Str(s) => return Json::String(s.to_string()),
            Value::Object(o) => o.clone(),
            Value::Reactive(r) => r.raw(),
        };

        if !seen.insert(object.addr()) {
            return Json::Null;
        }

        let json = match &*object.data() {
            ObjectData::Record(record) => Json::Object(
                record
                    .props
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json_inner(seen)))
                    .collect(),
            ),
            ObjectData::Sequence(items) => {
                Json::Array(items.iter().map(|v| v.to_json_inner(seen)).collect())
            }
            ObjectData::Set(items) => {
                Json::Array(items.iter().map(|v| v.to_json_inner(seen)).collect())
            }
            ObjectData::Map(entries) => map_to_json(entries, seen),
            ObjectData::Boxed(BoxSlot::Owned(inner)) => inner.to_json_inner(seen),
            ObjectData::Boxed(BoxSlot::Linked { source, key }) => source
                .raw()
                .own_property(key)
                .unwrap_or_default()
                .to_json_inner(seen),
        };

        seen.remove(&object.addr());
        json
    }
}

fn map_to_json(entries: &IndexMap<Value, Value>, seen: &mut HashSet<usize>) -> serde_json::Value {
    use serde_json::Value as Json;

    if entries.keys().all(|k| matches!(k, Value::Str(_))) {
        Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.as_str().unwrap_or_default().to_string(), v.to_json_inner(seen)))
                .collect(),
        )
    } else {
        Json::Array(
            entries
                .iter()
                .map(|(k, v)| Json::Array(vec![k.to_json_inner(seen), v.to_json_inner(seen)]))
                .collect(),
        )
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => {
                let bits = if n.is_nan() {
                    f64::NAN.to_bits()
                } else if *n == 0.0 {
                    0
                } else {
                    n.to_bits()
                };
                bits.hash(state);
            }
            Value::Str(s) => s.hash(state),
            Value::Object(o) => o.addr().hash(state),
            Value::Reactive(r) => r.addr().hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Object(o) => write!(f, "{:?}", o),
            Value::Reactive(r) => write!(f, "{:?}", r),
        }
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

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Reactive> for Value {
    fn from(r: Reactive) -> Self {
        Value::Reactive(r)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

/// Helper for set containers: membership is SameValueZero on raw forms.
pub(crate) fn raw_set(items: impl IntoIterator<Item = Value>) -> IndexSet<Value> {
    items.into_iter().map(|v| v.to_raw()).collect()
}
