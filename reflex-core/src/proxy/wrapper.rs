//! Reactive wrappers.
//!
//! A [`Reactive`] intercepts reads and writes of a raw [`Object`]: reads
//! subscribe the running computation to the key they touch, writes notify
//! the key's subscribers. At most one wrapper exists per (object, options)
//! pair while anything holds it, so wrapping twice yields the same handle.
//!
//! This file holds the record interception and the kind-dispatching entry
//! points. Sequence, set/map and box operations live in their own modules.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::boxed::as_box;
use super::object::{Object, ObjectData, TargetKind};
use super::value::Value;
use crate::error::{ReactiveError, Result};
use crate::reactive::{ChangeKind, Key, Runtime, Trigger};

/// Reading this key returns the raw object behind a wrapper.
pub const RAW_KEY: &str = "__raw";

/// Name of a sequence's length property.
pub const LENGTH: &str = "length";

pub(crate) const SIZE: &str = "size";
pub(crate) const VALUE: &str = "value";

/// How a wrapper intercepts its target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapOptions {
    /// Only top-level keys are reactive; nested objects come back raw.
    pub shallow: bool,
    /// Writes are refused and reads are not tracked.
    pub readonly: bool,
}

impl WrapOptions {
    pub fn shallow() -> Self {
        Self {
            shallow: true,
            readonly: false,
        }
    }

    pub fn readonly() -> Self {
        Self {
            shallow: false,
            readonly: true,
        }
    }

    pub fn shallow_readonly() -> Self {
        Self {
            shallow: true,
            readonly: true,
        }
    }
}

pub struct WrapperInner {
    raw: Object,
    options: WrapOptions,
}

/// A wrapper around a raw object. Cloning yields the same wrapper.
#[derive(Clone)]
pub struct Reactive(Rc<WrapperInner>);

impl Reactive {
    pub(crate) fn from_inner(inner: Rc<WrapperInner>) -> Self {
        Self(inner)
    }

    /// The raw object behind this wrapper.
    pub fn raw(&self) -> Object {
        self.0.raw.clone()
    }

    pub(crate) fn target(&self) -> &Object {
        &self.0.raw
    }

    pub fn kind(&self) -> TargetKind {
        self.0.raw.kind()
    }

    pub fn options(&self) -> WrapOptions {
        self.0.options
    }

    pub fn is_readonly(&self) -> bool {
        self.0.options.readonly
    }

    pub fn is_shallow(&self) -> bool {
        self.0.options.shallow
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn track(&self, key: Key) {
        if !self.is_readonly() {
            Runtime::track(&self.0.raw, key);
        }
    }

    pub(crate) fn notify(&self, key: Key, change: ChangeKind) {
        Runtime::notify(self.0.raw.id(), self.kind(), key, change, None);
    }

    pub(crate) fn notify_all(&self, triggers: &[Trigger]) {
        if !triggers.is_empty() {
            Runtime::notify_all(self.0.raw.id(), self.kind(), triggers);
        }
    }

    pub(crate) fn ensure_writable(&self, key: impl fmt::Display) -> Result<()> {
        if self.is_readonly() {
            Err(ReactiveError::readonly(key.to_string()))
        } else {
            Ok(())
        }
    }

    pub(crate) fn unsupported(&self, operation: &'static str) -> ReactiveError {
        ReactiveError::unsupported(operation, self.kind())
    }

    /// The form a written value is stored in.
    pub(crate) fn store_form(&self, value: Value) -> Value {
        if self.is_shallow() {
            value
        } else {
            value.to_raw()
        }
    }

    /// The view of a child value handed out by this wrapper.
    ///
    /// Deep wrappers wrap nested objects; readonly propagates downward.
    pub(crate) fn adopt(&self, value: Value) -> Value {
        if self.is_shallow() {
            return value;
        }
        let child = WrapOptions {
            shallow: false,
            readonly: self.is_readonly(),
        };
        match value {
            Value::Object(object) => Value::Reactive(object.wrap(child)),
            Value::Reactive(wrapper) if child.readonly && !wrapper.is_readonly() => {
                Value::Reactive(wrapper.raw().wrap(child))
            }
            other => other,
        }
    }

    /// Read a property.
    ///
    /// Records resolve own keys, then the prototype chain. Sequences accept
    /// indices and `length`, sets and maps answer `size` and boxes `value`.
    /// Anything else reads as `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        if key == RAW_KEY {
            return Value::Object(self.raw());
        }
        match self.kind() {
            TargetKind::Record => self.record_get(key),
            TargetKind::Sequence if key == LENGTH => Value::from(self.len()),
            TargetKind::Sequence => key
                .parse::<usize>()
                .map(|index| self.at(index))
                .unwrap_or_default(),
            TargetKind::Set | TargetKind::Map if key == SIZE => Value::from(self.size()),
            TargetKind::Boxed if key == VALUE => self.value(),
            _ => Value::Undefined,
        }
    }

    /// Write a property. Returns whether anything changed.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        match self.kind() {
            TargetKind::Record => self.record_set(key, value),
            TargetKind::Sequence if key == LENGTH => self.set_len(length_from(&value)?),
            TargetKind::Sequence => match key.parse::<usize>() {
                Ok(index) => self.set_at(index, value),
                Err(_) => Err(self.unsupported("set")),
            },
            TargetKind::Boxed if key == VALUE => self.set_value(value),
            _ => Err(self.unsupported("set")),
        }
    }

    /// Key existence: record keys (prototype included), sequence indices,
    /// set elements or map keys.
    pub fn has(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        match self.kind() {
            TargetKind::Record => {
                let Some(name) = prop_name(&key) else {
                    return false;
                };
                self.track(Key::Prop(name.clone()));
                let (own, proto) = own_and_proto(&self.0.raw, &name);
                own.is_some() || inherited_has(proto, &name)
            }
            TargetKind::Sequence => {
                let Some(index) = index_from(&key) else {
                    return false;
                };
                self.track(Key::Index(index));
                index < self.0.raw.len()
            }
            TargetKind::Set => self.set_has(&key),
            TargetKind::Map => self.map_has(&key),
            TargetKind::Boxed => false,
        }
    }

    /// Remove a record key, clear a sequence slot, or remove a set element
    /// or map entry. Returns whether anything was removed.
    pub fn delete(&self, key: impl Into<Value>) -> Result<bool> {
        let key = key.into();
        match self.kind() {
            TargetKind::Record => match prop_name(&key) {
                Some(name) => self.record_delete(&name),
                None => Ok(false),
            },
            TargetKind::Sequence => match index_from(&key) {
                Some(index) => self.delete_at(index),
                None => Ok(false),
            },
            TargetKind::Set => self.set_delete(&key),
            TargetKind::Map => self.map_delete(&key),
            TargetKind::Boxed => Err(self.unsupported("delete")),
        }
    }

    /// Own keys of a record, or the indices of a sequence.
    ///
    /// Tracks enumeration, so adding or removing a key re-runs the caller
    /// but updating an existing one does not.
    pub fn keys(&self) -> Vec<Rc<str>> {
        match self.kind() {
            TargetKind::Record => {
                self.track(Key::Iterate);
                match &*self.0.raw.data() {
                    ObjectData::Record(record) => record.props.keys().cloned().collect(),
                    _ => Vec::new(),
                }
            }
            TargetKind::Sequence => {
                self.track(Key::length());
                (0..self.0.raw.len())
                    .map(|index| Rc::from(index.to_string()))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    fn record_get(&self, key: &str) -> Value {
        self.track(Key::prop(key));

        let (own, proto) = own_and_proto(&self.0.raw, key);
        let found = match own {
            Some(value) => value,
            None => inherited_get(proto, key),
        };

        if self.is_shallow() {
            return found;
        }
        match as_box(&found) {
            Some(cell) => self.adopt(cell.value()),
            None => self.adopt(found),
        }
    }

    /// A write always lands on this record. Wrapped prototypes on the chain
    /// only get to refuse it; none of them notifies.
    fn record_set(&self, key: &str, value: Value) -> Result<bool> {
        self.ensure_writable(key)?;

        let (old, proto) = own_and_proto(&self.0.raw, key);
        if old.is_none() {
            check_inherited_write(proto, key)?;
        }

        let value = self.store_form(value);
        if !self.is_shallow() {
            if let Some(cell) = old.as_ref().and_then(as_box) {
                if as_box(&value).is_none() {
                    return cell.set_value(value);
                }
            }
        }

        let change = match &old {
            Some(old) if old.same_value(&value) => return Ok(false),
            Some(_) => ChangeKind::Set,
            None => ChangeKind::Add,
        };

        self.0.raw.insert_own(key, value);
        self.notify(Key::prop(key), change);
        Ok(true)
    }

    fn record_delete(&self, key: &str) -> Result<bool> {
        self.ensure_writable(key)?;

        let removed = match &mut *self.0.raw.data_mut() {
            ObjectData::Record(record) => record.props.shift_remove(key).is_some(),
            _ => false,
        };
        if removed {
            self.notify(Key::prop(key), ChangeKind::Delete);
        }
        Ok(removed)
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let WrapOptions { shallow, readonly } = self.0.options;
        let flavor = match (shallow, readonly) {
            (false, false) => "Reactive",
            (true, false) => "ShallowReactive",
            (false, true) => "Readonly",
            (true, true) => "ShallowReadonly",
        };
        write!(f, "{}({:?})", flavor, self.0.raw)
    }
}

fn own_and_proto(object: &Object, key: &str) -> (Option<Value>, Option<Value>) {
    match &*object.data() {
        ObjectData::Record(record) => (record.props.get(key).cloned(), record.proto.clone()),
        _ => (None, None),
    }
}

fn inherited_get(proto: Option<Value>, key: &str) -> Value {
    match proto {
        Some(Value::Reactive(parent)) => parent.get(key),
        Some(Value::Object(parent)) => {
            let (own, next) = own_and_proto(&parent, key);
            own.unwrap_or_else(|| inherited_get(next, key))
        }
        _ => Value::Undefined,
    }
}

fn inherited_has(proto: Option<Value>, key: &str) -> bool {
    match proto {
        Some(Value::Reactive(parent)) => parent.has(key),
        Some(Value::Object(parent)) => {
            let (own, next) = own_and_proto(&parent, key);
            own.is_some() || inherited_has(next, key)
        }
        _ => false,
    }
}

fn check_inherited_write(proto: Option<Value>, key: &str) -> Result<()> {
    let Some(parent) = proto.as_ref().and_then(Value::raw_object) else {
        return Ok(());
    };
    if let Some(Value::Reactive(wrapper)) = &proto {
        wrapper.ensure_writable(key)?;
    }
    let (own, next) = own_and_proto(&parent, key);
    if own.is_some() {
        Ok(())
    } else {
        check_inherited_write(next, key)
    }
}

/// Record key for a dynamic key value: strings as-is, integers in decimal.
pub(crate) fn prop_name(key: &Value) -> Option<Rc<str>> {
    match key {
        Value::Str(name) => Some(name.clone()),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => {
            // -0 names the same property as 0.
            let n = if *n == 0.0 { 0.0 } else { *n };
            Some(Rc::from(n.to_string()))
        }
        _ => None,
    }
}

pub(crate) fn index_from(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
        Value::Str(s) => s.parse().ok(),
        _ => None,
    }
}

fn length_from(value: &Value) -> Result<usize> {
    match value.as_f64() {
        Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) => Ok(n as usize),
        _ => Err(ReactiveError::InvalidLength(format!("{:?}", value))),
    }
}

impl Object {
    /// The wrapper of this object for `options`, created on first use.
    pub fn wrap(&self, options: WrapOptions) -> Reactive {
        if let Some(existing) = self.cached_wrapper(options) {
            return existing;
        }
        let inner = Rc::new(WrapperInner {
            raw: self.clone(),
            options,
        });
        self.cache_wrapper(options, Rc::downgrade(&inner));
        Reactive(inner)
    }
}

/// Wrap `value` with `options`.
///
/// Objects get their canonical wrapper; a wrapper with other options is
/// rewrapped from its raw object. Primitives are returned unchanged.
pub fn wrap(value: &Value, options: WrapOptions) -> Value {
    match value {
        Value::Object(object) => Value::Reactive(object.wrap(options)),
        Value::Reactive(wrapper) if wrapper.options() == options => value.clone(),
        Value::Reactive(wrapper) => Value::Reactive(wrapper.raw().wrap(options)),
        other => other.clone(),
    }
}

pub fn reactive(object: &Object) -> Reactive {
    object.wrap(WrapOptions::default())
}

pub fn shallow_reactive(object: &Object) -> Reactive {
    object.wrap(WrapOptions::shallow())
}

pub fn readonly(object: &Object) -> Reactive {
    object.wrap(WrapOptions::readonly())
}

pub fn shallow_readonly(object: &Object) -> Reactive {
    object.wrap(WrapOptions::shallow_readonly())
}

pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

pub fn is_readonly(value: &Value) -> bool {
    matches!(value, Value::Reactive(wrapper) if wrapper.is_readonly())
}

/// Strip any wrapper from `value`.
pub fn to_raw(value: &Value) -> Value {
    value.to_raw()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::testing::count_runs;
    use std::cell::Cell;

    #[test]
    fn wrapping_is_idempotent() {
        let object = Object::record([("a", 1)]);
        let first = wrap(&Value::from(object.clone()), WrapOptions::default());
        let second = wrap(&first, WrapOptions::default());
        assert_eq!(first, second);
        assert!(reactive(&object).ptr_eq(&reactive(&object)));
        assert!(!reactive(&object).ptr_eq(&readonly(&object)));
    }

    #[test]
    fn raw_key_exposes_the_target() {
        let object = Object::record([("a", 1)]);
        let state = reactive(&object);
        assert_eq!(state.get(RAW_KEY), Value::from(object.clone()));
        assert!(state.raw().ptr_eq(&object));
        assert_eq!(to_raw(&Value::from(state)), Value::from(object));
    }

    #[test]
    fn nested_objects_are_wrapped_unless_shallow() {
        let inner = Object::record([("x", 1)]);
        let outer = Object::record([("inner", inner.clone())]);

        let deep = reactive(&outer).get("inner");
        assert!(is_reactive(&deep));
        assert!(deep.as_reactive().unwrap().raw().ptr_eq(&inner));

        let shallow = shallow_reactive(&outer).get("inner");
        assert_eq!(shallow, Value::from(inner));
    }

    #[test]
    fn readonly_refuses_writes_and_propagates() {
        let inner = Object::record([("x", 1)]);
        let state = readonly(&Object::record([("inner", inner.clone())]));

        assert_eq!(
            state.set("inner", 2),
            Err(ReactiveError::Readonly { key: "inner".into() })
        );
        assert!(matches!(state.delete("inner"), Err(ReactiveError::Readonly { .. })));

        let nested = state.get("inner");
        assert!(is_readonly(&nested));
        assert!(nested.as_reactive().unwrap().set("x", 5).is_err());
        assert_eq!(inner.own_property("x"), Some(Value::from(1)));
    }

    #[test]
    fn readonly_reads_do_not_track() {
        let object = Object::record([("a", 1)]);
        let view = readonly(&object);
        let state = reactive(&object);

        let runs = count_runs(move || {
            view.get("a");
        });
        state.set("a", 2).unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn unchanged_writes_do_not_notify() {
        let state = reactive(&Object::record([("n", f64::NAN), ("z", 0.0)]));
        let reader = state.clone();
        let runs = count_runs(move || {
            reader.get("n");
            reader.get("z");
        });

        assert_eq!(state.set("n", f64::NAN), Ok(false));
        assert_eq!(runs.get(), 1);

        assert_eq!(state.set("z", -0.0), Ok(true));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn key_enumeration_sees_additions_not_updates() {
        let state = reactive(&Object::record([("a", 1)]));
        let reader = state.clone();
        let runs = count_runs(move || {
            reader.keys();
        });

        state.set("a", 2).unwrap();
        assert_eq!(runs.get(), 1);

        state.set("b", 1).unwrap();
        assert_eq!(runs.get(), 2);

        assert_eq!(state.delete("b"), Ok(true));
        assert_eq!(runs.get(), 3);

        assert_eq!(state.delete("missing"), Ok(false));
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn has_tracks_the_key() {
        let state = reactive(&Object::record([("a", 1)]));
        let reader = state.clone();
        let seen = Rc::new(Cell::new(false));
        let sink = seen.clone();
        let runs = count_runs(move || sink.set(reader.has("b")));

        assert!(!seen.get());
        state.set("b", 1).unwrap();
        assert!(seen.get());
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn negative_zero_names_the_zero_property() {
        let state = reactive(&Object::record([("0", 1)]));
        assert_eq!(prop_name(&Value::from(-0.0)).as_deref(), Some("0"));
        assert!(state.has(-0.0));
        assert_eq!(state.delete(-0.0), Ok(true));
        assert!(!state.has(0));
    }

    #[test]
    fn prototype_reads_fall_through() {
        let parent = reactive(&Object::record([("bar", 1)]));
        let child_raw = Object::record::<&str, Value>([]);
        child_raw.set_prototype(Some(Value::from(parent.clone())));
        let child = reactive(&child_raw);

        let reader = child.clone();
        let runs = count_runs(move || {
            reader.get("bar");
        });
        assert_eq!(child.get("bar"), Value::from(1));

        parent.set("bar", 2).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn inherited_write_notifies_once_and_lands_on_child() {
        let parent_raw = Object::record([("bar", 1)]);
        let parent = reactive(&parent_raw);
        let child_raw = Object::record::<&str, Value>([]);
        child_raw.set_prototype(Some(Value::from(parent.clone())));
        let child = reactive(&child_raw);

        let reader = child.clone();
        let runs = count_runs(move || {
            reader.get("bar");
        });

        assert_eq!(child.set("bar", 2), Ok(true));
        assert_eq!(runs.get(), 2);
        assert_eq!(child_raw.own_property("bar"), Some(Value::from(2)));
        assert_eq!(parent_raw.own_property("bar"), Some(Value::from(1)));
    }

    #[test]
    fn readonly_prototype_refuses_inherited_writes() {
        let parent = readonly(&Object::record([("bar", 1)]));
        let child_raw = Object::record::<&str, Value>([]);
        child_raw.set_prototype(Some(Value::from(parent)));

        assert!(reactive(&child_raw).set("bar", 2).is_err());
        assert!(!child_raw.has_own("bar"));
    }

    #[test]
    fn wrong_kind_writes_are_unsupported() {
        let set = reactive(&Object::set([1]));
        assert_eq!(
            set.set("x", 1),
            Err(ReactiveError::Unsupported {
                operation: "set",
                kind: TargetKind::Set
            })
        );
        assert_eq!(set.get("x"), Value::Undefined);
    }

    #[test]
    fn options_parse_from_config() {
        let options: WrapOptions = serde_json::from_str(r#"{ "readonly": true }"#).unwrap();
        assert_eq!(options, WrapOptions::readonly());
    }
}
