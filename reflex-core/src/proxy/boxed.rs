//! Boxed values.
//!
//! A box makes a single value reactive through its `value` property. Boxes
//! stored in a record are unwrapped when read through a deep wrapper, and
//! writing a plain value over a boxed property writes into the box.
//!
//! [`box_property`] builds a box linked to a property of another wrapper:
//! reading and writing the box reads and writes that property.

use std::rc::Rc;

use super::object::{BoxSlot, Object, ObjectData, TargetKind};
use super::value::Value;
use super::wrapper::{Reactive, WrapOptions, VALUE};
use crate::error::Result;
use crate::reactive::{ChangeKind, Key};

/// Create a box holding `value`.
pub fn boxed(value: impl Into<Value>) -> Reactive {
    let slot = BoxSlot::Owned(value.into().to_raw());
    Object::boxed(slot).wrap(WrapOptions::default())
}

/// Create a box linked to `source[key]`.
pub fn box_property(source: &Reactive, key: &str) -> Reactive {
    let slot = BoxSlot::Linked {
        source: source.clone(),
        key: Rc::from(key),
    };
    Object::boxed(slot).wrap(WrapOptions::default())
}

/// A record holding a linked box for every own key of `source`.
pub fn box_all(source: &Reactive) -> Object {
    Object::record(
        source
            .keys()
            .into_iter()
            .map(|key| {
                let cell = box_property(source, &key);
                (key, Value::Reactive(cell))
            }),
    )
}

/// The box behind `value`, if it is one.
pub(crate) fn as_box(value: &Value) -> Option<Reactive> {
    match value {
        Value::Reactive(wrapper) if wrapper.is_box() => Some(wrapper.clone()),
        Value::Object(object) if object.kind() == TargetKind::Boxed => {
            Some(object.wrap(WrapOptions::default()))
        }
        _ => None,
    }
}

enum Slot {
    Owned(Value),
    Linked(Reactive, Rc<str>),
}

impl Reactive {
    pub fn is_box(&self) -> bool {
        self.kind() == TargetKind::Boxed
    }

    fn slot(&self) -> Option<Slot> {
        match &*self.target().data() {
            ObjectData::Boxed(BoxSlot::Owned(value)) => Some(Slot::Owned(value.clone())),
            ObjectData::Boxed(BoxSlot::Linked { source, key }) => {
                Some(Slot::Linked(source.clone(), key.clone()))
            }
            _ => None,
        }
    }

    /// Current value of a box; `Undefined` for anything else.
    pub fn value(&self) -> Value {
        match self.slot() {
            Some(Slot::Owned(value)) => {
                self.track(Key::prop(VALUE));
                self.adopt(value)
            }
            Some(Slot::Linked(source, key)) => self.adopt(source.get(&key)),
            None => Value::Undefined,
        }
    }

    /// Replace the value of a box. Returns whether anything changed.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<bool> {
        self.ensure_writable(VALUE)?;
        let value = value.into();

        match self.slot() {
            Some(Slot::Owned(old)) => {
                let value = self.store_form(value);
                if old.same_value(&value) {
                    return Ok(false);
                }
                *self.target().data_mut() = ObjectData::Boxed(BoxSlot::Owned(value));
                self.notify(Key::prop(VALUE), ChangeKind::Set);
                Ok(true)
            }
            Some(Slot::Linked(source, key)) => source.set(&key, value),
            None => Err(self.unsupported("set_value")),
        }
    }
}

/// A view over a record where boxed properties read and write as their
/// values.
///
/// Only top-level keys are tracked and nested objects come back raw.
#[derive(Debug, Clone)]
pub struct UnwrapProxy {
    target: Reactive,
}

pub fn unwrap_proxy(object: &Object) -> UnwrapProxy {
    UnwrapProxy {
        target: object.wrap(WrapOptions::shallow()),
    }
}

impl UnwrapProxy {
    pub fn get(&self, key: &str) -> Value {
        let value = self.target.get(key);
        match as_box(&value) {
            Some(cell) => cell.value(),
            None => value,
        }
    }

    /// Write `key`. A boxed property receives the value inside its box,
    /// unless the new value is itself a box.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        let current = self.target.target().own_property(key);
        match current.as_ref().and_then(as_box) {
            Some(cell) if as_box(&value).is_none() => cell.set_value(value),
            _ => self.target.set(key, value),
        }
    }

    /// The wrapper the view reads through.
    pub fn target(&self) -> &Reactive {
        &self.target
    }
}
