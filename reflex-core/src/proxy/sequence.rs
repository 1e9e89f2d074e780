//! Sequence interception.
//!
//! Index reads track the index, `len` tracks `length`. Mutating methods run
//! with tracking paused and then report what they changed: a `set` per
//! overwritten index, an `add` per new index and a `length` truncation when
//! the sequence shrank. Every affected computation runs once per call.

use std::cmp::min;

use super::object::{ObjectData, TargetKind};
use super::value::Value;
use super::wrapper::{Reactive, LENGTH};
use crate::error::{ReactiveError, Result};
use crate::reactive::{pause_tracking, ChangeKind, Key, Trigger};

/// Largest length a sequence can be given by a single write.
///
/// Sequences are stored densely, so `set_at` past the end and a growing
/// `set_len` allocate every slot in between.
pub const MAX_LENGTH: usize = 1 << 24;

impl Reactive {
    /// Length of a sequence, element count of a set or map, key count of a
    /// record.
    pub fn len(&self) -> usize {
        match self.kind() {
            TargetKind::Sequence => {
                self.track(Key::length());
                self.target().len()
            }
            TargetKind::Set | TargetKind::Map => self.size(),
            TargetKind::Record => self.keys().len(),
            TargetKind::Boxed => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, or `Undefined` past the end.
    pub fn at(&self, index: usize) -> Value {
        self.track(Key::Index(index));
        let item = match &*self.target().data() {
            ObjectData::Sequence(items) => items.get(index).cloned(),
            _ => None,
        };
        item.map(|item| self.adopt(item)).unwrap_or_default()
    }

    /// Write the element at `index`. Writing past the end grows the sequence,
    /// filling the gap with `Undefined`. Indices at or past [`MAX_LENGTH`]
    /// are refused.
    pub fn set_at(&self, index: usize, value: impl Into<Value>) -> Result<bool> {
        self.ensure_writable(index)?;
        if index >= MAX_LENGTH {
            return Err(ReactiveError::IndexOutOfRange {
                index,
                max: MAX_LENGTH,
            });
        }
        let value = self.store_form(value.into());

        let change = {
            let mut data = self.target().data_mut();
            let ObjectData::Sequence(items) = &mut *data else {
                return Err(self.unsupported("set_at"));
            };
            match items.get_mut(index) {
                Some(slot) if slot.same_value(&value) => return Ok(false),
                Some(slot) => {
                    *slot = value;
                    ChangeKind::Set
                }
                None => {
                    items.resize(index, Value::Undefined);
                    items.push(value);
                    ChangeKind::Add
                }
            }
        };

        self.notify(Key::Index(index), change);
        Ok(true)
    }

    /// Set the length. Shrinking drops trailing elements and re-runs readers
    /// of the dropped indices; growing pads with `Undefined`, up to
    /// [`MAX_LENGTH`].
    pub fn set_len(&self, len: usize) -> Result<bool> {
        self.ensure_writable(LENGTH)?;
        if len > MAX_LENGTH {
            return Err(ReactiveError::InvalidLength(len.to_string()));
        }
        {
            let mut data = self.target().data_mut();
            let ObjectData::Sequence(items) = &mut *data else {
                return Err(self.unsupported("set_len"));
            };
            if items.len() == len {
                return Ok(false);
            }
            items.resize(len, Value::Undefined);
        }

        self.notify_all(&[Trigger::truncate(len)]);
        Ok(true)
    }

    /// Append `value`; returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let value = self.store_form(value.into());
        self.mutate("push", |items| {
            items.push(value);
            items.len()
        })
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Result<Value> {
        let popped = self.mutate("pop", Vec::pop)?;
        Ok(popped.map(|item| self.adopt(item)).unwrap_or_default())
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Result<Value> {
        let shifted = self.mutate("shift", |items| {
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        })?;
        Ok(shifted.map(|item| self.adopt(item)).unwrap_or_default())
    }

    /// Prepend `value`; returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<usize> {
        let value = self.store_form(value.into());
        self.mutate("unshift", |items| {
            items.insert(0, value);
            items.len()
        })
    }

    /// Remove `delete_count` elements at `start` and insert `items` in their
    /// place. Both bounds are clamped. Returns the removed elements.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<Value>> {
        let inserted: Vec<Value> = items.into_iter().map(|v| self.store_form(v)).collect();
        let removed = self.mutate("splice", |current| {
            let start = min(start, current.len());
            let end = min(start.saturating_add(delete_count), current.len());
            current.splice(start..end, inserted).collect::<Vec<_>>()
        })?;
        Ok(removed.into_iter().map(|item| self.adopt(item)).collect())
    }

    /// Clear the slot at `index` to `Undefined` without changing the length.
    pub fn delete_at(&self, index: usize) -> Result<bool> {
        self.ensure_writable(index)?;
        {
            let mut data = self.target().data_mut();
            let ObjectData::Sequence(items) = &mut *data else {
                return Err(self.unsupported("delete_at"));
            };
            match items.get_mut(index) {
                Some(slot) => *slot = Value::Undefined,
                None => return Ok(false),
            }
        }

        self.notify(Key::Index(index), ChangeKind::Delete);
        Ok(true)
    }

    /// SameValueZero search. The wrapped view is searched first, then the
    /// raw elements, so both a wrapper and its raw object are found.
    pub fn includes(&self, needle: &Value) -> bool {
        self.to_vec().iter().any(|item| item == needle)
            || self.raw_items().iter().any(|item| item == needle)
    }

    /// Strict-equality search from the front; `NaN` is never found.
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        self.to_vec()
            .iter()
            .position(|item| item.strict_equals(needle))
            .or_else(|| {
                self.raw_items()
                    .iter()
                    .position(|item| item.strict_equals(needle))
            })
    }

    /// Strict-equality search from the back.
    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        self.to_vec()
            .iter()
            .rposition(|item| item.strict_equals(needle))
            .or_else(|| {
                self.raw_items()
                    .iter()
                    .rposition(|item| item.strict_equals(needle))
            })
    }

    /// Every element through this wrapper, tracking `length` and each index.
    pub fn to_vec(&self) -> Vec<Value> {
        if self.kind() != TargetKind::Sequence {
            return Vec::new();
        }
        let len = self.len();
        (0..len).map(|index| self.at(index)).collect()
    }

    fn raw_items(&self) -> Vec<Value> {
        match &*self.target().data() {
            ObjectData::Sequence(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    fn mutate<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Vec<Value>) -> R,
    ) -> Result<R> {
        self.ensure_writable(operation)?;
        // Mutators never subscribe the caller.
        let _pause = pause_tracking();

        let (result, triggers) = {
            let mut data = self.target().data_mut();
            let ObjectData::Sequence(items) = &mut *data else {
                return Err(self.unsupported(operation));
            };
            let before = items.clone();
            let result = f(items);
            let triggers = diff(&before, items);
            (result, triggers)
        };

        self.notify_all(&triggers);
        Ok(result)
    }
}

/// Per-index changes between two states of a sequence.
fn diff(before: &[Value], after: &[Value]) -> Vec<Trigger> {
    let mut triggers: Vec<Trigger> = after
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match before.get(index) {
            Some(old) if old.same_value(item) => None,
            Some(_) => Some(Trigger::new(Key::Index(index), ChangeKind::Set)),
            None => Some(Trigger::new(Key::Index(index), ChangeKind::Add)),
        })
        .collect();

    if after.len() < before.len() {
        triggers.push(Trigger::truncate(after.len()));
    }
    triggers
}
