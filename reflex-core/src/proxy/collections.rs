//! Set and ordered-map interception.
//!
//! Both containers operate on the raw backing collection with raw forms of
//! their arguments, so a wrapper and its raw object are the same element.
//!
//! Three levels of reactivity:
//! 1. Per-key: `map_get`/`map_has` track only that map key
//! 2. Iteration: `values`/`entries`/`for_each` track structural changes
//!    (and, for maps, value changes too)
//! 3. Size: `size` tracks additions and removals

use super::object::{ObjectData, TargetKind};
use super::value::Value;
use super::wrapper::Reactive;
use crate::error::Result;
use crate::reactive::{ChangeKind, Key, Trigger};

impl Reactive {
    /// Element count of a set or map. Tracks additions and removals.
    pub fn size(&self) -> usize {
        match self.kind() {
            TargetKind::Set | TargetKind::Map => {
                self.track(Key::Size);
                self.target().len()
            }
            TargetKind::Sequence => self.len(),
            _ => 0,
        }
    }

    // ------------------------------------------------------------------------
    // Sets
    // ------------------------------------------------------------------------

    /// Add `value` to a set. Returns whether it was new.
    pub fn add(&self, value: impl Into<Value>) -> Result<bool> {
        let value = value.into().to_raw();
        self.ensure_writable(format!("{:?}", value))?;

        let added = match &mut *self.target().data_mut() {
            ObjectData::Set(items) => items.insert(value.clone()),
            _ => return Err(self.unsupported("add")),
        };
        if added {
            self.notify(Key::Entry(value), ChangeKind::Add);
        }
        Ok(added)
    }

    pub(crate) fn set_has(&self, value: &Value) -> bool {
        self.track(Key::Iterate);
        match &*self.target().data() {
            ObjectData::Set(items) => items.contains(&value.to_raw()),
            _ => false,
        }
    }

    pub(crate) fn set_delete(&self, value: &Value) -> Result<bool> {
        let value = value.to_raw();
        self.ensure_writable(format!("{:?}", value))?;

        let removed = match &mut *self.target().data_mut() {
            ObjectData::Set(items) => items.shift_remove(&value),
            _ => return Err(self.unsupported("delete")),
        };
        if removed {
            self.notify(Key::Entry(value), ChangeKind::Delete);
        }
        Ok(removed)
    }

    /// Remove every element of a set or entry of a map. Returns whether
    /// anything was removed.
    pub fn clear(&self) -> Result<bool> {
        self.ensure_writable("clear")?;

        let removed: Vec<Value> = match &mut *self.target().data_mut() {
            ObjectData::Set(items) => items.drain(..).collect(),
            ObjectData::Map(entries) => entries.drain(..).map(|(key, _)| key).collect(),
            _ => return Err(self.unsupported("clear")),
        };

        let triggers: Vec<Trigger> = removed
            .into_iter()
            .map(|key| Trigger::new(Key::Entry(key), ChangeKind::Delete))
            .collect();
        self.notify_all(&triggers);
        Ok(!triggers.is_empty())
    }

    // ------------------------------------------------------------------------
    // Maps
    // ------------------------------------------------------------------------

    /// Value stored under `key`, wrapped; `Undefined` when absent.
    pub fn map_get(&self, key: impl Into<Value>) -> Value {
        let key = key.into().to_raw();
        let found = match &*self.target().data() {
            ObjectData::Map(entries) => entries.get(&key).cloned(),
            _ => return Value::Undefined,
        };
        self.track(Key::Entry(key));
        found.map(|value| self.adopt(value)).unwrap_or_default()
    }

    /// Store `value` under `key`, both in raw form. Returns whether anything
    /// changed.
    pub fn map_set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<bool> {
        let key = key.into().to_raw();
        let value = value.into().to_raw();
        self.ensure_writable(format!("{:?}", key))?;

        let change = {
            let mut data = self.target().data_mut();
            let ObjectData::Map(entries) = &mut *data else {
                return Err(self.unsupported("map_set"));
            };
            match entries.get_mut(&key) {
                Some(old) if old.same_value(&value) => return Ok(false),
                Some(old) => {
                    *old = value;
                    ChangeKind::Set
                }
                None => {
                    entries.insert(key.clone(), value);
                    ChangeKind::Add
                }
            }
        };

        self.notify(Key::Entry(key), change);
        Ok(true)
    }

    pub fn map_has(&self, key: &Value) -> bool {
        let key = key.to_raw();
        let found = match &*self.target().data() {
            ObjectData::Map(entries) => entries.contains_key(&key),
            _ => return false,
        };
        self.track(Key::Entry(key));
        found
    }

    pub fn map_delete(&self, key: &Value) -> Result<bool> {
        let key = key.to_raw();
        self.ensure_writable(format!("{:?}", key))?;

        let removed = match &mut *self.target().data_mut() {
            ObjectData::Map(entries) => entries.shift_remove(&key).is_some(),
            _ => return Err(self.unsupported("map_delete")),
        };
        if removed {
            self.notify(Key::Entry(key), ChangeKind::Delete);
        }
        Ok(removed)
    }

    /// `(key, value)` pairs of a map in insertion order, both wrapped.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        let snapshot: Vec<(Value, Value)> = match &*self.target().data() {
            ObjectData::Map(entries) => entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            _ => return Vec::new(),
        };
        self.track(Key::Iterate);
        snapshot
            .into_iter()
            .map(|(key, value)| (self.adopt(key), self.adopt(value)))
            .collect()
    }

    pub fn map_keys(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(key, _)| key).collect()
    }

    pub fn map_values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    /// Call `f(value, key)` for every map entry.
    pub fn map_for_each(&self, mut f: impl FnMut(Value, Value)) {
        for (key, value) in self.entries() {
            f(value, key);
        }
    }

    // ------------------------------------------------------------------------
    // Shared
    // ------------------------------------------------------------------------

    /// Elements of a set or sequence, or values of a map, wrapped.
    pub fn values(&self) -> Vec<Value> {
        match self.kind() {
            TargetKind::Set => {
                let snapshot: Vec<Value> = match &*self.target().data() {
                    ObjectData::Set(items) => items.iter().cloned().collect(),
                    _ => Vec::new(),
                };
                self.track(Key::Iterate);
                snapshot.into_iter().map(|item| self.adopt(item)).collect()
            }
            TargetKind::Map => self.map_values(),
            TargetKind::Sequence => self.to_vec(),
            _ => Vec::new(),
        }
    }

    /// Call `f` for every element: `(value, index)` for sequences,
    /// `(value, value)` for sets and `(value, key)` for maps.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value)) {
        match self.kind() {
            TargetKind::Sequence => {
                for (index, item) in self.to_vec().into_iter().enumerate() {
                    f(item, Value::from(index));
                }
            }
            TargetKind::Set => {
                for item in self.values() {
                    f(item.clone(), item);
                }
            }
            TargetKind::Map => self.map_for_each(f),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ReactiveError;
    use crate::proxy::testing::count_runs;
    use crate::proxy::{reactive, Object, Value};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn set_size_follows_add_and_delete() {
        let set = reactive(&Object::set([1, 0x11, 0x22]));
        let reader = set.clone();
        let runs = count_runs(move || {
            reader.size();
        });

        assert_eq!(set.add(111), Ok(true));
        assert_eq!(runs.get(), 2);

        assert_eq!(set.add(111), Ok(false));
        assert_eq!(runs.get(), 2);

        assert_eq!(set.delete(111), Ok(true));
        assert_eq!(runs.get(), 3);
        assert_eq!(set.size(), 3);
    }

    #[test]
    fn set_iteration_yields_wrapped_elements() {
        let element = Object::record([("a", 1)]);
        let set = reactive(&Object::set([Value::from(element.clone())]));

        let values = set.values();
        assert_eq!(values.len(), 1);
        assert!(values[0].as_reactive().unwrap().raw().ptr_eq(&element));

        // A wrapper and its raw object are the same element.
        assert!(set.has(values[0].clone()));
        assert_eq!(set.add(values[0].clone()), Ok(false));
    }

    #[test]
    fn set_for_each_reruns_on_structural_change() {
        let set = reactive(&Object::set([2, 5]));
        let reader = set.clone();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _runs = count_runs(move || {
            sink.borrow_mut().clear();
            reader.for_each(|value, _| sink.borrow_mut().push(value));
        });

        set.add(8).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![Value::from(2), Value::from(5), Value::from(8)]
        );
    }

    #[test]
    fn map_get_tracks_only_its_key() {
        let map = reactive(&Object::map([(0x1f, 1)]));
        let reader = map.clone();
        let runs = count_runs(move || {
            reader.map_get(0x1f);
        });

        map.map_set(0x11, 2).unwrap();
        assert_eq!(runs.get(), 1);

        map.map_set(0x1f, 2).unwrap();
        assert_eq!(runs.get(), 2);

        assert_eq!(map.map_set(0x1f, 2), Ok(false));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn map_size_and_iteration() {
        let map = reactive(&Object::map([(0x1f, 1)]));

        let sizer = map.clone();
        let size_runs = count_runs(move || {
            sizer.size();
        });
        let iterator = map.clone();
        let iter_runs = count_runs(move || {
            iterator.map_for_each(|_, _| {});
        });

        map.map_set(0x11, 2).unwrap();
        assert_eq!(size_runs.get(), 2);
        assert_eq!(iter_runs.get(), 2);

        // A value change reaches iteration but not size.
        map.map_set(0x11, 66).unwrap();
        assert_eq!(size_runs.get(), 2);
        assert_eq!(iter_runs.get(), 3);

        assert_eq!(map.map_delete(&Value::from(0x11)), Ok(true));
        assert_eq!(size_runs.get(), 3);
        assert_eq!(iter_runs.get(), 4);
    }

    #[test]
    fn map_has_sees_added_keys() {
        let map = reactive(&Object::map::<Value, Value>([]));
        let reader = map.clone();
        let found = Rc::new(Cell::new(false));
        let sink = found.clone();
        let _runs = count_runs(move || sink.set(reader.has("k")));

        assert!(!found.get());
        map.map_set("k", 1).unwrap();
        assert!(found.get());
    }

    #[test]
    fn map_stores_raw_forms() {
        let raw = Object::map::<Value, Value>([]);
        let map = reactive(&raw);
        let key = Object::record([("id", 1)]);
        let value = Object::record([("v", 2)]);

        map.map_set(reactive(&key), reactive(&value)).unwrap();

        assert_eq!(map.map_get(key.clone()), Value::from(reactive(&value)));
        match &*raw.data() {
            crate::proxy::ObjectData::Map(entries) => {
                assert_eq!(entries.get(&Value::from(key)), Some(&Value::from(value)));
            }
            _ => unreachable!(),
        };
    }

    #[test]
    fn clear_notifies_once() {
        let map = reactive(&Object::map([("a", 1), ("b", 2)]));
        let reader = map.clone();
        let runs = count_runs(move || {
            reader.entries();
        });

        assert_eq!(map.clear(), Ok(true));
        assert_eq!(runs.get(), 2);
        assert_eq!(map.clear(), Ok(false));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn container_writes_on_a_sequence_are_unsupported() {
        let list = reactive(&Object::sequence([1]));
        assert!(matches!(list.add(1), Err(ReactiveError::Unsupported { operation: "add", .. })));
        assert!(matches!(list.map_set(1, 2), Err(ReactiveError::Unsupported { .. })));
        assert_eq!(list.map_get(1), Value::Undefined);
    }
}
