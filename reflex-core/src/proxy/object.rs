//! Raw targets.
//!
//! An [`Object`] is a shared, interior-mutable piece of data: a record, a
//! sequence, a set, a map or a box. Objects know nothing about tracking;
//! reads and writes that should participate in the dependency graph go
//! through a [`Reactive`] wrapper instead.
//!
//! The shape of an object is fixed at construction, which lets wrappers pick
//! their interception strategy once via [`TargetKind`].

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use super::value::{raw_set, Value};
use super::wrapper::{Reactive, WrapOptions, WrapperInner};
use crate::reactive::{Target, TargetId};

/// The shape of a target, chosen once when the object is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Record,
    Sequence,
    Set,
    Map,
    Boxed,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetKind::Record => "record",
            TargetKind::Sequence => "sequence",
            TargetKind::Set => "set",
            TargetKind::Map => "map",
            TargetKind::Boxed => "boxed",
        })
    }
}

/// String-keyed properties plus an optional prototype to fall back to.
#[derive(Default)]
pub struct Record {
    pub(crate) props: IndexMap<Rc<str>, Value>,
    pub(crate) proto: Option<Value>,
}

/// Contents of a box.
pub enum BoxSlot {
    /// The box owns its value.
    Owned(Value),
    /// The box reads and writes a property of another target.
    Linked { source: Reactive, key: Rc<str> },
}

pub enum ObjectData {
    Record(Record),
    Sequence(Vec<Value>),
    Set(IndexSet<Value>),
    Map(IndexMap<Value, Value>),
    Boxed(BoxSlot),
}

impl ObjectData {
    pub fn kind(&self) -> TargetKind {
        match self {
            ObjectData::Record(_) => TargetKind::Record,
            ObjectData::Sequence(_) => TargetKind::Sequence,
            ObjectData::Set(_) => TargetKind::Set,
            ObjectData::Map(_) => TargetKind::Map,
            ObjectData::Boxed(_) => TargetKind::Boxed,
        }
    }
}

struct ObjectCell {
    id: TargetId,
    kind: TargetKind,
    data: RefCell<ObjectData>,
    /// Live wrappers of this object, one per option set.
    wrappers: RefCell<SmallVec<[(WrapOptions, Weak<WrapperInner>); 2]>>,
}

/// A raw target. Cloning shares the same underlying data.
#[derive(Clone)]
pub struct Object(Rc<ObjectCell>);

impl Object {
    fn new(data: ObjectData) -> Self {
        Self(Rc::new(ObjectCell {
            id: TargetId::new(),
            kind: data.kind(),
            data: RefCell::new(data),
            wrappers: RefCell::new(SmallVec::new()),
        }))
    }

    /// Create a record from `(key, value)` pairs, keeping their order.
    pub fn record<K, V>(props: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        Self::new(ObjectData::Record(Record {
            props: props
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            proto: None,
        }))
    }

    pub fn sequence<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::new(ObjectData::Sequence(
            items.into_iter().map(Into::into).collect(),
        ))
    }

    /// Create a set container. Duplicate items collapse.
    pub fn set<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::new(ObjectData::Set(raw_set(items.into_iter().map(Into::into))))
    }

    /// Create an ordered map container. Later duplicates overwrite earlier
    /// ones but keep the first insertion position.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Self::new(ObjectData::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into().to_raw(), v.into().to_raw()))
                .collect(),
        ))
    }

    pub(crate) fn boxed(slot: BoxSlot) -> Self {
        Self::new(ObjectData::Boxed(slot))
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    pub fn kind(&self) -> TargetKind {
        self.0.kind
    }

    /// Address of the shared cell; stable for the object's lifetime.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Borrow the raw data. No tracking happens.
    pub fn data(&self) -> Ref<'_, ObjectData> {
        self.0.data.borrow()
    }

    /// Mutably borrow the raw data. No notification happens.
    pub fn data_mut(&self) -> RefMut<'_, ObjectData> {
        self.0.data.borrow_mut()
    }

    /// Own property of a record, ignoring the prototype.
    pub fn own_property(&self, key: &str) -> Option<Value> {
        match &*self.data() {
            ObjectData::Record(record) => record.props.get(key).cloned(),
            _ => None,
        }
    }

    pub fn has_own(&self, key: &str) -> bool {
        match &*self.data() {
            ObjectData::Record(record) => record.props.contains_key(key),
            _ => false,
        }
    }

    /// Insert an own property on a record. Returns the previous own value.
    ///
    /// Has no effect on other kinds of objects.
    pub fn insert_own(&self, key: impl Into<Rc<str>>, value: Value) -> Option<Value> {
        match &mut *self.data_mut() {
            ObjectData::Record(record) => record.props.insert(key.into(), value),
            _ => None,
        }
    }

    /// Set the record's prototype: lookups that miss an own key continue in
    /// `proto`, reading through it if it is a wrapper.
    pub fn set_prototype(&self, proto: Option<Value>) {
        if let ObjectData::Record(record) = &mut *self.data_mut() {
            record.proto = proto;
        }
    }

    pub fn prototype(&self) -> Option<Value> {
        match &*self.data() {
            ObjectData::Record(record) => record.proto.clone(),
            _ => None,
        }
    }

    /// Number of elements for sequences, sets and maps; property count for
    /// records.
    pub fn len(&self) -> usize {
        match &*self.data() {
            ObjectData::Record(record) => record.props.len(),
            ObjectData::Sequence(items) => items.len(),
            ObjectData::Set(items) => items.len(),
            ObjectData::Map(entries) => entries.len(),
            ObjectData::Boxed(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn cached_wrapper(&self, options: WrapOptions) -> Option<Reactive> {
        let mut wrappers = self.0.wrappers.borrow_mut();
        wrappers.retain(|(_, weak)| weak.strong_count() > 0);
        wrappers
            .iter()
            .find(|(opts, _)| *opts == options)
            .and_then(|(_, weak)| weak.upgrade())
            .map(Reactive::from_inner)
    }

    pub(crate) fn cache_wrapper(&self, options: WrapOptions, inner: Weak<WrapperInner>) {
        self.0.wrappers.borrow_mut().push((options, inner));
    }
}

impl Target for Object {
    fn target_id(&self) -> TargetId {
        self.0.id
    }

    fn liveness(&self) -> Weak<dyn Any> {
        let weak: Weak<ObjectCell> = Rc::downgrade(&self.0);
        weak
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.0.kind, self.0.id)
    }
}
