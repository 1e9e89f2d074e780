//! Reactive Runtime
//!
//! The runtime owns the dependency store: a two-level association from a
//! target to its property keys, and from each key to the set of computations
//! subscribed to it.
//!
//! # How It Works
//!
//! 1. When a wrapped target is read inside a running computation, the
//!    wrapper calls [`Runtime::track`] and the computation joins the key's
//!    subscriber set. The set is also recorded on the computation so it can
//!    unsubscribe before its next run.
//!
//! 2. When a wrapped target is written, the wrapper calls
//!    [`Runtime::notify`]. The runtime collects the subscribers of the key,
//!    plus the reserved channels the change affects, and either hands each
//!    computation to its scheduler or runs it directly.
//!
//! # Memory
//!
//! Target entries hold only a weak liveness handle and dependency sets hold
//! effects weakly, so the store keeps neither targets nor effects alive.
//! Once a target is dropped its entry becomes dead and is swept the next
//! time the store grows past its sweep threshold, or on an explicit
//! [`Runtime::sweep`]. A target stays alive while an effect that captured it
//! is alive.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::effect::{EffectRef, Subscription};
use super::subscriber::{SubscriberId, TargetId};
use crate::proxy::{TargetKind, Value, LENGTH};

/// Something reads can be tracked against.
pub trait Target {
    fn target_id(&self) -> TargetId;

    /// Weak handle used to detect that the target has been dropped.
    fn liveness(&self) -> Weak<dyn Any>;
}

/// A property key inside a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named property of a record (or `length` of a sequence).
    Prop(Rc<str>),
    /// A slot of a sequence.
    Index(usize),
    /// A key of an ordered map, in raw form.
    Entry(Value),
    /// The set of keys of a target. Invalidated by additions and removals.
    Iterate,
    /// Element count of a set or map.
    Size,
}

impl Key {
    pub fn prop(name: impl Into<Rc<str>>) -> Self {
        Key::Prop(name.into())
    }

    pub fn length() -> Self {
        Key::Prop(Rc::from(LENGTH))
    }

    pub fn is_length(&self) -> bool {
        matches!(self, Key::Prop(name) if &**name == LENGTH)
    }
}

/// How a write changed its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// An existing key got a new value.
    Set,
    /// A key was added.
    Add,
    /// A key was removed.
    Delete,
}

impl ChangeKind {
    /// Additions and removals change the key set.
    pub fn is_structural(self) -> bool {
        matches!(self, ChangeKind::Add | ChangeKind::Delete)
    }
}

/// One write to report through [`Runtime::notify_all`].
#[derive(Debug, Clone)]
pub struct Trigger {
    pub key: Key,
    pub change: ChangeKind,
    /// New length, when `key` is the `length` of a sequence.
    pub new_length: Option<usize>,
}

impl Trigger {
    pub fn new(key: Key, change: ChangeKind) -> Self {
        Self {
            key,
            change,
            new_length: None,
        }
    }

    pub fn truncate(new_length: usize) -> Self {
        Self {
            key: Key::length(),
            change: ChangeKind::Set,
            new_length: Some(new_length),
        }
    }
}

/// Subscribers of a single (target, key) pair, in subscription order.
pub(crate) type Dep = RefCell<IndexMap<SubscriberId, Subscription>>;

struct TargetDeps {
    alive: Weak<dyn Any>,
    keys: IndexMap<Key, Rc<Dep>>,
}

const MIN_SWEEP_AT: usize = 64;

struct DependencyStore {
    targets: HashMap<TargetId, TargetDeps>,
    sweep_at: usize,
}

impl DependencyStore {
    fn new() -> Self {
        Self {
            targets: HashMap::new(),
            sweep_at: MIN_SWEEP_AT,
        }
    }

    fn dep_for(&mut self, target: &dyn Target, key: Key) -> Rc<Dep> {
        let id = target.target_id();
        if !self.targets.contains_key(&id) {
            if self.targets.len() >= self.sweep_at {
                self.sweep();
                self.sweep_at = (self.targets.len() * 2).max(MIN_SWEEP_AT);
            }
            self.targets.insert(
                id,
                TargetDeps {
                    alive: target.liveness(),
                    keys: IndexMap::new(),
                },
            );
        }

        let entry = self
            .targets
            .get_mut(&id)
            .expect("target entry was just inserted");
        Rc::clone(entry.keys.entry(key).or_default())
    }

    fn sweep(&mut self) -> usize {
        let before = self.targets.len();
        self.targets.retain(|_, deps| deps.alive.strong_count() > 0);
        before - self.targets.len()
    }

    fn collect(&self, target: TargetId, kind: TargetKind, triggers: &[Trigger]) -> Vec<EffectRef> {
        let Some(deps) = self.targets.get(&target) else {
            return Vec::new();
        };

        let mut run: IndexMap<SubscriberId, EffectRef> = IndexMap::new();
        let mut add = |dep: Option<&Rc<Dep>>| {
            if let Some(dep) = dep {
                for (id, subscription) in dep.borrow().iter() {
                    if run.contains_key(id) {
                        continue;
                    }
                    if let Some(effect) = subscription.upgrade() {
                        run.insert(*id, effect);
                    }
                }
            }
        };

        for trigger in triggers {
            add(deps.keys.get(&trigger.key));

            let structural = trigger.change.is_structural();
            // Map iteration yields values, so a changed value is visible to it.
            if structural || (trigger.change == ChangeKind::Set && kind == TargetKind::Map) {
                add(deps.keys.get(&Key::Iterate));
            }
            if structural {
                match kind {
                    TargetKind::Set | TargetKind::Map => add(deps.keys.get(&Key::Size)),
                    TargetKind::Sequence => add(deps.keys.get(&Key::length())),
                    _ => {}
                }
            }

            if kind == TargetKind::Sequence && trigger.key.is_length() {
                if let Some(new_length) = trigger.new_length {
                    for (key, dep) in &deps.keys {
                        if matches!(key, Key::Index(i) if *i >= new_length) {
                            add(Some(dep));
                        }
                    }
                }
            }
        }

        run.into_values().collect()
    }
}

thread_local! {
    static STORE: RefCell<DependencyStore> = RefCell::new(DependencyStore::new());
}

/// The reactive runtime.
///
/// All state is thread-local; `Runtime` is only a namespace for the
/// track/notify protocol.
pub struct Runtime;

impl Runtime {
    /// Subscribe the running computation to `(target, key)`.
    ///
    /// No-op when no computation is running or tracking is paused.
    pub fn track(target: &dyn Target, key: Key) {
        if !ReactiveContext::is_tracking() {
            return;
        }
        let Some(effect) = ReactiveContext::current() else {
            return;
        };

        tracing::trace!(target_id = ?target.target_id(), ?key, subscriber = ?effect.id(), "track");

        let dep = STORE.with(|store| store.borrow_mut().dep_for(target, key));
        let newly_subscribed = {
            let mut subscribers = dep.borrow_mut();
            if subscribers.contains_key(&effect.id()) {
                false
            } else {
                subscribers.insert(effect.id(), effect.downgrade());
                true
            }
        };
        if newly_subscribed {
            effect.record_dep(&dep);
        }
    }

    /// Report a single write to `(target, key)`.
    pub fn notify(
        target: TargetId,
        kind: TargetKind,
        key: Key,
        change: ChangeKind,
        new_length: Option<usize>,
    ) {
        Self::notify_all(
            target,
            kind,
            &[Trigger {
                key,
                change,
                new_length,
            }],
        );
    }

    /// Report several writes to one target at once.
    ///
    /// Every affected computation runs once even if it is subscribed to
    /// several of the written keys. The computation currently executing is
    /// skipped so an effect that writes what it reads does not recurse.
    pub fn notify_all(target: TargetId, kind: TargetKind, triggers: &[Trigger]) {
        let effects = STORE.with(|store| store.borrow().collect(target, kind, triggers));
        if effects.is_empty() {
            return;
        }

        tracing::trace!(target_id = ?target, ?triggers, subscribers = effects.len(), "notify");

        let current = ReactiveContext::current_subscriber();
        for effect in effects {
            if Some(effect.id()) == current {
                continue;
            }
            effect.trigger();
        }
    }

    /// Number of live computations subscribed to `(target, key)`.
    pub fn subscriber_count(target: TargetId, key: &Key) -> usize {
        STORE.with(|store| {
            store
                .borrow()
                .targets
                .get(&target)
                .and_then(|deps| deps.keys.get(key))
                .map(|dep| {
                    dep.borrow()
                        .values()
                        .filter(|subscription| subscription.upgrade().is_some())
                        .count()
                })
                .unwrap_or(0)
        })
    }

    /// Number of targets with a dependency entry, dead or alive.
    pub fn tracked_targets() -> usize {
        STORE.with(|store| store.borrow().targets.len())
    }

    /// Drop entries whose target no longer exists. Returns how many were
    /// removed.
    pub fn sweep() -> usize {
        STORE.with(|store| store.borrow_mut().sweep())
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if a read right now would be tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_tracking()
    }
}
