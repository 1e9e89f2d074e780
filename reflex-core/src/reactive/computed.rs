//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when it is
//! read after one of its dependencies changed.
//!
//! # How Computed Values Work
//!
//! 1. The getter runs inside a lazy effect. Nothing is computed on creation.
//!
//! 2. On first read, the effect runs, the result is cached and the value is
//!    marked clean.
//!
//! 3. When a dependency changes, the effect's scheduler only marks the value
//!    dirty and notifies readers of the synthetic `value` key. It never
//!    recomputes eagerly.
//!
//! 4. The next read recomputes, once, and caches again.
//!
//! # Why This Matters
//!
//! - A source changes three times
//! - 10 computed values depend on it
//! - Only the computed values actually read recompute, and only once
//! - Computed values that are never read stay dirty (no wasted work)

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::{create_effect, Effect, EffectOptions};
use super::runtime::{ChangeKind, Key, Runtime, Target};
use super::subscriber::TargetId;
use crate::proxy::TargetKind;

/// Key readers of a computed value are subscribed to.
const VALUE_KEY: &str = "value";

struct ComputedInner<T> {
    id: TargetId,
    effect: Effect<T>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
}

impl<T: 'static> ComputedInner<T> {
    fn invalidate(&self) {
        if !self.dirty.replace(true) {
            Runtime::notify(
                self.id,
                TargetKind::Record,
                Key::prop(VALUE_KEY),
                ChangeKind::Set,
                None,
            );
        }
    }
}

/// A lazily evaluated, cached derived value.
///
/// Cloning shares the cache.
pub struct Computed<T: 'static>(Rc<ComputedInner<T>>);

impl<T: Clone + 'static> Computed<T> {
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|this: &Weak<ComputedInner<T>>| {
            let this = this.clone();
            let effect = create_effect(
                getter,
                EffectOptions::lazy().with_scheduler(move |_| {
                    if let Some(inner) = this.upgrade() {
                        inner.invalidate();
                    }
                }),
            );

            ComputedInner {
                id: TargetId::new(),
                effect,
                value: RefCell::new(None),
                dirty: Cell::new(true),
            }
        });

        Self(inner)
    }

    /// Get the current value, recomputing first if it is dirty.
    ///
    /// Inside a running computation this subscribes it to the value.
    pub fn get(&self) -> T {
        if self.0.dirty.get() {
            let value = self.0.effect.run();
            *self.0.value.borrow_mut() = value;
            self.0.dirty.set(false);
        }

        Runtime::track(self, Key::prop(VALUE_KEY));

        self.0
            .value
            .borrow()
            .clone()
            .expect("computed value is populated after its first run")
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    pub fn has_value(&self) -> bool {
        self.0.value.borrow().is_some()
    }

    /// How many times the getter has run.
    pub fn compute_count(&self) -> usize {
        self.0.effect.run_count()
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: 'static> Target for Computed<T> {
    fn target_id(&self) -> TargetId {
        self.0.id
    }

    fn liveness(&self) -> Weak<dyn Any> {
        let weak: Weak<ComputedInner<T>> = Rc::downgrade(&self.0);
        weak
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.0.id)
            .field("dirty", &self.0.dirty.get())
            .field("value", &*self.0.value.borrow())
            .finish()
    }
}

/// Create a computed value from `getter`.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(getter)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
