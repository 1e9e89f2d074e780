//! Watchers
//!
//! A watcher pairs a lazy effect with a callback. The effect computes a
//! value; whenever one of its dependencies changes, a job recomputes the
//! value and hands `(new, old)` to the callback.
//!
//! Watch sources come in two flavors:
//!
//! - [`watch`] takes a getter and tracks whatever the getter reads.
//! - [`watch_target`] takes a wrapper and traverses everything reachable
//!   from it, so any nested write fires the callback.
//!
//! Callbacks that start asynchronous work can register an invalidation
//! callback through [`OnInvalidate`]. The most recently registered one runs
//! right before the next job, which lets the callback discard results that
//! arrive after a newer change.

use std::cell::{OnceCell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::effect::{create_effect, EffectOptions, EffectRef};
use super::scheduler::{queue_job, Job};
use super::subscriber::TargetId;
use crate::proxy::{Reactive, TargetKind, Value};

/// When a triggered watcher runs its callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Inline, while the write is being notified.
    #[default]
    Sync,
    /// On the batching queue, after the current synchronous phase.
    Post,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Run the callback once on creation, with no old value.
    pub immediate: bool,
    pub flush: FlushMode,
}

impl WatchOptions {
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            ..Self::default()
        }
    }

    pub fn post() -> Self {
        Self {
            flush: FlushMode::Post,
            ..Self::default()
        }
    }

    pub fn with_immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn with_flush(mut self, flush: FlushMode) -> Self {
        self.flush = flush;
        self
    }
}

type Cleanup = Box<dyn FnOnce()>;

/// Registration hook passed to watch callbacks.
#[derive(Clone, Default)]
pub struct OnInvalidate {
    slot: Rc<RefCell<Option<Cleanup>>>,
}

impl OnInvalidate {
    /// Run `cleanup` before the next callback invocation.
    ///
    /// Replaces any callback registered earlier.
    pub fn register(&self, cleanup: impl FnOnce() + 'static) {
        *self.slot.borrow_mut() = Some(Box::new(cleanup));
    }

    fn fire(&self) {
        let pending = self.slot.borrow_mut().take();
        if let Some(cleanup) = pending {
            cleanup();
        }
    }
}

/// Handle to a running watcher.
///
/// The watcher stops when the last clone of its handle is dropped.
#[derive(Debug, Clone)]
#[must_use = "a watcher stops as soon as its handle is dropped"]
pub struct WatchHandle {
    effect: EffectRef,
}

impl WatchHandle {
    /// Stop watching. The callback never runs again.
    pub fn stop(&self) {
        self.effect.dispose();
    }

    pub fn is_stopped(&self) -> bool {
        self.effect.is_disposed()
    }
}

/// Watch the value produced by `getter`.
///
/// `callback` receives the new value, the previous one (absent on an
/// `immediate` first call) and the invalidation hook.
pub fn watch<T, G, C>(getter: G, callback: C, options: WatchOptions) -> WatchHandle
where
    T: Clone + 'static,
    G: Fn() -> T + 'static,
    C: Fn(&T, Option<&T>, &OnInvalidate) + 'static,
{
    let job_slot: Rc<OnceCell<Job>> = Rc::new(OnceCell::new());
    let scheduled = Rc::clone(&job_slot);
    let flush = options.flush;

    let effect = create_effect(
        getter,
        EffectOptions::lazy().with_scheduler(move |_| {
            let Some(job) = scheduled.get() else {
                return;
            };
            match flush {
                FlushMode::Sync => job(),
                FlushMode::Post => queue_job(Rc::clone(job)),
            }
        }),
    );

    let old: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let on_invalidate = OnInvalidate::default();
    let runner = effect.downgrade();
    let previous = Rc::clone(&old);

    let job: Job = Rc::new(move || {
        let Some(effect) = runner.upgrade() else {
            return;
        };
        if effect.is_disposed() {
            return;
        }

        on_invalidate.fire();
        let Some(new) = effect.run() else {
            return;
        };
        let prior = previous.borrow_mut().take();
        callback(&new, prior.as_ref(), &on_invalidate);
        *previous.borrow_mut() = Some(new);
    });
    // The slot is only filled here.
    let _ = job_slot.set(Rc::clone(&job));

    if options.immediate {
        job();
    } else {
        *old.borrow_mut() = effect.run();
    }

    WatchHandle {
        effect: effect.handle(),
    }
}

/// Watch every property reachable from `target`.
///
/// The callback receives the target itself as both new and old value, since
/// a deep change mutates it in place.
pub fn watch_target<C>(target: &Reactive, callback: C, options: WatchOptions) -> WatchHandle
where
    C: Fn(&Value, Option<&Value>, &OnInvalidate) + 'static,
{
    let source = target.clone();
    watch(
        move || {
            let root = Value::Reactive(source.clone());
            traverse(&root, &mut HashSet::new());
            root
        },
        callback,
        options,
    )
}

/// Read everything reachable from `value` through wrappers, tracking it.
fn traverse(value: &Value, seen: &mut HashSet<TargetId>) {
    let Value::Reactive(wrapper) = value else {
        return;
    };
    if !seen.insert(wrapper.raw().id()) {
        return;
    }

    match wrapper.kind() {
        TargetKind::Record => {
            for key in wrapper.keys() {
                traverse(&wrapper.get(&key), seen);
            }
        }
        TargetKind::Sequence => {
            for item in wrapper.to_vec() {
                traverse(&item, seen);
            }
        }
        TargetKind::Set => {
            for item in wrapper.values() {
                traverse(&item, seen);
            }
        }
        TargetKind::Map => {
            for (key, item) in wrapper.entries() {
                traverse(&key, seen);
                traverse(&item, seen);
            }
        }
        TargetKind::Boxed => traverse(&wrapper.value(), seen),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{reactive, Object};
    use crate::reactive::tick;
    use std::cell::Cell;

    #[test]
    fn options_parse_from_config() {
        let options: WatchOptions = serde_json::from_str(r#"{ "flush": "post" }"#).unwrap();
        assert_eq!(options, WatchOptions::post());

        let options: WatchOptions = serde_json::from_str(r#"{ "immediate": true }"#).unwrap();
        assert_eq!(options.flush, FlushMode::Sync);
        assert!(options.immediate);
    }

    #[test]
    fn getter_watch_reports_new_and_old() {
        let state = reactive(&Object::record([("text", "a")]));
        let log = Rc::new(RefCell::new(Vec::new()));

        let source = state.clone();
        let sink = log.clone();
        let _handle = watch(
            move || source.get("text"),
            move |new, old, _| sink.borrow_mut().push((new.clone(), old.cloned())),
            WatchOptions::default(),
        );
        assert!(log.borrow().is_empty());

        state.set("text", "b").unwrap();
        assert_eq!(
            *log.borrow(),
            vec![(Value::from("b"), Some(Value::from("a")))]
        );
    }

    #[test]
    fn immediate_runs_without_old_value() {
        let state = reactive(&Object::record([("text", "a")]));
        let log = Rc::new(RefCell::new(Vec::new()));

        let source = state.clone();
        let sink = log.clone();
        let _handle = watch(
            move || source.get("text"),
            move |new, old, _| sink.borrow_mut().push((new.clone(), old.cloned())),
            WatchOptions::immediate(),
        );
        state.set("text", "b").unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                (Value::from("a"), None),
                (Value::from("b"), Some(Value::from("a"))),
            ]
        );
    }

    #[test]
    fn invalidation_runs_before_next_callback() {
        let state = reactive(&Object::record([("id", 1)]));
        let expired = Rc::new(RefCell::new(Vec::new()));

        let source = state.clone();
        let sink = expired.clone();
        let _handle = watch(
            move || source.get("id"),
            move |new, _, on_invalidate| {
                let sink = sink.clone();
                let id = new.clone();
                on_invalidate.register(move || sink.borrow_mut().push(id));
            },
            WatchOptions::default(),
        );

        state.set("id", 2).unwrap();
        assert!(expired.borrow().is_empty());

        state.set("id", 3).unwrap();
        assert_eq!(*expired.borrow(), vec![Value::from(2)]);
    }

    #[test]
    fn post_flush_waits_for_tick_and_coalesces() {
        let state = reactive(&Object::record([("n", 0)]));
        let calls = Rc::new(Cell::new(0));

        let source = state.clone();
        let counter = calls.clone();
        let _handle = watch(
            move || source.get("n"),
            move |_, _, _| counter.set(counter.get() + 1),
            WatchOptions::post(),
        );

        state.set("n", 1).unwrap();
        state.set("n", 2).unwrap();
        assert_eq!(calls.get(), 0);

        tick();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn deep_watch_sees_nested_writes() {
        let inner = Object::record([("d", 2)]);
        let state = reactive(&Object::record([("c", inner)]));
        let calls = Rc::new(Cell::new(0));

        let counter = calls.clone();
        let _handle = watch_target(
            &state,
            move |_, _, _| counter.set(counter.get() + 1),
            WatchOptions::default(),
        );

        let nested = state.get("c");
        nested.as_reactive().unwrap().set("d", 0x15).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn stopped_watcher_is_silent() {
        let state = reactive(&Object::record([("n", 0)]));
        let calls = Rc::new(Cell::new(0));

        let source = state.clone();
        let counter = calls.clone();
        let handle = watch(
            move || source.get("n"),
            move |_, _, _| counter.set(counter.get() + 1),
            WatchOptions::default(),
        );

        handle.stop();
        assert!(handle.is_stopped());
        state.set("n", 1).unwrap();
        assert_eq!(calls.get(), 0);
    }
}
